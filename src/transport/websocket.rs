//! WebSocket transport
//!
//! This file implements the websocket listener user clients connect to.
//! Responsibilities:
//! - Accept TCP/WebSocket connections
//! - Authenticate the user from the session cookie during the handshake and
//!   refuse the upgrade with 401 when that fails
//! - Open a `Session` per connection and pump frames between the socket and
//!   the session
//! - Close the session exactly once, whichever side of the connection ends first

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_tungstenite::accept_hdr_async;
use tracing::{debug, error, info, warn};
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::http::{HeaderMap, StatusCode, header};
use tungstenite::protocol::Message as WsMessage;

use super::session::SessionManager;
use crate::auth::{User, UserSerializer};
use crate::client::Client;

// Delay before accepting again after a failure such as EMFILE.
pub(super) const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Everything a connection needs, shared by all connections of a listener.
pub struct WebsocketContext {
    pub sessions: Arc<SessionManager>,
    pub users: Arc<dyn UserSerializer>,
    /// Cookie holding the session token.
    pub cookie_name: String,
}

pub async fn start_websocket_server(addr: &str, ctx: Arc<WebsocketContext>) -> io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("WebSocket server listening on ws://{addr}");
    serve(listener, ctx).await;
    Ok(())
}

/// Accept connections on `listener` forever.
pub async fn serve(listener: TcpListener, ctx: Arc<WebsocketContext>) {
    loop {
        if let Some((stream, peer)) = accepted(listener.accept().await).await {
            spawn(handle_connection(stream, peer, ctx.clone()));
        }
    }
}

/// The accepted connection, or `None` once the failure is logged and the
/// backoff has passed.
pub(super) async fn accepted<T>(result: io::Result<T>) -> Option<T> {
    match result {
        Ok(connection) => Some(connection),
        Err(e) => {
            warn!("Failed to accept connection: {e}");
            sleep(ACCEPT_BACKOFF).await;
            None
        }
    }
}

/// Value of cookie `name` in the `Cookie` headers.
pub fn cookie_value<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

fn unauthorized() -> ErrorResponse {
    let mut response = ErrorResponse::new(Some("Unauthorized".to_string()));
    *response.status_mut() = StatusCode::UNAUTHORIZED;
    response
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, ctx: Arc<WebsocketContext>) {
    let mut user = User::anonymous();
    let authenticate = |request: &Request, response: Response| {
        if let Some(token) = cookie_value(request.headers(), &ctx.cookie_name) {
            user = ctx.users.unserialize(token);
        }
        if user.is_authenticated() {
            Ok(response)
        } else {
            warn!("Refused unauthenticated websocket from {peer}");
            Err(unauthorized())
        }
    };

    let handshake = accept_hdr_async(stream, authenticate).await;
    let ws_stream = match handshake {
        Ok(ws) => ws,
        Err(e) => {
            debug!("WebSocket handshake with {peer} failed: {e}");
            return;
        }
    };
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    let session = ctx.sessions.open(Client::new(user, tx));
    let session_id = session.id().to_string();

    let cleanup_called = Arc::new(AtomicBool::new(false));

    let do_cleanup = {
        let sessions = ctx.sessions.clone();
        let session_id = session_id.clone();
        let cleanup_called = cleanup_called.clone();

        move || {
            if !cleanup_called.swap(true, Ordering::SeqCst) {
                sessions.close(&session_id);
            }
        }
    };

    {
        let session_id = session_id.clone();
        let do_cleanup = do_cleanup.clone();

        spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = ws_sender.send(msg).await {
                    error!("Failed to send message on session {session_id}: {e}");
                    break;
                }
            }

            do_cleanup();
            let _ = ws_sender.close().await;
            debug!("Send loop closed for {session_id}");
        });
    }

    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            WsMessage::Text(text) => ctx.sessions.on_message(&session, text.as_str()),
            WsMessage::Close(_) => break,
            _ => {}
        }
    }

    drop(session);
    do_cleanup();
}

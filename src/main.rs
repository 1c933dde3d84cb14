//! CLI for popauth
//!
//! Subcommands:
//! - `server`: run the websocket listener, the back channel and administration
//! - `token`: print a session token for a user
//! - `client`: connect as a user and answer every authorization request

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, header};
use tracing::{error, info};

use popauth::auth::{JwtUserSerializer, Privilege, User, UserSerializer};
use popauth::authorization::{AuthorizationState, UnixAccountAuthorization};
use popauth::broker::MessageBus;
use popauth::config::{Settings, load_config};
use popauth::persistence::{bootstrap, open_storage};
use popauth::transport::admin::{AdminState, start_admin_server};
use popauth::transport::backchannel::{BackChannelState, start_backchannel_server};
use popauth::transport::message::{ClientMessage, ServerMessage};
use popauth::transport::websocket::{WebsocketContext, start_websocket_server};
use popauth::transport::{SessionManager, WebsocketMessageProtocol};
use popauth::utils::{AppError, logging};

#[derive(Parser)]
#[command(name = "popauth")]
enum Command {
    /// Start the websocket server, the back channel and administration
    Server,
    /// Print a session token (cookie value) for a user
    Token {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "user")]
        privilege: Privilege,
    },
    /// Connect as a user and answer authorization requests
    Client {
        /// WebSocket server URL to connect to (default: ws://127.0.0.1:8080)
        #[arg(long, default_value = "ws://127.0.0.1:8080")]
        url: String,
        /// Session token, as printed by `token`
        #[arg(long)]
        token: String,
        /// Deny every request instead of approving it
        #[arg(long)]
        deny: bool,
    },
}

#[tokio::main]
async fn main() {
    let cmd = Command::parse();

    let settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    logging::init(&settings.log.level);

    match cmd {
        Command::Server => {
            if let Err(e) = run_server(settings).await {
                error!("Server failed: {e}");
                std::process::exit(1);
            }
        }
        Command::Token {
            user_id,
            name,
            privilege,
        } => {
            if let Err(e) = run_token(&settings, User::new(user_id, name, privilege)) {
                error!("Token failed: {e}");
                std::process::exit(1);
            }
        }
        Command::Client { url, token, deny } => {
            let decision = if deny {
                AuthorizationState::Unauthorized
            } else {
                AuthorizationState::Authorized
            };
            if let Err(e) = run_client(&url, &settings.auth.cookie_name, &token, decision).await {
                error!("Client failed: {e}");
                std::process::exit(1);
            }
        }
    }
}

async fn run_server(settings: Settings) -> Result<(), AppError> {
    let storage = open_storage(&settings.storage)?;
    bootstrap::seed(&storage, &settings.bootstrap)?;

    let bus = Arc::new(MessageBus::new());
    let sessions = Arc::new(SessionManager::new(
        bus.clone(),
        Arc::new(WebsocketMessageProtocol),
    ));
    let users: Arc<dyn UserSerializer> =
        Arc::new(JwtUserSerializer::new(&settings.auth.jwt_secret));
    let ws_ctx = Arc::new(WebsocketContext {
        sessions,
        users: users.clone(),
        cookie_name: settings.auth.cookie_name.clone(),
    });
    let admin = AdminState {
        storage: storage.clone(),
        users,
        cookie_name: settings.auth.cookie_name.clone(),
    };
    let backchannel = BackChannelState {
        authorization: Arc::new(UnixAccountAuthorization::new(
            bus,
            storage.unix_accounts.clone(),
            storage.hosts.clone(),
        )),
        timeout: Duration::from_secs(settings.authorization.timeout_secs),
        host_id_header: settings.backchannel.host_id_header.clone(),
    };

    let ws_addr = format!("{}:{}", settings.server.host, settings.server.port);
    let backchannel_addr = format!("{}:{}", settings.backchannel.host, settings.backchannel.port);
    let admin_addr = format!("{}:{}", settings.admin.host, settings.admin.port);

    tokio::select! {
        res = start_websocket_server(&ws_addr, ws_ctx) => {
            res?;
            error!("WebSocket server exited unexpectedly.");
        }
        res = start_backchannel_server(&backchannel_addr, backchannel) => {
            res?;
            error!("Back channel exited unexpectedly.");
        }
        res = start_admin_server(&admin_addr, admin) => {
            res?;
            error!("Administration exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    Ok(())
}

fn run_token(settings: &Settings, user: User) -> Result<(), AppError> {
    let token = JwtUserSerializer::new(&settings.auth.jwt_secret).serialize(&user)?;
    println!("{token}");
    Ok(())
}

async fn run_client(
    url: &str,
    cookie_name: &str,
    token: &str,
    decision: AuthorizationState,
) -> Result<(), Box<dyn Error>> {
    let mut request = url.into_client_request()?;
    request.headers_mut().insert(
        header::COOKIE,
        HeaderValue::from_str(&format!("{cookie_name}={token}"))?,
    );
    let (mut ws_stream, _response) = connect_async(request).await?;
    info!("Connected to {url}, answering {decision} to every request");

    while let Some(frame) = ws_stream.next().await {
        let WsMessage::Text(text) = frame? else {
            continue;
        };
        println!("{text}");

        if let Ok(ServerMessage::AuthorizationRequest { id, .. }) =
            serde_json::from_str::<ServerMessage>(text.as_str())
        {
            let answer = ClientMessage::AuthorizationResponse {
                id,
                state: decision.name().to_string(),
            };
            ws_stream
                .send(WsMessage::Text(serde_json::to_string(&answer)?.into()))
                .await?;
        }
    }

    Ok(())
}

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request as HttpRequest, StatusCode};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{Instant, sleep, timeout};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tower::ServiceExt;
use tungstenite::client::IntoClientRequest;
use tungstenite::http::{HeaderValue, header};
use tungstenite::protocol::Message as WsMessage;

use super::backchannel::{BackChannelState, router};
use super::websocket::{ACCEPT_BACKOFF, WebsocketContext, accepted, serve};
use super::{SessionManager, WebsocketMessageProtocol};
use crate::auth::{JwtUserSerializer, Privilege, User, UserSerializer};
use crate::authorization::{UnixAccountAuthorization, topics};
use crate::broker::MessageBus;
use crate::persistence::{
    Host, HostStorage, JsonHostStorage, JsonUnixAccountStorage, MemoryStorage, UnixAccount,
    UnixAccountStorage,
};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const SECRET: &str = "test-secret";

struct Server {
    addr: SocketAddr,
    bus: Arc<MessageBus>,
    sessions: Arc<SessionManager>,
}

async fn start_server() -> Server {
    let bus = Arc::new(MessageBus::new());
    let sessions = Arc::new(SessionManager::new(
        bus.clone(),
        Arc::new(WebsocketMessageProtocol),
    ));
    let ctx = Arc::new(WebsocketContext {
        sessions: sessions.clone(),
        users: Arc::new(JwtUserSerializer::new(SECRET)),
        cookie_name: "auth_token".to_string(),
    });
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, ctx));
    Server {
        addr,
        bus,
        sessions,
    }
}

fn token_for(user: &User) -> String {
    JwtUserSerializer::new(SECRET).serialize(user).unwrap()
}

async fn connect(addr: SocketAddr, cookie: Option<String>) -> Result<Ws, tungstenite::Error> {
    let mut request = format!("ws://{addr}/").into_client_request().unwrap();
    if let Some(cookie) = cookie {
        request
            .headers_mut()
            .insert(header::COOKIE, HeaderValue::from_str(&cookie).unwrap());
    }
    connect_async(request).await.map(|(ws, _)| ws)
}

async fn wait_until(condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        sleep(Duration::from_millis(10)).await;
    }
}

async fn next_json(ws: &mut Ws) -> Value {
    loop {
        let frame = timeout(Duration::from_secs(2), ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let WsMessage::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

fn assert_unauthorized(result: Result<Ws, tungstenite::Error>) {
    match result {
        Err(tungstenite::Error::Http(response)) => {
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED)
        }
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("connection should have been refused"),
    }
}

#[tokio::test]
async fn failed_accept_backs_off() {
    let start = Instant::now();
    let failure: std::io::Result<()> = Err(std::io::Error::other("too many open files"));
    assert_eq!(accepted(failure).await, None);
    assert!(start.elapsed() >= ACCEPT_BACKOFF);

    let start = Instant::now();
    assert_eq!(accepted(Ok(7)).await, Some(7));
    assert!(start.elapsed() < ACCEPT_BACKOFF);
}

#[tokio::test]
async fn handshake_without_cookie_is_refused() {
    let server = start_server().await;
    assert_unauthorized(connect(server.addr, None).await);
    assert!(server.sessions.is_empty());
}

#[tokio::test]
async fn handshake_with_invalid_token_is_refused() {
    let server = start_server().await;
    let forged = JwtUserSerializer::new("other-secret")
        .serialize(&User::new("u1", "alice", Privilege::User))
        .unwrap();
    assert_unauthorized(connect(server.addr, Some(format!("auth_token={forged}"))).await);
}

#[tokio::test]
async fn session_lives_as_long_as_the_connection() {
    let server = start_server().await;
    let token = token_for(&User::new("u1", "alice", Privilege::User));
    let mut ws = connect(server.addr, Some(format!("theme=dark; auth_token={token}")))
        .await
        .unwrap();

    wait_until(|| server.sessions.len() == 1).await;
    assert_eq!(
        server.bus.topic_names(),
        vec![topics::user_requests("u1"), topics::user_updates("u1")]
    );

    ws.close(None).await.unwrap();
    wait_until(|| server.sessions.is_empty()).await;
    assert!(server.bus.topic_names().is_empty());
}

#[tokio::test]
async fn unanswerable_frame_gets_error_reply() {
    let server = start_server().await;
    let token = token_for(&User::new("u1", "alice", Privilege::User));
    let mut ws = connect(server.addr, Some(format!("auth_token={token}")))
        .await
        .unwrap();

    ws.send(WsMessage::Text("{}".into())).await.unwrap();
    let reply = next_json(&mut ws).await;
    assert_eq!(reply, json!({"type": "error", "error_text": "Bad formatted message: 'type'"}));
}

#[tokio::test]
async fn login_approved_over_websocket() {
    let server = start_server().await;

    let hosts = JsonHostStorage::new(Box::<MemoryStorage>::default()).unwrap();
    hosts.add_host(Host::new("h1", "build01")).unwrap();
    let accounts = JsonUnixAccountStorage::new(Box::<MemoryStorage>::default()).unwrap();
    accounts
        .add_unix_account(UnixAccount::new(1000, "deploy"), Some("u1"))
        .unwrap();
    let hosts: Arc<dyn HostStorage> = Arc::new(hosts);
    let accounts: Arc<dyn UnixAccountStorage> = Arc::new(accounts);
    let app = router(BackChannelState {
        authorization: Arc::new(UnixAccountAuthorization::new(
            server.bus.clone(),
            accounts,
            hosts,
        )),
        timeout: Duration::from_secs(2),
        host_id_header: "x-client-cert-cn".to_string(),
    });

    let token = token_for(&User::new("u1", "alice", Privilege::User));
    let mut ws = connect(server.addr, Some(format!("auth_token={token}")))
        .await
        .unwrap();
    wait_until(|| server.sessions.len() == 1).await;

    let user = tokio::spawn(async move {
        let request = next_json(&mut ws).await;
        assert_eq!(request["type"], "authorization_request");
        assert_eq!(request["unix_account_name"], "deploy");
        assert_eq!(request["hostname"], "build01");
        assert_eq!(request["service_name"], "sshd");

        let answer = json!({
            "type": "authorization_response",
            "id": request["id"],
            "state": "AUTHORIZED"
        });
        ws.send(WsMessage::Text(answer.to_string().into()))
            .await
            .unwrap();

        let update = next_json(&mut ws).await;
        assert_eq!(update["type"], "authorization_update");
        assert_eq!(update["id"], request["id"]);
        assert_eq!(update["state"], "AUTHORIZED");
    });

    let response = app
        .oneshot(
            HttpRequest::builder()
                .uri("/authorize")
                .method(Method::POST)
                .header("x-client-cert-cn", "h1")
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Body::from("unix_account_id=1000&service=sshd"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    user.await.unwrap();
}

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use tower::ServiceExt;

use super::backchannel::{BackChannelState, router, status_for};
use crate::authorization::{AuthorizationState, UnixAccountAuthorization, topics};
use crate::broker::MessageBus;
use crate::broker::test_support::{RecordingObserver, subscriber};
use crate::persistence::{
    Host, HostStorage, JsonHostStorage, JsonUnixAccountStorage, MemoryStorage, UnixAccount,
    UnixAccountStorage,
};

const HOST_HEADER: &str = "x-client-cert-cn";

fn app(bus: &Arc<MessageBus>, users: &[&str]) -> Router {
    let hosts = JsonHostStorage::new(Box::<MemoryStorage>::default()).unwrap();
    hosts.add_host(Host::new("h1", "build01")).unwrap();
    let accounts = JsonUnixAccountStorage::new(Box::<MemoryStorage>::default()).unwrap();
    accounts
        .add_unix_account(UnixAccount::new(1000, "deploy"), None)
        .unwrap();
    for user in users {
        accounts.associate_user_to_unix_account(user, 1000).unwrap();
    }
    let hosts: Arc<dyn HostStorage> = Arc::new(hosts);
    let accounts: Arc<dyn UnixAccountStorage> = Arc::new(accounts);

    router(BackChannelState {
        authorization: Arc::new(UnixAccountAuthorization::new(bus.clone(), accounts, hosts)),
        timeout: Duration::from_millis(80),
        host_id_header: HOST_HEADER.to_string(),
    })
}

fn post(host: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .uri("/authorize")
        .method(Method::POST)
        .header("content-type", "application/x-www-form-urlencoded");
    if let Some(host) = host {
        builder = builder.header(HOST_HEADER, host);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn call(app: Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[test]
fn states_map_to_statuses() {
    assert_eq!(status_for(AuthorizationState::Authorized), StatusCode::OK);
    assert_eq!(status_for(AuthorizationState::Unauthorized), StatusCode::UNAUTHORIZED);
    assert_eq!(status_for(AuthorizationState::Expired), StatusCode::REQUEST_TIMEOUT);
    assert_eq!(status_for(AuthorizationState::Error), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn non_numeric_account_id_is_rejected() {
    let bus = Arc::new(MessageBus::new());
    for body in [
        "unix_account_id=abc&service=sshd",
        "unix_account_id=-1&service=sshd",
        "unix_account_id=&service=sshd",
        "service=sshd",
    ] {
        let (status, _) = call(app(&bus, &["u1"]), post(Some("h1"), body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    }
}

#[tokio::test]
async fn unknown_host_is_a_bad_request() {
    let bus = Arc::new(MessageBus::new());
    let (status, body) = call(
        app(&bus, &["u1"]),
        post(Some("h9"), "unix_account_id=1000&service=sshd"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Host with id 'h9' not found");
}

#[tokio::test]
async fn missing_host_header_is_a_bad_request() {
    let bus = Arc::new(MessageBus::new());
    let (status, body) = call(
        app(&bus, &["u1"]),
        post(None, "unix_account_id=1000&service=sshd"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Host with id '' not found");
}

#[tokio::test]
async fn account_without_users_is_a_bad_request() {
    let bus = Arc::new(MessageBus::new());
    let (status, body) = call(
        app(&bus, &[]),
        post(Some("h1"), "unix_account_id=1000&service=sshd"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "No users found associated with unix account id '1000'");
}

#[tokio::test]
async fn nobody_online_is_a_bad_request() {
    let bus = Arc::new(MessageBus::new());
    let (status, body) = call(
        app(&bus, &["u1"]),
        post(Some("h1"), "unix_account_id=1000&service=sshd"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Failed to send request (no receivers available)");
}

#[tokio::test]
async fn unanswered_request_times_out() {
    let bus = Arc::new(MessageBus::new());
    let session = RecordingObserver::new();
    bus.subscribe(subscriber(&session), &topics::user_requests("u1"));
    bus.subscribe(subscriber(&session), &topics::user_updates("u1"));

    let (status, body) = call(
        app(&bus, &["u1"]),
        post(Some("h1"), "unix_account_id=1000&service=sshd"),
    )
    .await;
    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    assert!(body.is_empty());
    assert_eq!(session.messages().len(), 2);
}

//! HTTP back channel for hosts
//!
//! `POST /authorize` with form fields `unix_account_id` and `service` asks for
//! a login decision. The host is identified by a header set by the TLS
//! terminator from the client certificate's common name. The request blocks
//! until the users decide or the configured timeout lapses.
//!
//! | outcome        | status |
//! |----------------|--------|
//! | `AUTHORIZED`   | 200    |
//! | `UNAUTHORIZED` | 401    |
//! | `EXPIRED`      | 408    |
//! | `ERROR`        | 400, message in the body |

use std::io;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Form, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::authorization::{
    AuthorizationRequestSubject, AuthorizationState, UnixAccountAuthorization,
};

#[derive(Clone)]
pub struct BackChannelState {
    pub authorization: Arc<UnixAccountAuthorization>,
    /// Time users get to decide.
    pub timeout: Duration,
    pub host_id_header: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthorizeParams {
    #[serde(default)]
    pub unix_account_id: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
}

pub fn router(state: BackChannelState) -> Router {
    Router::new()
        .route("/authorize", post(authorize))
        .with_state(state)
}

pub async fn start_backchannel_server(addr: &str, state: BackChannelState) -> io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Back channel listening on http://{addr}");
    axum::serve(listener, router(state)).await
}

pub fn status_for(state: AuthorizationState) -> StatusCode {
    match state {
        AuthorizationState::Authorized => StatusCode::OK,
        AuthorizationState::Unauthorized => StatusCode::UNAUTHORIZED,
        AuthorizationState::Expired => StatusCode::REQUEST_TIMEOUT,
        AuthorizationState::Error | AuthorizationState::Waiting => StatusCode::BAD_REQUEST,
    }
}

pub(super) fn parse_unix_account_id(raw: &str) -> Option<u32> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

async fn authorize(
    State(state): State<BackChannelState>,
    headers: HeaderMap,
    Form(params): Form<AuthorizeParams>,
) -> Response {
    let (Some(raw_id), Some(service)) = (params.unix_account_id, params.service) else {
        return (StatusCode::BAD_REQUEST, "Missing unix_account_id or service").into_response();
    };
    let Some(unix_account_id) = parse_unix_account_id(&raw_id) else {
        return (StatusCode::BAD_REQUEST, "unix_account_id must be numeric").into_response();
    };

    let host_id = headers
        .get(state.host_id_header.as_str())
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if host_id.is_empty() {
        error!("host_id lookup failed, no client certificate provided");
    }

    let subject =
        AuthorizationRequestSubject::with_timeout(host_id, unix_account_id, service, state.timeout);
    let response = state.authorization.authorize(&subject).await;
    info!(
        "Login to unix account {} on host '{}' for {}: {}",
        subject.unix_account_id(),
        subject.host_id(),
        subject.service_name(),
        response.state
    );

    (status_for(response.state), response.message).into_response()
}

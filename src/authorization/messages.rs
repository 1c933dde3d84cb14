//! Payloads exchanged between the authorization workflow and user sessions.

use uuid::Uuid;

use super::state::AuthorizationState;

/// Asks a user to approve or deny a login. The id is generated per request
/// and correlates every response and update to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequestMessage {
    pub id: String,
    pub unix_account_name: String,
    pub host_name: String,
    pub service_name: String,
}

impl AuthorizationRequestMessage {
    pub fn new(
        unix_account_name: impl Into<String>,
        host_name: impl Into<String>,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            unix_account_name: unix_account_name.into(),
            host_name: host_name.into(),
            service_name: service_name.into(),
        }
    }
}

/// A user's decision on a pending request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationResponseMessage {
    pub id: String,
    pub state: AuthorizationState,
}

impl AuthorizationResponseMessage {
    pub fn new(id: impl Into<String>, state: AuthorizationState) -> Self {
        Self {
            id: id.into(),
            state,
        }
    }
}

/// Tells sessions that a request changed state; no reply is expected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationUpdateMessage {
    pub id: String,
    pub state: AuthorizationState,
}

impl AuthorizationUpdateMessage {
    pub fn new(id: impl Into<String>, state: AuthorizationState) -> Self {
        Self {
            id: id.into(),
            state,
        }
    }
}

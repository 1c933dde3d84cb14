//! Login authorization workflow
//!
//! `UnixAccountAuthorization::authorize` resolves the host and the users
//! associated with a unix account, asks every associated user's sessions for
//! a decision through a `Request`, and folds whatever happens into one
//! `AuthorizationResponse`. No failure escapes as an error: a missing host, an
//! account nobody owns, or nobody being online all end in `ERROR` with a
//! message meant for the calling host.
//!
//! Once a request is decided (or lapses), an `AuthorizationUpdateMessage` is
//! published on every associated user's update topic so that sessions still
//! showing the prompt can drop it.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info};

use super::messages::{AuthorizationRequestMessage, AuthorizationUpdateMessage};
use super::state::AuthorizationState;
use super::topics;
use crate::broker::{Message, MessageBus, Request, ResponseCallback, SendPolicy};
use crate::persistence::{HostStorage, UnixAccountStorage};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// What to authorize: a login to `unix_account_id` on `host_id` for `service_name`.
/// Fixed once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequestSubject {
    host_id: String,
    unix_account_id: u32,
    service_name: String,
    expires: Instant,
}

impl AuthorizationRequestSubject {
    pub fn new(
        host_id: impl Into<String>,
        unix_account_id: u32,
        service_name: impl Into<String>,
    ) -> Self {
        Self::with_timeout(host_id, unix_account_id, service_name, DEFAULT_TIMEOUT)
    }

    /// The deadline is `timeout` from now.
    pub fn with_timeout(
        host_id: impl Into<String>,
        unix_account_id: u32,
        service_name: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            host_id: host_id.into(),
            unix_account_id,
            service_name: service_name.into(),
            expires: Instant::now() + timeout,
        }
    }

    pub fn host_id(&self) -> &str {
        &self.host_id
    }

    pub fn unix_account_id(&self) -> u32 {
        self.unix_account_id
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Deadline for a user decision.
    pub fn expires(&self) -> Instant {
        self.expires
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationResponse {
    pub state: AuthorizationState,
    /// Set only for `ERROR`.
    pub message: String,
}

impl AuthorizationResponse {
    fn set(&mut self, state: AuthorizationState) {
        self.state = state;
        self.message.clear();
    }

    fn set_authorized(&mut self) {
        self.set(AuthorizationState::Authorized);
    }

    fn set_unauthorized(&mut self) {
        self.set(AuthorizationState::Unauthorized);
    }

    fn set_expired(&mut self) {
        self.set(AuthorizationState::Expired);
    }

    fn set_error(&mut self, message: impl Into<String>) {
        self.state = AuthorizationState::Error;
        self.message = message.into();
    }
}

/// Folds the outcome of one request into its `AuthorizationResponse`.
struct AuthorizationResponseCallback<'a> {
    response: &'a mut AuthorizationResponse,
    bus: &'a MessageBus,
    users_id: &'a [String],
    request_id: String,
}

impl AuthorizationResponseCallback<'_> {
    fn publish_update(&self, state: AuthorizationState) {
        let update = Message::from(AuthorizationUpdateMessage::new(self.request_id.clone(), state));
        for user_id in self.users_id {
            self.bus.publish(&topics::user_updates(user_id), &update);
        }
    }
}

impl ResponseCallback for AuthorizationResponseCallback<'_> {
    fn on_response(&mut self, msg: Message) {
        let answer = match msg {
            Message::AuthorizationResponse(answer) => answer,
            other => {
                let error_text = format!("Received unexpected message: {}", other.kind());
                error!("{error_text}");
                self.response.set_error(error_text);
                return;
            }
        };

        match answer.state {
            AuthorizationState::Authorized => self.response.set_authorized(),
            AuthorizationState::Unauthorized => self.response.set_unauthorized(),
            other => {
                let error_text = format!("Received unknown state: {}", other.name());
                error!("{error_text}");
                self.response.set_error(error_text);
                return;
            }
        }
        self.publish_update(answer.state);
    }

    fn on_expired(&mut self) {
        self.response.set_expired();
        self.publish_update(AuthorizationState::Expired);
    }
}

/// Authorizes unix account logins by asking the account's associated users.
pub struct UnixAccountAuthorization {
    bus: Arc<MessageBus>,
    unix_accounts: Arc<dyn UnixAccountStorage>,
    hosts: Arc<dyn HostStorage>,
}

impl UnixAccountAuthorization {
    pub fn new(
        bus: Arc<MessageBus>,
        unix_accounts: Arc<dyn UnixAccountStorage>,
        hosts: Arc<dyn HostStorage>,
    ) -> Self {
        Self {
            bus,
            unix_accounts,
            hosts,
        }
    }

    pub async fn authorize(&self, subject: &AuthorizationRequestSubject) -> AuthorizationResponse {
        let mut response = AuthorizationResponse::default();

        // A record without an id never identifies a host.
        let Some(host) = self
            .hosts
            .get_host_by_id(&subject.host_id)
            .filter(|host| !host.id.is_empty())
        else {
            response.set_error(format!("Host with id '{}' not found", subject.host_id));
            return response;
        };

        let users_id = self
            .unix_accounts
            .get_associated_users_for_unix_account(subject.unix_account_id);
        if users_id.is_empty() {
            response.set_error(format!(
                "No users found associated with unix account id '{}'",
                subject.unix_account_id
            ));
            return response;
        }

        let unix_account_name = self
            .unix_accounts
            .get_unix_account_by_id(subject.unix_account_id)
            .map(|account| account.name)
            .unwrap_or_default();
        let request_msg =
            AuthorizationRequestMessage::new(unix_account_name, host.name, &subject.service_name);
        let request_id = request_msg.id.clone();
        debug!(
            "Authorization request {request_id} for unix account {} on host {} sent to {} user(s)",
            subject.unix_account_id,
            subject.host_id,
            users_id.len()
        );

        let sent = {
            let callback = AuthorizationResponseCallback {
                response: &mut response,
                bus: &self.bus,
                users_id: &users_id,
                request_id: request_id.clone(),
            };
            let accepted_id = request_id.clone();
            let mut request = Request::new(
                &self.bus,
                callback,
                users_id.iter().map(|id| topics::user_requests(id)).collect(),
                users_id.iter().map(|id| topics::user_responses(id)).collect(),
                SendPolicy::AtLeastOne,
            )
            .accept_only(move |msg| {
                matches!(msg, Message::AuthorizationResponse(answer) if answer.id == accepted_id)
            });
            request.send(&Message::from(request_msg), subject.expires).await
        };

        if !sent {
            response.set_error("Failed to send request (no receivers available)");
        }
        info!("Authorization request {request_id} ended with {}", response.state);
        response
    }
}

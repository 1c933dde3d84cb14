//! Message definitions for the bus
//!
//! `Message` is the in-process representation passed to observers. It is a
//! closed sum of the authorization payloads; the wire representation lives in
//! `transport::message` and is produced only by the codec.

use crate::authorization::messages::{
    AuthorizationRequestMessage, AuthorizationResponseMessage, AuthorizationUpdateMessage,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    AuthorizationRequest(AuthorizationRequestMessage),
    AuthorizationResponse(AuthorizationResponseMessage),
    AuthorizationUpdate(AuthorizationUpdateMessage),
}

impl Message {
    /// Short name of the variant, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::AuthorizationRequest(_) => "authorization_request",
            Message::AuthorizationResponse(_) => "authorization_response",
            Message::AuthorizationUpdate(_) => "authorization_update",
        }
    }
}

impl From<AuthorizationRequestMessage> for Message {
    fn from(msg: AuthorizationRequestMessage) -> Self {
        Message::AuthorizationRequest(msg)
    }
}

impl From<AuthorizationResponseMessage> for Message {
    fn from(msg: AuthorizationResponseMessage) -> Self {
        Message::AuthorizationResponse(msg)
    }
}

impl From<AuthorizationUpdateMessage> for Message {
    fn from(msg: AuthorizationUpdateMessage) -> Self {
        Message::AuthorizationUpdate(msg)
    }
}

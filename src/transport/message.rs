//! Wire shapes of the websocket protocol
//!
//! Every frame is a JSON object with a `type` discriminator. The server sends
//! `authorization_request`, `authorization_update` and `error`; the only frame
//! a client sends is `authorization_response`. States travel as their names
//! (`AUTHORIZED`, `EXPIRED`, ...).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "authorization_request")]
    AuthorizationRequest {
        id: String,
        unix_account_name: String,
        hostname: String,
        service_name: String,
    },
    #[serde(rename = "authorization_update")]
    AuthorizationUpdate { id: String, state: String },
    #[serde(rename = "error")]
    Error { error_text: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "authorization_response")]
    AuthorizationResponse { id: String, state: String },
}

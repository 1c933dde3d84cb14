//! Codec between bus messages and websocket frames.

use serde_json::{Value, json};
use tracing::error;

use super::message::{ClientMessage, ServerMessage};
use crate::authorization::{AuthorizationResponseMessage, AuthorizationState};
use crate::broker::Message;
use crate::utils::error::DecodeFailed;

const RESPONSE_TYPE: &str = "authorization_response";

pub trait MessageProtocol: Send + Sync {
    /// Decode a frame received from a client.
    fn decode(&self, data: &str) -> Result<Message, DecodeFailed>;
    /// Encode a bus message for a client; `None` when the message is not
    /// meant to be sent to clients.
    fn encode(&self, msg: &Message) -> Option<String>;
    /// Wrap an error text in an error frame.
    fn encode_error(&self, error_text: &str) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WebsocketMessageProtocol;

impl WebsocketMessageProtocol {
    pub fn new() -> Self {
        Self
    }
}

impl MessageProtocol for WebsocketMessageProtocol {
    fn decode(&self, data: &str) -> Result<Message, DecodeFailed> {
        let value: Value = serde_json::from_str(data)
            .map_err(|_| DecodeFailed::new("Bad formatted message (not JSON)"))?;
        let Some(msg_type) = value.get("type") else {
            return Err(DecodeFailed::new("Bad formatted message: 'type'"));
        };
        if msg_type.as_str() != Some(RESPONSE_TYPE) {
            return Err(DecodeFailed::new("Unsupported message type"));
        }

        let ClientMessage::AuthorizationResponse { id, state } = serde_json::from_value(value)
            .map_err(|e| DecodeFailed::new(format!("Bad message format: {e}")))?;
        let state: AuthorizationState = state
            .parse()
            .map_err(|e| DecodeFailed::new(format!("Bad message format: {e}")))?;
        Ok(AuthorizationResponseMessage::new(id, state).into())
    }

    fn encode(&self, msg: &Message) -> Option<String> {
        let frame = match msg {
            Message::AuthorizationRequest(req) => ServerMessage::AuthorizationRequest {
                id: req.id.clone(),
                unix_account_name: req.unix_account_name.clone(),
                hostname: req.host_name.clone(),
                service_name: req.service_name.clone(),
            },
            Message::AuthorizationUpdate(update) => ServerMessage::AuthorizationUpdate {
                id: update.id.clone(),
                state: update.state.name().to_string(),
            },
            Message::AuthorizationResponse(_) => return None,
        };
        serde_json::to_string(&frame)
            .inspect_err(|e| error!("Failed to serialize {}: {e}", msg.kind()))
            .ok()
    }

    fn encode_error(&self, error_text: &str) -> String {
        json!({ "type": "error", "error_text": error_text }).to_string()
    }
}

use tokio::sync::mpsc::UnboundedSender;
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

use crate::auth::User;

/// A live websocket connection of an authenticated user.
#[derive(Debug, Clone)]
pub struct Client {
    /// Unique per connection; a user may hold several.
    pub id: String,
    pub user: User,
    /// Frames queued here are written to the socket by the connection's send loop.
    pub sender: UnboundedSender<WsMessage>,
}

impl Client {
    pub fn new(user: User, sender: UnboundedSender<WsMessage>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user,
            sender,
        }
    }

    /// Queue a text frame. Returns false when the connection is gone.
    pub fn send_text(&self, text: String) -> bool {
        self.sender.send(WsMessage::Text(text.into())).is_ok()
    }
}

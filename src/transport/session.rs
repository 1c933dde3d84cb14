//! Websocket sessions on the message bus
//!
//! A `Session` is the bus-side face of one connection: it is subscribed to
//! its user's request and update topics and writes whatever it is notified
//! with to the connection. Frames read from the connection are decoded and
//! published on the user's response topic.
//!
//! `SessionManager` owns the open sessions of one listener. Closing a session
//! always unsubscribes it from every topic.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info, warn};

use super::protocol::MessageProtocol;
use crate::authorization::topics;
use crate::broker::{Message, MessageBus, Observer, Subscriber};
use crate::client::Client;

pub struct Session {
    client: Client,
    protocol: Arc<dyn MessageProtocol>,
}

impl Session {
    pub fn new(client: Client, protocol: Arc<dyn MessageProtocol>) -> Self {
        Self { client, protocol }
    }

    pub fn id(&self) -> &str {
        &self.client.id
    }

    /// Handle a text frame from the client.
    pub fn on_message(&self, bus: &MessageBus, data: &str) {
        match self.protocol.decode(data) {
            Ok(msg) => self.forward(bus, &msg),
            Err(e) => self.reply_error(&e.0),
        }
    }

    fn forward(&self, bus: &MessageBus, msg: &Message) {
        let topic = topics::user_responses(&self.client.user.id);
        if bus.publish(&topic, msg) {
            debug!(
                "Forwarded {} from {} on session {}",
                msg.kind(),
                self.client.user.name,
                self.client.id
            );
        } else {
            self.reply_error("Internal error, failed to forward message on bus (topic don't exist)");
        }
    }

    fn reply_error(&self, error_text: &str) {
        warn!("Session {}: {error_text}", self.client.id);
        self.write(self.protocol.encode_error(error_text));
    }

    fn write(&self, data: String) {
        if !self.client.send_text(data) {
            error!("Failed to send message: websocket is closed");
        }
    }
}

impl Observer for Session {
    fn notify(&self, msg: &Message) {
        match self.protocol.encode(msg) {
            Some(data) => {
                self.write(data);
                debug!(
                    "Sending {} to {} on session {}",
                    msg.kind(),
                    self.client.user.name,
                    self.client.id
                );
            }
            None => error!("Failed to encode {} received from message bus", msg.kind()),
        }
    }
}

pub struct SessionManager {
    bus: Arc<MessageBus>,
    protocol: Arc<dyn MessageProtocol>,
    sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl SessionManager {
    pub fn new(bus: Arc<MessageBus>, protocol: Arc<dyn MessageProtocol>) -> Self {
        Self {
            bus,
            protocol,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Arc<Session>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a session for `client` and subscribe it to its user's
    /// request and update topics.
    pub fn open(&self, client: Client) -> Arc<Session> {
        let session = Arc::new(Session::new(client, self.protocol.clone()));
        let user_id = session.client.user.id.clone();
        let subscriber: Subscriber = session.clone();
        self.bus.subscribe(subscriber.clone(), &topics::user_requests(&user_id));
        self.bus.subscribe(subscriber, &topics::user_updates(&user_id));
        self.sessions()
            .insert(session.id().to_string(), session.clone());

        info!(
            "New session id: {} for user {}",
            session.id(),
            session.client.user.name
        );
        session
    }

    /// Handle a text frame received on `session`.
    pub fn on_message(&self, session: &Session, data: &str) {
        session.on_message(&self.bus, data);
    }

    /// Remove the session and all its subscriptions. Returns false when no
    /// session has this id.
    pub fn close(&self, session_id: &str) -> bool {
        let Some(session) = self.sessions().remove(session_id) else {
            error!("Failed to remove session, no session found with id {session_id}");
            return false;
        };
        let user_name = session.client.user.name.clone();
        let subscriber: Subscriber = session;
        self.bus.unsubscribe_all(&subscriber);
        info!("Closed session id: {session_id} for user {user_name}");
        true
    }

    #[cfg(test)]
    pub(crate) fn get(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions().get(session_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions().is_empty()
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("sessions", &self.len())
            .finish_non_exhaustive()
    }
}

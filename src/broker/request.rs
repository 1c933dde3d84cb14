//! Correlated request/response on top of the message bus
//!
//! A `Request` publishes one message to a set of request topics and then
//! waits, until an absolute deadline, for the first accepted message on any
//! of its response topics.
//!
//! Guarantees per `send`:
//! - at most one of `ResponseCallback::on_response` / `on_expired` runs, and
//!   exactly one runs when the send itself succeeded
//! - late or duplicate responses are dropped once the first one is taken
//! - the internal response observer is unsubscribed from every topic before
//!   `send` returns, and also if the `send` future is dropped mid-wait

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::broker::engine::MessageBus;
use crate::broker::message::Message;
use crate::broker::topic::{Observer, Subscriber};

/// How the outcome of publishing to several request topics is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendPolicy {
    /// Every request topic must have had a subscriber.
    All,
    /// One request topic with a subscriber is enough.
    #[default]
    AtLeastOne,
}

impl SendPolicy {
    pub fn evaluate(self, status: &[bool]) -> bool {
        match self {
            SendPolicy::All => status.iter().all(|sent| *sent),
            SendPolicy::AtLeastOne => status.iter().any(|sent| *sent),
        }
    }
}

/// Receives the single terminal event of a request.
pub trait ResponseCallback {
    fn on_response(&mut self, msg: Message);
    fn on_expired(&mut self);
}

type Acceptor = Arc<dyn Fn(&Message) -> bool + Send + Sync>;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitState {
    RequestSent = 0,
    ResponseReceived = 1,
    Expired = 2,
}

/// Wait state shared between the waiting `send` and the response observer.
struct SharedState(AtomicU8);

impl SharedState {
    fn new() -> Self {
        Self(AtomicU8::new(WaitState::RequestSent as u8))
    }

    /// Leave `RequestSent` for `to`. Only the first caller wins.
    fn transition(&self, to: WaitState) -> bool {
        let won = self
            .0
            .compare_exchange(
                WaitState::RequestSent as u8,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if won {
            debug!("Request state changed to {to:?}");
        }
        won
    }
}

struct ResponseObserver {
    state: SharedState,
    slot: Mutex<Option<oneshot::Sender<Message>>>,
    accept: Option<Acceptor>,
}

impl ResponseObserver {
    fn new(sender: oneshot::Sender<Message>, accept: Option<Acceptor>) -> Self {
        Self {
            state: SharedState::new(),
            slot: Mutex::new(Some(sender)),
            accept,
        }
    }
}

impl Observer for ResponseObserver {
    fn notify(&self, msg: &Message) {
        if let Some(accept) = &self.accept {
            if !accept(msg) {
                debug!("Ignoring {} not addressed to this request", msg.kind());
                return;
            }
        }
        if !self.state.transition(WaitState::ResponseReceived) {
            return;
        }

        let sender = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sender) = sender {
            let _ = sender.send(msg.clone());
        }
    }
}

/// Unsubscribes the response observer when dropped.
struct SubscriptionGuard<'a> {
    bus: &'a MessageBus,
    subscriber: Subscriber,
}

impl Drop for SubscriptionGuard<'_> {
    fn drop(&mut self) {
        self.bus.unsubscribe_all(&self.subscriber);
    }
}

pub struct Request<'a, C> {
    bus: &'a MessageBus,
    callback: C,
    request_topics: Vec<String>,
    response_topics: Vec<String>,
    policy: SendPolicy,
    accept: Option<Acceptor>,
}

impl<'a, C: ResponseCallback> Request<'a, C> {
    pub fn new(
        bus: &'a MessageBus,
        callback: C,
        request_topics: Vec<String>,
        response_topics: Vec<String>,
        policy: SendPolicy,
    ) -> Self {
        Self {
            bus,
            callback,
            request_topics,
            response_topics,
            policy,
            accept: None,
        }
    }

    /// Only messages matching `accept` count as a response; anything else on
    /// the response topics is ignored.
    pub fn accept_only<F>(mut self, accept: F) -> Self
    where
        F: Fn(&Message) -> bool + Send + Sync + 'static,
    {
        self.accept = Some(Arc::new(accept));
        self
    }

    pub fn callback(&self) -> &C {
        &self.callback
    }

    pub fn into_callback(self) -> C {
        self.callback
    }

    /// Publish `msg` and wait until `expires` for a response.
    ///
    /// Returns whether the publish satisfied the send policy; whether a
    /// response arrived is reported through the callback only.
    pub async fn send(&mut self, msg: &Message, expires: Instant) -> bool {
        let (sender, receiver) = oneshot::channel();
        let observer = Arc::new(ResponseObserver::new(sender, self.accept.clone()));
        let guard = SubscriptionGuard {
            bus: self.bus,
            subscriber: observer.clone(),
        };
        for topic in &self.response_topics {
            self.bus.subscribe(guard.subscriber.clone(), topic);
        }

        let sent = self.publish_request(msg);
        if sent {
            self.wait_for_response(&observer, receiver, expires).await;
        }

        drop(guard);
        sent
    }

    fn publish_request(&self, msg: &Message) -> bool {
        let status: Vec<bool> = self
            .request_topics
            .iter()
            .map(|topic| self.bus.publish(topic, msg))
            .collect();

        let sent = self.policy.evaluate(&status);
        if !sent {
            debug!(
                "Send request failed for policy {:?} on {} topic(s)",
                self.policy,
                self.request_topics.len()
            );
        }
        sent
    }

    async fn wait_for_response(
        &mut self,
        observer: &ResponseObserver,
        mut receiver: oneshot::Receiver<Message>,
        expires: Instant,
    ) {
        match tokio::time::timeout_at(expires, &mut receiver).await {
            Ok(Ok(msg)) => self.callback.on_response(msg),
            Ok(Err(_)) => warn!("Response channel closed before a response arrived"),
            Err(_) => {
                if observer.state.transition(WaitState::Expired) {
                    self.callback.on_expired();
                } else if let Ok(msg) = receiver.await {
                    // A response claimed the state right at the deadline and
                    // is being handed over.
                    self.callback.on_response(msg);
                }
            }
        }
    }
}

impl<C> fmt::Debug for Request<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("request_topics", &self.request_topics)
            .field("response_topics", &self.response_topics)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

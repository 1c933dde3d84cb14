//! Topic management
//!
//! A `Topic` holds the ordered list of observers subscribed to one topic name.
//! Observers are identified by the shared allocation they live in, never by
//! their content, and an observer appears at most once per topic: subscribing
//! twice is a no-op and a single `unsubscribe` removes it.
//!
//! Concurrency note: callers must synchronize access to `Topic` (the bus keeps
//! every topic behind its registry lock). `notify` is meant to run on a cloned
//! snapshot so that observers may call back into the bus.

use std::fmt;
use std::sync::Arc;

use crate::broker::message::Message;

/// Anything that can receive messages published on the bus.
///
/// `notify` runs synchronously on the publisher's task and must not block:
/// implementations enqueue onto a channel or flip local state.
pub trait Observer: Send + Sync {
    fn notify(&self, msg: &Message);
}

/// Shared handle under which an observer is registered on topics.
pub type Subscriber = Arc<dyn Observer>;

/// Reference equality for subscribers (same allocation, regardless of vtable).
pub fn is_same_subscriber(a: &Subscriber, b: &Subscriber) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

#[derive(Clone, Default)]
pub struct Topic {
    pub name: String,
    subscribers: Vec<Subscriber>,
}

impl Topic {
    /// Create a new topic with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            subscribers: Vec::new(),
        }
    }

    /// Append a subscriber. Duplicate adds are ignored.
    pub fn subscribe(&mut self, subscriber: Subscriber) {
        if !self.is_subscribed(&subscriber) {
            self.subscribers.push(subscriber);
        }
    }

    /// Remove a subscriber, returning whether it was present.
    pub fn unsubscribe(&mut self, subscriber: &Subscriber) -> bool {
        match self
            .subscribers
            .iter()
            .position(|s| is_same_subscriber(s, subscriber))
        {
            Some(index) => {
                self.subscribers.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn is_subscribed(&self, subscriber: &Subscriber) -> bool {
        self.subscribers
            .iter()
            .any(|s| is_same_subscriber(s, subscriber))
    }

    pub fn subscribers(&self) -> &[Subscriber] {
        &self.subscribers
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Deliver `msg` to every subscriber, in subscription order.
    pub fn notify(&self, msg: &Message) {
        for subscriber in &self.subscribers {
            subscriber.notify(msg);
        }
    }
}

impl fmt::Debug for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topic")
            .field("name", &self.name)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

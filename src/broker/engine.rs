//! Message bus engine
//!
//! This module contains the in-memory bus responsible for:
//! - keeping a registry of topics keyed by an opaque string
//! - creating topics on first subscribe and dropping them once empty
//! - delivering published messages to the current subscribers of a topic
//!
//! Concurrency and usage notes:
//! - The bus is shared as `Arc<MessageBus>`; every method takes `&self` and
//!   serializes registry mutations behind one mutex, covering both the
//!   "create topic if absent" check and the subscriber list change.
//! - `publish` clones the subscriber list under the lock and notifies after
//!   releasing it, so an observer may subscribe, unsubscribe or publish from
//!   inside its `notify` without deadlocking.
//! - A topic without subscribers never stays in the registry, so "no topic"
//!   and "nobody listening" are the same thing to callers of `publish`.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace};

use crate::broker::message::Message;
use crate::broker::topic::{Subscriber, Topic};

#[derive(Debug, Default)]
pub struct MessageBus {
    topics: Mutex<BTreeMap<String, Topic>>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    // Each critical section leaves the registry consistent, so a poisoned
    // lock is still safe to use.
    fn topics(&self) -> MutexGuard<'_, BTreeMap<String, Topic>> {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe to a topic. Automatically creates the topic if it doesn't exist.
    pub fn subscribe(&self, subscriber: Subscriber, topic: &str) {
        let mut topics = self.topics();
        topics
            .entry(topic.to_string())
            .or_insert_with(|| Topic::new(topic))
            .subscribe(subscriber);
        debug!("Subscribed to {topic}");
    }

    /// Unsubscribe from a topic. Returns false when the topic does not exist
    /// or the subscriber was not on it. The topic is dropped once empty.
    pub fn unsubscribe(&self, subscriber: &Subscriber, topic: &str) -> bool {
        let mut topics = self.topics();
        let Some(existing) = topics.get_mut(topic) else {
            return false;
        };

        let removed = existing.unsubscribe(subscriber);
        if existing.is_empty() {
            topics.remove(topic);
            debug!("Removed empty topic {topic}");
        }
        removed
    }

    /// Remove the subscriber from every topic it is on. A subscriber without
    /// any subscription is a no-op.
    pub fn unsubscribe_all(&self, subscriber: &Subscriber) {
        let mut topics = self.topics();
        for (name, topic) in topics.iter_mut() {
            if topic.unsubscribe(subscriber) {
                trace!("Unsubscribed from topic {name}");
            }
        }
        topics.retain(|_, topic| !topic.is_empty());
    }

    pub fn is_subscribed(&self, subscriber: &Subscriber, topic: &str) -> bool {
        self.topics()
            .get(topic)
            .is_some_and(|t| t.is_subscribed(subscriber))
    }

    /// Topics the subscriber is on, in registry order.
    pub fn subscribed_on(&self, subscriber: &Subscriber) -> Vec<String> {
        self.topics()
            .iter()
            .filter(|(_, topic)| topic.is_subscribed(subscriber))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Names of all live topics, in registry order.
    pub fn topic_names(&self) -> Vec<String> {
        self.topics().keys().cloned().collect()
    }

    /// Deliver `msg` to every subscriber of `topic`. Returns true iff the
    /// topic exists and had at least one subscriber.
    pub fn publish(&self, topic: &str, msg: &Message) -> bool {
        let snapshot = {
            let topics = self.topics();
            match topics.get(topic) {
                Some(existing) if !existing.is_empty() => existing.clone(),
                _ => {
                    debug!("Topic '{topic}' has no subscribers");
                    return false;
                }
            }
        };

        trace!(
            "Publishing {} to {} subscriber(s) on {topic}",
            msg.kind(),
            snapshot.subscribers().len()
        );
        snapshot.notify(msg);
        true
    }
}

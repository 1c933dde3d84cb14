//! The `broker` module is the in-process messaging core.
//!
//! - `topic`: a single topic's ordered subscriber list and the `Observer` trait.
//! - `engine`: the `MessageBus`, a registry of topics shared by the whole process.
//! - `message`: the `Message` values carried on the bus.
//! - `request`: correlated request/response with timeout and send policies.

pub mod engine;
pub mod message;
pub mod request;
pub mod topic;

pub use engine::MessageBus;
pub use message::Message;
pub use request::{Request, ResponseCallback, SendPolicy};
pub use topic::{Observer, Subscriber};

#[cfg(test)]
pub(crate) mod test_support;

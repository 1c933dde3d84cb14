//! The `transport` module is responsible for network communication.
//!
//! - `message` / `protocol`: the JSON frames exchanged with user clients and
//!   the codec turning them into bus messages.
//! - `session`: per-connection bus observers and their manager.
//! - `websocket`: the listener user clients connect to.
//! - `backchannel`: the HTTP endpoint hosts call to authorize a login.
//! - `admin`: HTTP administration of hosts and unix accounts.

pub mod admin;
pub mod backchannel;
pub mod message;
pub mod protocol;
pub mod session;
pub mod websocket;

pub use protocol::{MessageProtocol, WebsocketMessageProtocol};
pub use session::{Session, SessionManager};

#[cfg(test)]
mod backchannel_tests;
#[cfg(test)]
mod websocket_tests;

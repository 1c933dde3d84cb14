//! The `client` module defines a connected websocket peer.
//!
//! It provides the `Client` struct, which encapsulates the state of a single
//! authenticated connection: its unique identifier, the user it was opened
//! for, and the channel for sending frames to it.

pub mod connection;
pub use connection::Client;

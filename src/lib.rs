//! # popauth
//!
//! `popauth` is a human-in-the-loop login authorization gateway. A host asks,
//! over an authenticated back channel, whether a login to one of its unix
//! accounts may proceed; the request is pushed to the live websocket sessions
//! of the users associated with that account, and the first approve or deny
//! decides the login.
//!
//! ## Core Modules
//!
//! - `broker`: the in-process message bus and correlated request/response on top of it.
//! - `authorization`: the authorization workflow, its messages, states and topics.
//! - `transport`: the websocket listener, its JSON codec and sessions, and the HTTP back channel.
//! - `client`: a connected websocket peer.
//! - `auth`: users and session tokens.
//! - `persistence`: host and unix-account storage (JSON files or sled).
//! - `config`: layered configuration.
//! - `utils`: error types and logging setup.

pub mod auth;
pub mod authorization;
pub mod broker;
pub mod client;
pub mod config;
pub mod persistence;
pub mod transport;
pub mod utils;

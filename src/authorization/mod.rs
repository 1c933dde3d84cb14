//! The `authorization` module asks a unix account's owners whether a login
//! may proceed.
//!
//! - `state`: the outcome of a request.
//! - `messages`: payloads carried on the bus between the workflow and sessions.
//! - `topics`: per-user topic names.
//! - `workflow`: `UnixAccountAuthorization`, which drives one request end to end.

pub mod messages;
pub mod state;
pub mod topics;
pub mod workflow;

pub use messages::{
    AuthorizationRequestMessage, AuthorizationResponseMessage, AuthorizationUpdateMessage,
};
pub use state::{AuthorizationState, UnknownState};
pub use workflow::{
    AuthorizationRequestSubject, AuthorizationResponse, DEFAULT_TIMEOUT, UnixAccountAuthorization,
};

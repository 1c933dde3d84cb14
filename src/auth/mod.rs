//! The `auth` module resolves a session credential to a user.
//!
//! The websocket handshake hands the session cookie to a `UserSerializer`;
//! an unauthenticated result (no id, or `Privilege::None`) refuses the
//! connection.

pub mod jwt;
pub mod user;

pub use jwt::{Claims, JwtUserSerializer};
pub use user::{Privilege, UnknownPrivilege, User};

use crate::utils::error::TokenError;

/// Turns users into session tokens and back.
pub trait UserSerializer: Send + Sync {
    fn serialize(&self, user: &User) -> Result<String, TokenError>;
    /// Any invalid, expired or tampered token yields `User::anonymous()`.
    fn unserialize(&self, token: &str) -> User;
}

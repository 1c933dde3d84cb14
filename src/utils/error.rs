//! The `error` module defines the error types shared across `popauth`.
//!
//! Only failures that a caller can act on are errors here. Authorization
//! outcomes, including lookups that find nothing, are values
//! (`AuthorizationResponse`), never errors.

use thiserror::Error;

/// A wire message from a client could not be turned into a bus message.
/// The text is meant to be sent back to the client as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct DecodeFailed(pub String);

impl DecodeFailed {
    pub fn new(cause: impl Into<String>) -> Self {
        Self(cause.into())
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("sled database error: {0}")]
    Sled(#[from] sled::Error),
    #[error("unknown storage backend '{0}'")]
    UnknownBackend(String),
}

#[derive(Debug, Error)]
#[error("failed to sign session token: {0}")]
pub struct TokenError(#[from] pub jsonwebtoken::errors::Error);

/// Top-level error for the binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

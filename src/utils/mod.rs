//! The `utils` module provides a collection of utility functions and common
//! definitions used across the `popauth` application: error types and the
//! tracing setup.

pub mod error;
pub mod logging;

pub use error::{AppError, DecodeFailed, StorageError, TokenError};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outcome of an authorization request.
///
/// `Waiting` is only the initial value of a pending response; every request
/// ends in one of the other four states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorizationState {
    #[default]
    Waiting,
    Expired,
    Authorized,
    Unauthorized,
    Error,
}

impl AuthorizationState {
    pub const ALL: [AuthorizationState; 5] = [
        AuthorizationState::Waiting,
        AuthorizationState::Expired,
        AuthorizationState::Authorized,
        AuthorizationState::Unauthorized,
        AuthorizationState::Error,
    ];

    /// Name used on the wire and in logs.
    pub fn name(self) -> &'static str {
        match self {
            AuthorizationState::Waiting => "WAITING",
            AuthorizationState::Expired => "EXPIRED",
            AuthorizationState::Authorized => "AUTHORIZED",
            AuthorizationState::Unauthorized => "UNAUTHORIZED",
            AuthorizationState::Error => "ERROR",
        }
    }
}

impl fmt::Display for AuthorizationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("State '{0}' unknown")]
pub struct UnknownState(pub String);

impl FromStr for AuthorizationState {
    type Err = UnknownState;

    /// Exact, case-sensitive match on the state name.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.name() == name)
            .ok_or_else(|| UnknownState(name.to_string()))
    }
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privilege {
    #[default]
    None,
    User,
    Administrator,
}

impl Privilege {
    pub fn name(self) -> &'static str {
        match self {
            Privilege::None => "none",
            Privilege::User => "user",
            Privilege::Administrator => "administrator",
        }
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Privilege '{0}' unknown")]
pub struct UnknownPrivilege(pub String);

impl FromStr for Privilege {
    type Err = UnknownPrivilege;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_lowercase().as_str() {
            "none" => Ok(Privilege::None),
            "user" => Ok(Privilege::User),
            "administrator" | "admin" => Ok(Privilege::Administrator),
            _ => Err(UnknownPrivilege(name.to_string())),
        }
    }
}

/// An application user, the owner of live sessions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct User {
    pub id: String,
    pub name: String,
    pub privilege: Privilege,
}

impl User {
    pub fn new(id: impl Into<String>, name: impl Into<String>, privilege: Privilege) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            privilege,
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        !self.id.is_empty() && self.privilege != Privilege::None
    }
}

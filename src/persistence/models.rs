use serde::{Deserialize, Serialize};

/// A machine allowed to ask for login authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub id: String,
    pub name: String,
}

impl Host {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// An operating-system login identity on a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnixAccount {
    pub id: u32,
    pub name: String,
}

impl UnixAccount {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Stored form of a unix account, with the users allowed to decide on its logins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct UnixAccountRecord {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub associated_user_accounts: Vec<String>,
}

impl UnixAccountRecord {
    pub fn new(account: UnixAccount, associated_user_id: Option<&str>) -> Self {
        Self {
            id: account.id,
            name: account.name,
            associated_user_accounts: associated_user_id.map(str::to_string).into_iter().collect(),
        }
    }

    pub fn account(&self) -> UnixAccount {
        UnixAccount::new(self.id, self.name.clone())
    }

    /// Adds the user unless already present.
    pub fn associate(&mut self, user_id: &str) -> bool {
        if self.associated_user_accounts.iter().any(|u| u == user_id) {
            return false;
        }
        self.associated_user_accounts.push(user_id.to_string());
        true
    }

    pub fn disassociate(&mut self, user_id: &str) -> bool {
        let before = self.associated_user_accounts.len();
        self.associated_user_accounts.retain(|u| u != user_id);
        before != self.associated_user_accounts.len()
    }
}

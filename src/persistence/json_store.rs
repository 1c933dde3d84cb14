//! Flat-file JSON storage
//!
//! Each record kind is one JSON array document, loaded fully on open and
//! rewritten (pretty-printed) after every change. A document that does not
//! exist yet loads as empty and is created by the first save. A change becomes
//! visible only once its save succeeded.
//!
//! Documents:
//! - hosts: `[{"id": "...", "name": "..."}]`
//! - unix accounts: `[{"id": 1000, "name": "...", "associated_user_accounts": ["..."]}]`

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use super::models::{Host, UnixAccount, UnixAccountRecord};
use super::{HostStorage, UnixAccountStorage};
use crate::utils::error::StorageError;

/// Reads and writes a whole document.
pub trait IoStorage: Send + Sync {
    /// The stored document, or `None` when nothing was written yet.
    fn read(&self) -> Result<Option<String>, StorageError>;
    fn write(&self, data: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl IoStorage for FileStorage {
    fn read(&self) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, data: &str) -> Result<(), StorageError> {
        fs::write(&self.path, data)?;
        Ok(())
    }
}

/// A document kept in memory only; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: Mutex<Option<String>>,
}

impl MemoryStorage {
    #[cfg(test)]
    pub(crate) fn with_document(data: impl Into<String>) -> Self {
        Self {
            data: Mutex::new(Some(data.into())),
        }
    }

    pub fn document(&self) -> Option<String> {
        self.data
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl IoStorage for MemoryStorage {
    fn read(&self) -> Result<Option<String>, StorageError> {
        Ok(self.document())
    }

    fn write(&self, data: &str) -> Result<(), StorageError> {
        *self.data.lock().unwrap_or_else(PoisonError::into_inner) = Some(data.to_string());
        Ok(())
    }
}

struct JsonDocument<T> {
    io: Box<dyn IoStorage>,
    records: Mutex<Vec<T>>,
}

impl<T: Clone + Serialize + DeserializeOwned> JsonDocument<T> {
    fn load(io: Box<dyn IoStorage>) -> Result<Self, StorageError> {
        let records = match io.read()? {
            Some(data) if !data.trim().is_empty() => serde_json::from_str(&data)?,
            _ => Vec::new(),
        };
        Ok(Self {
            io,
            records: Mutex::new(records),
        })
    }

    fn records(&self) -> MutexGuard<'_, Vec<T>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Save `updated` and, once written, make it the current content of `records`.
    fn commit(&self, records: &mut Vec<T>, updated: Vec<T>) -> Result<(), StorageError> {
        let data = serde_json::to_string_pretty(&updated)?;
        self.io.write(&data)?;
        *records = updated;
        Ok(())
    }
}

pub struct JsonHostStorage {
    document: JsonDocument<Host>,
}

impl JsonHostStorage {
    pub fn new(io: Box<dyn IoStorage>) -> Result<Self, StorageError> {
        Ok(Self {
            document: JsonDocument::load(io)?,
        })
    }
}

impl HostStorage for JsonHostStorage {
    fn add_host(&self, host: Host) -> Result<bool, StorageError> {
        if host.id.is_empty() {
            warn!("Refusing host '{}' without an id", host.name);
            return Ok(false);
        }
        let mut hosts = self.document.records();
        if hosts.iter().any(|h| h.id == host.id) {
            return Ok(false);
        }
        let mut updated = hosts.clone();
        updated.push(host);
        self.document.commit(&mut hosts, updated)?;
        Ok(true)
    }

    fn host_exists(&self, id: &str) -> bool {
        self.document.records().iter().any(|h| h.id == id)
    }

    fn remove_host_by_id(&self, id: &str) -> Result<bool, StorageError> {
        let mut hosts = self.document.records();
        let Some(index) = hosts.iter().position(|h| h.id == id) else {
            return Ok(false);
        };
        let mut updated = hosts.clone();
        updated.remove(index);
        self.document.commit(&mut hosts, updated)?;
        Ok(true)
    }

    fn get_host_by_id(&self, id: &str) -> Option<Host> {
        self.document.records().iter().find(|h| h.id == id).cloned()
    }

    fn get_all_hosts(&self) -> Vec<Host> {
        self.document.records().clone()
    }
}

pub struct JsonUnixAccountStorage {
    document: JsonDocument<UnixAccountRecord>,
}

impl JsonUnixAccountStorage {
    pub fn new(io: Box<dyn IoStorage>) -> Result<Self, StorageError> {
        Ok(Self {
            document: JsonDocument::load(io)?,
        })
    }

    fn update<F>(&self, id: u32, change: F) -> Result<bool, StorageError>
    where
        F: FnOnce(&mut UnixAccountRecord) -> bool,
    {
        let mut accounts = self.document.records();
        let mut updated = accounts.clone();
        let Some(record) = updated.iter_mut().find(|a| a.id == id) else {
            return Ok(false);
        };
        if !change(record) {
            return Ok(false);
        }
        self.document.commit(&mut accounts, updated)?;
        Ok(true)
    }
}

impl UnixAccountStorage for JsonUnixAccountStorage {
    fn add_unix_account(
        &self,
        account: UnixAccount,
        associated_user_id: Option<&str>,
    ) -> Result<bool, StorageError> {
        let mut accounts = self.document.records();
        if accounts.iter().any(|a| a.id == account.id) {
            return Ok(false);
        }
        let mut updated = accounts.clone();
        updated.push(UnixAccountRecord::new(account, associated_user_id));
        self.document.commit(&mut accounts, updated)?;
        Ok(true)
    }

    fn unix_account_exists(&self, id: u32) -> bool {
        self.document.records().iter().any(|a| a.id == id)
    }

    fn remove_unix_account_by_id(&self, id: u32) -> Result<bool, StorageError> {
        let mut accounts = self.document.records();
        let Some(index) = accounts.iter().position(|a| a.id == id) else {
            return Ok(false);
        };
        let mut updated = accounts.clone();
        updated.remove(index);
        self.document.commit(&mut accounts, updated)?;
        Ok(true)
    }

    fn get_unix_account_by_id(&self, id: u32) -> Option<UnixAccount> {
        self.document
            .records()
            .iter()
            .find(|a| a.id == id)
            .map(UnixAccountRecord::account)
    }

    fn get_all_unix_accounts(&self) -> Vec<UnixAccount> {
        self.document
            .records()
            .iter()
            .map(UnixAccountRecord::account)
            .collect()
    }

    fn associate_user_to_unix_account(&self, user_id: &str, id: u32) -> Result<bool, StorageError> {
        self.update(id, |record| record.associate(user_id))
    }

    fn disassociate_user_from_unix_account(
        &self,
        user_id: &str,
        id: u32,
    ) -> Result<bool, StorageError> {
        self.update(id, |record| record.disassociate(user_id))
    }

    fn get_associated_users_for_unix_account(&self, id: u32) -> Vec<String> {
        self.document
            .records()
            .iter()
            .find(|a| a.id == id)
            .map(|a| a.associated_user_accounts.clone())
            .unwrap_or_default()
    }
}

//! Storage backed by `sled`
//!
//! Hosts and unix accounts live in two trees of one database. Host keys are
//! the host id bytes, unix account keys are the big-endian account id so that
//! iteration yields accounts in id order. Values are the same JSON records the
//! flat-file backend writes.
//!
//! Read-modify-write operations (add, associate, disassociate) are serialized
//! by a process-local lock; the database is not meant to be shared between
//! processes. Every change is flushed before it is reported as done.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use sled::{Db, Tree};
use tracing::{error, warn};

use super::models::{Host, UnixAccount, UnixAccountRecord};
use super::{HostStorage, UnixAccountStorage};
use crate::utils::error::StorageError;

#[derive(Clone)]
pub struct SledStorage {
    db: Db,
    hosts: Tree,
    unix_accounts: Tree,
    write_lock: Arc<Mutex<()>>,
}

impl SledStorage {
    /// Open or create a sled database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        let hosts = db.open_tree("hosts")?;
        let unix_accounts = db.open_tree("unix_accounts")?;
        Ok(Self {
            db,
            hosts,
            unix_accounts,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    fn write_guard(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn unix_account(&self, id: u32) -> Option<UnixAccountRecord> {
        logged(read(&self.unix_accounts, &id.to_be_bytes()))
    }

    fn update_unix_account<F>(&self, id: u32, change: F) -> Result<bool, StorageError>
    where
        F: FnOnce(&mut UnixAccountRecord) -> bool,
    {
        let _guard = self.write_guard();
        let Some(mut record) = read::<UnixAccountRecord>(&self.unix_accounts, &id.to_be_bytes())?
        else {
            return Ok(false);
        };
        if !change(&mut record) {
            return Ok(false);
        }
        write(&self.unix_accounts, &id.to_be_bytes(), &record)?;
        self.flush()?;
        Ok(true)
    }
}

fn read<T: DeserializeOwned>(tree: &Tree, key: &[u8]) -> Result<Option<T>, StorageError> {
    match tree.get(key)? {
        Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
        None => Ok(None),
    }
}

fn write<T: Serialize>(tree: &Tree, key: &[u8], value: &T) -> Result<(), StorageError> {
    let serialized = serde_json::to_vec(value)?;
    tree.insert(key, serialized)?;
    Ok(())
}

// Unreadable entries are logged and skipped.
fn read_all<T: DeserializeOwned>(tree: &Tree) -> Vec<T> {
    tree.iter()
        .filter_map(|entry| {
            let decoded = entry
                .map_err(StorageError::from)
                .and_then(|(_, value)| Ok(serde_json::from_slice(&value)?));
            decoded
                .inspect_err(|e| error!("Skipping unreadable storage entry: {e}"))
                .ok()
        })
        .collect()
}

// Lookups report "not found" on backend failure.
fn logged<T>(result: Result<Option<T>, StorageError>) -> Option<T> {
    result.unwrap_or_else(|e| {
        error!("Storage lookup failed: {e}");
        None
    })
}

impl HostStorage for SledStorage {
    fn add_host(&self, host: Host) -> Result<bool, StorageError> {
        if host.id.is_empty() {
            warn!("Refusing host '{}' without an id", host.name);
            return Ok(false);
        }
        let _guard = self.write_guard();
        if self.hosts.contains_key(host.id.as_bytes())? {
            return Ok(false);
        }
        write(&self.hosts, host.id.as_bytes(), &host)?;
        self.flush()?;
        Ok(true)
    }

    fn host_exists(&self, id: &str) -> bool {
        self.hosts.contains_key(id.as_bytes()).unwrap_or_else(|e| {
            error!("Storage lookup failed: {e}");
            false
        })
    }

    fn remove_host_by_id(&self, id: &str) -> Result<bool, StorageError> {
        let removed = self.hosts.remove(id.as_bytes())?.is_some();
        if removed {
            self.flush()?;
        }
        Ok(removed)
    }

    fn get_host_by_id(&self, id: &str) -> Option<Host> {
        logged(read(&self.hosts, id.as_bytes()))
    }

    fn get_all_hosts(&self) -> Vec<Host> {
        read_all(&self.hosts)
    }
}

impl UnixAccountStorage for SledStorage {
    fn add_unix_account(
        &self,
        account: UnixAccount,
        associated_user_id: Option<&str>,
    ) -> Result<bool, StorageError> {
        let _guard = self.write_guard();
        let key = account.id.to_be_bytes();
        if self.unix_accounts.contains_key(key)? {
            return Ok(false);
        }
        write(
            &self.unix_accounts,
            &key,
            &UnixAccountRecord::new(account, associated_user_id),
        )?;
        self.flush()?;
        Ok(true)
    }

    fn unix_account_exists(&self, id: u32) -> bool {
        self.unix_account(id).is_some()
    }

    fn remove_unix_account_by_id(&self, id: u32) -> Result<bool, StorageError> {
        let removed = self.unix_accounts.remove(id.to_be_bytes())?.is_some();
        if removed {
            self.flush()?;
        }
        Ok(removed)
    }

    fn get_unix_account_by_id(&self, id: u32) -> Option<UnixAccount> {
        self.unix_account(id).map(|record| record.account())
    }

    fn get_all_unix_accounts(&self) -> Vec<UnixAccount> {
        read_all::<UnixAccountRecord>(&self.unix_accounts)
            .iter()
            .map(UnixAccountRecord::account)
            .collect()
    }

    fn associate_user_to_unix_account(&self, user_id: &str, id: u32) -> Result<bool, StorageError> {
        self.update_unix_account(id, |record| record.associate(user_id))
    }

    fn disassociate_user_from_unix_account(
        &self,
        user_id: &str,
        id: u32,
    ) -> Result<bool, StorageError> {
        self.update_unix_account(id, |record| record.disassociate(user_id))
    }

    fn get_associated_users_for_unix_account(&self, id: u32) -> Vec<String> {
        self.unix_account(id)
            .map(|record| record.associated_user_accounts)
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for SledStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStorage")
            .field("db", &"sled::Db")
            .finish()
    }
}

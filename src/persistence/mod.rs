//! The `persistence` module provides the host and unix-account lookups the
//! authorization workflow depends on.
//!
//! Storage is accessed only through the `HostStorage` and `UnixAccountStorage`
//! traits. Two backends implement both:
//! - `json_store`: flat JSON documents, one per record kind (the default)
//! - `sled_store`: an embedded `sled` database with one tree per record kind
//!
//! A lookup that finds nothing returns `None`; the workflow turns that into an
//! authorization error rather than failing.

pub mod bootstrap;
pub mod json_store;
pub mod models;
pub mod sled_store;

use std::path::Path;
use std::sync::Arc;

use crate::config::StorageSettings;
use crate::utils::error::StorageError;

pub use json_store::{FileStorage, IoStorage, JsonHostStorage, JsonUnixAccountStorage, MemoryStorage};
pub use models::{Host, UnixAccount};
pub use sled_store::SledStorage;

pub trait HostStorage: Send + Sync {
    /// Returns false when a host with the same id already exists.
    fn add_host(&self, host: Host) -> Result<bool, StorageError>;
    fn host_exists(&self, id: &str) -> bool;
    /// Returns false when no host has this id.
    fn remove_host_by_id(&self, id: &str) -> Result<bool, StorageError>;
    fn get_host_by_id(&self, id: &str) -> Option<Host>;
    fn get_all_hosts(&self) -> Vec<Host>;
}

pub trait UnixAccountStorage: Send + Sync {
    /// Returns false when an account with the same id already exists.
    fn add_unix_account(
        &self,
        account: UnixAccount,
        associated_user_id: Option<&str>,
    ) -> Result<bool, StorageError>;
    fn unix_account_exists(&self, id: u32) -> bool;
    fn remove_unix_account_by_id(&self, id: u32) -> Result<bool, StorageError>;
    fn get_unix_account_by_id(&self, id: u32) -> Option<UnixAccount>;
    fn get_all_unix_accounts(&self) -> Vec<UnixAccount>;
    /// Returns false when the account is missing or the user is already associated.
    fn associate_user_to_unix_account(&self, user_id: &str, id: u32) -> Result<bool, StorageError>;
    /// Returns false when the account is missing or the user was not associated.
    fn disassociate_user_from_unix_account(
        &self,
        user_id: &str,
        id: u32,
    ) -> Result<bool, StorageError>;
    /// Users allowed to decide on logins to the account; empty when unknown.
    fn get_associated_users_for_unix_account(&self, id: u32) -> Vec<String>;
}

/// The storages the server runs with.
#[derive(Clone)]
pub struct Storage {
    pub hosts: Arc<dyn HostStorage>,
    pub unix_accounts: Arc<dyn UnixAccountStorage>,
}

/// Open the backend named by `settings.backend` (`json`, `sled` or `memory`).
pub fn open_storage(settings: &StorageSettings) -> Result<Storage, StorageError> {
    match settings.backend.as_str() {
        "json" => {
            let dir = Path::new(&settings.location_dir);
            let hosts = JsonHostStorage::new(Box::new(FileStorage::new(
                dir.join(&settings.hosts_filename),
            )))?;
            let unix_accounts = JsonUnixAccountStorage::new(Box::new(FileStorage::new(
                dir.join(&settings.unix_accounts_filename),
            )))?;
            Ok(Storage {
                hosts: Arc::new(hosts),
                unix_accounts: Arc::new(unix_accounts),
            })
        }
        "sled" => {
            let store = Arc::new(SledStorage::open(&settings.sled_path)?);
            Ok(Storage {
                hosts: store.clone(),
                unix_accounts: store,
            })
        }
        "memory" => Ok(Storage {
            hosts: Arc::new(JsonHostStorage::new(Box::<MemoryStorage>::default())?),
            unix_accounts: Arc::new(JsonUnixAccountStorage::new(
                Box::<MemoryStorage>::default(),
            )?),
        }),
        other => Err(StorageError::UnknownBackend(other.to_string())),
    }
}

#[cfg(test)]
mod tests;

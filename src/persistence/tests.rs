use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tempfile::tempdir;

use super::bootstrap::seed;
use super::*;
use crate::config::{BootstrapHost, BootstrapSettings, BootstrapUnixAccount, StorageSettings};
use crate::utils::error::StorageError;

fn memory_storage() -> Storage {
    Storage {
        hosts: Arc::new(JsonHostStorage::new(Box::<MemoryStorage>::default()).unwrap()),
        unix_accounts: Arc::new(
            JsonUnixAccountStorage::new(Box::<MemoryStorage>::default()).unwrap(),
        ),
    }
}

fn exercise_hosts(hosts: &dyn HostStorage) {
    assert!(hosts.get_all_hosts().is_empty());
    assert!(hosts.add_host(Host::new("h1", "build01")).unwrap());
    assert!(!hosts.add_host(Host::new("h1", "other")).unwrap());
    assert!(hosts.add_host(Host::new("h2", "build02")).unwrap());
    assert!(!hosts.add_host(Host::new("", "ghost")).unwrap());
    assert!(!hosts.host_exists(""));

    assert!(hosts.host_exists("h1"));
    assert_eq!(hosts.get_host_by_id("h1"), Some(Host::new("h1", "build01")));
    assert_eq!(hosts.get_host_by_id("missing"), None);
    assert_eq!(hosts.get_all_hosts().len(), 2);

    assert!(hosts.remove_host_by_id("h1").unwrap());
    assert!(!hosts.remove_host_by_id("h1").unwrap());
    assert!(!hosts.host_exists("h1"));
}

fn exercise_unix_accounts(accounts: &dyn UnixAccountStorage) {
    assert!(
        accounts
            .add_unix_account(UnixAccount::new(1000, "deploy"), Some("alice"))
            .unwrap()
    );
    assert!(
        !accounts
            .add_unix_account(UnixAccount::new(1000, "again"), None)
            .unwrap()
    );
    assert!(
        accounts
            .add_unix_account(UnixAccount::new(1001, "backup"), None)
            .unwrap()
    );

    assert!(accounts.unix_account_exists(1000));
    assert_eq!(
        accounts.get_unix_account_by_id(1000),
        Some(UnixAccount::new(1000, "deploy"))
    );
    assert_eq!(accounts.get_unix_account_by_id(42), None);
    assert_eq!(accounts.get_all_unix_accounts().len(), 2);

    assert_eq!(accounts.get_associated_users_for_unix_account(1000), vec!["alice"]);
    assert!(accounts.get_associated_users_for_unix_account(1001).is_empty());
    assert!(accounts.get_associated_users_for_unix_account(42).is_empty());

    assert!(accounts.associate_user_to_unix_account("bob", 1000).unwrap());
    assert!(!accounts.associate_user_to_unix_account("bob", 1000).unwrap());
    assert!(!accounts.associate_user_to_unix_account("bob", 42).unwrap());
    assert_eq!(
        accounts.get_associated_users_for_unix_account(1000),
        vec!["alice", "bob"]
    );

    assert!(accounts.disassociate_user_from_unix_account("alice", 1000).unwrap());
    assert!(!accounts.disassociate_user_from_unix_account("alice", 1000).unwrap());
    assert_eq!(accounts.get_associated_users_for_unix_account(1000), vec!["bob"]);

    assert!(accounts.remove_unix_account_by_id(1001).unwrap());
    assert!(!accounts.remove_unix_account_by_id(1001).unwrap());
    assert!(!accounts.unix_account_exists(1001));
}

#[test]
fn json_backend_host_operations() {
    exercise_hosts(&JsonHostStorage::new(Box::<MemoryStorage>::default()).unwrap());
}

#[test]
fn json_backend_unix_account_operations() {
    exercise_unix_accounts(&JsonUnixAccountStorage::new(Box::<MemoryStorage>::default()).unwrap());
}

#[test]
fn sled_backend_operations() {
    let dir = tempdir().unwrap();
    let store = SledStorage::open(dir.path().join("db")).unwrap();
    exercise_hosts(&store);
    exercise_unix_accounts(&store);
}

#[test]
fn missing_file_loads_empty_and_is_created_on_first_save() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("hosts.json");
    let hosts = JsonHostStorage::new(Box::new(FileStorage::new(&path))).unwrap();
    assert!(hosts.get_all_hosts().is_empty());
    assert!(!path.exists());

    hosts.add_host(Host::new("h1", "build01")).unwrap();
    let reloaded = JsonHostStorage::new(Box::new(FileStorage::new(&path))).unwrap();
    assert_eq!(reloaded.get_host_by_id("h1"), Some(Host::new("h1", "build01")));
}

#[test]
fn reads_existing_unix_account_document() {
    let document = r#"[
        {"id": 1000, "name": "deploy", "associated_user_accounts": ["alice"]},
        {"id": 1001, "name": "backup"}
    ]"#;
    let accounts = JsonUnixAccountStorage::new(Box::new(MemoryStorage::with_document(document)))
        .unwrap();
    assert_eq!(accounts.get_associated_users_for_unix_account(1000), vec!["alice"]);
    assert_eq!(
        accounts.get_unix_account_by_id(1001),
        Some(UnixAccount::new(1001, "backup"))
    );
}

#[test]
fn writes_pretty_json_array() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("unix_accounts.json");
    let accounts = JsonUnixAccountStorage::new(Box::new(FileStorage::new(&path))).unwrap();
    accounts
        .add_unix_account(UnixAccount::new(1000, "deploy"), Some("alice"))
        .unwrap();

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(
        written,
        serde_json::json!([
            {"id": 1000, "name": "deploy", "associated_user_accounts": ["alice"]}
        ])
    );
}

#[test]
fn invalid_document_is_an_error() {
    let result = JsonHostStorage::new(Box::new(MemoryStorage::with_document("not json")));
    assert!(matches!(result, Err(StorageError::Json(_))));
}

#[test]
fn unknown_backend_is_rejected() {
    let settings = StorageSettings {
        backend: "postgres".to_string(),
        location_dir: ".".to_string(),
        hosts_filename: "hosts.json".to_string(),
        unix_accounts_filename: "unix_accounts.json".to_string(),
        sled_path: "db".to_string(),
    };
    assert!(matches!(
        open_storage(&settings),
        Err(StorageError::UnknownBackend(name)) if name == "postgres"
    ));
}

#[test]
fn json_backend_opens_from_settings() {
    let dir = tempdir().unwrap();
    let settings = StorageSettings {
        backend: "json".to_string(),
        location_dir: dir.path().to_string_lossy().into_owned(),
        hosts_filename: "hosts.json".to_string(),
        unix_accounts_filename: "unix_accounts.json".to_string(),
        sled_path: "unused".to_string(),
    };
    let storage = open_storage(&settings).unwrap();
    storage.hosts.add_host(Host::new("h1", "build01")).unwrap();
    assert!(dir.path().join("hosts.json").exists());
}

#[test]
fn bootstrap_seeds_missing_records_only() {
    let storage = memory_storage();
    storage.hosts.add_host(Host::new("h1", "kept")).unwrap();
    storage
        .unix_accounts
        .add_unix_account(UnixAccount::new(1001, "backup"), None)
        .unwrap();

    let settings = BootstrapSettings {
        hosts: vec![
            BootstrapHost {
                id: "h1".to_string(),
                name: "replaced".to_string(),
            },
            BootstrapHost {
                id: "h2".to_string(),
                name: "build02".to_string(),
            },
        ],
        unix_accounts: vec![
            BootstrapUnixAccount {
                id: 1000,
                name: "deploy".to_string(),
                associated_users: vec!["alice".to_string(), "bob".to_string()],
            },
            BootstrapUnixAccount {
                id: 1001,
                name: "backup".to_string(),
                associated_users: vec!["carol".to_string()],
            },
        ],
    };

    seed(&storage, &settings).unwrap();
    seed(&storage, &settings).unwrap();

    assert_eq!(storage.hosts.get_host_by_id("h1").unwrap().name, "kept");
    assert!(storage.hosts.host_exists("h2"));
    assert_eq!(
        storage.unix_accounts.get_associated_users_for_unix_account(1000),
        vec!["alice", "bob"]
    );
    assert_eq!(
        storage.unix_accounts.get_associated_users_for_unix_account(1001),
        vec!["carol"]
    );
}

/// Writes fail while `broken` is set.
#[derive(Default)]
struct FlakyStorage {
    inner: MemoryStorage,
    broken: Arc<AtomicBool>,
}

impl IoStorage for FlakyStorage {
    fn read(&self) -> Result<Option<String>, StorageError> {
        self.inner.read()
    }

    fn write(&self, data: &str) -> Result<(), StorageError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(io::Error::other("disk full").into());
        }
        self.inner.write(data)
    }
}

fn flaky() -> (Box<FlakyStorage>, Arc<AtomicBool>) {
    let storage = Box::<FlakyStorage>::default();
    let broken = storage.broken.clone();
    (storage, broken)
}

#[test]
fn failed_host_save_leaves_records_unchanged() {
    let (storage, broken) = flaky();
    let hosts = JsonHostStorage::new(storage).unwrap();
    assert!(hosts.add_host(Host::new("h1", "build01")).unwrap());

    broken.store(true, Ordering::SeqCst);
    assert!(matches!(
        hosts.add_host(Host::new("h2", "build02")),
        Err(StorageError::Io(_))
    ));
    assert!(hosts.remove_host_by_id("h1").is_err());
    assert_eq!(hosts.get_host_by_id("h2"), None);
    assert!(hosts.host_exists("h1"));

    broken.store(false, Ordering::SeqCst);
    assert!(hosts.add_host(Host::new("h2", "build02")).unwrap());
    assert_eq!(hosts.get_all_hosts().len(), 2);
}

#[test]
fn failed_unix_account_save_leaves_records_unchanged() {
    let (storage, broken) = flaky();
    let accounts = JsonUnixAccountStorage::new(storage).unwrap();
    assert!(
        accounts
            .add_unix_account(UnixAccount::new(1000, "deploy"), Some("alice"))
            .unwrap()
    );

    broken.store(true, Ordering::SeqCst);
    assert!(
        accounts
            .add_unix_account(UnixAccount::new(1001, "backup"), None)
            .is_err()
    );
    assert!(accounts.associate_user_to_unix_account("bob", 1000).is_err());
    assert!(accounts.disassociate_user_from_unix_account("alice", 1000).is_err());
    assert!(accounts.remove_unix_account_by_id(1000).is_err());
    assert!(!accounts.unix_account_exists(1001));
    assert_eq!(accounts.get_associated_users_for_unix_account(1000), vec!["alice"]);

    broken.store(false, Ordering::SeqCst);
    assert!(
        accounts
            .add_unix_account(UnixAccount::new(1001, "backup"), None)
            .unwrap()
    );
    assert!(accounts.associate_user_to_unix_account("bob", 1000).unwrap());
}

#[test]
fn sled_listing_skips_unreadable_entries() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("db");
    {
        let db = sled::open(&path).unwrap();
        let hosts = db.open_tree("hosts").unwrap();
        hosts.insert("bad", "not json").unwrap();
        hosts
            .insert("h1", serde_json::to_vec(&Host::new("h1", "build01")).unwrap())
            .unwrap();
        db.flush().unwrap();
    }

    let store = SledStorage::open(&path).unwrap();
    assert_eq!(store.get_all_hosts(), vec![Host::new("h1", "build01")]);
    assert_eq!(store.get_host_by_id("bad"), None);
}

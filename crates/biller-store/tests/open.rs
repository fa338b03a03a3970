//! File-backed store tests: schema creation on first open and persistence
//! across reopen.

use std::path::PathBuf;
use std::sync::Arc;

use biller_store::{AccountStore, CredentialHasher, SqliteAccountStore, StoreError};

/// A database path under the system temp dir, removed on drop.
struct TempDb(PathBuf);

impl TempDb {
    fn new(tag: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "biller-store-{tag}-{}.db",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        Self(path)
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

fn hasher() -> CredentialHasher {
    CredentialHasher::with_cost(8, 1).expect("valid cost")
}

#[test]
fn test_open_missing_file_creates_schema() {
    let db = TempDb::new("fresh");
    assert!(!db.0.exists());

    let store = SqliteAccountStore::open(&db.0, hasher()).expect("should open");

    assert!(db.0.exists());
    store
        .create_account("alice", "secret")
        .expect("schema should exist");
}

#[test]
fn test_reopen_keeps_accounts() {
    let db = TempDb::new("reopen");
    let id = {
        let store = SqliteAccountStore::open(&db.0, hasher()).unwrap();
        store.create_account("alice", "secret").unwrap()
    };

    let store = SqliteAccountStore::open(&db.0, hasher()).expect("should reopen");

    let cred = store.lookup_credential("alice").unwrap().expect("persisted");
    assert_eq!(cred.account.biller_id, id);
    assert!(cred.verify("secret"));
}

#[test]
fn test_concurrent_duplicate_inserts_only_one_wins() {
    let db = TempDb::new("race");
    let store = Arc::new(SqliteAccountStore::open(&db.0, hasher()).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || store.create_account("alice", "secret"))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let created = results.iter().filter(|r| r.is_ok()).count();
    let duplicates = results
        .iter()
        .filter(|r| matches!(r, Err(StoreError::DuplicateName(_))))
        .count();
    assert_eq!(created, 1);
    assert_eq!(duplicates, 7);
}

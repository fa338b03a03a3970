//! SQLite-backed [`AccountStore`].
//!
//! Only this module talks to the database.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use biller_protocol::BillerId;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};

use crate::{
    Account, AccountStore, Credential, CredentialHasher, PasswordSecret, StoreError,
};

const SCHEMA: &str = r#"
CREATE TABLE "player" (
    "billerid"  INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL UNIQUE,
    "name"      VARCHAR NOT NULL UNIQUE,
    "password"  VARCHAR NOT NULL,
    "squad"     VARCHAR,
    "usage"     INTEGER DEFAULT 0,
    "firstused" DATETIME DEFAULT CURRENT_TIMESTAMP
);
"#;

const SELECT_CREDENTIAL: &str = r#"
SELECT "billerid", "name", "password", CAST("squad" AS TEXT), "usage",
       strftime('%m-%d-%Y %H:%M:%S', "firstused")
FROM "player" WHERE "name" = ?1
"#;

/// An account store in a single SQLite file.
///
/// The connection sits behind a mutex, so statements from different zone
/// connections run one at a time.
pub struct SqliteAccountStore {
    conn: Mutex<Connection>,
    hasher: CredentialHasher,
}

impl SqliteAccountStore {
    /// Opens the store at `path`.
    ///
    /// A missing file is created together with the account schema. An
    /// existing file is used as-is.
    pub fn open(path: impl AsRef<Path>, hasher: CredentialHasher) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let fresh = !path.exists();

        let conn = Connection::open(path)?;
        if fresh {
            conn.execute_batch(SCHEMA)?;
            tracing::info!(path = %path.display(), "created account database");
        } else {
            tracing::info!(path = %path.display(), "opened account database");
        }

        Ok(Self {
            conn: Mutex::new(conn),
            hasher,
        })
    }

    /// Opens a private in-memory store (used in tests).
    pub fn in_memory(hasher: CredentialHasher) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            hasher,
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AccountStore for SqliteAccountStore {
    fn account_exists(&self, name: &str) -> bool {
        let found = self
            .conn()
            .query_row(
                r#"SELECT 1 FROM "player" WHERE "name" = ?1"#,
                params![name],
                |_| Ok(()),
            )
            .optional();

        match found {
            Ok(found) => found.is_some(),
            Err(e) => {
                tracing::error!(%name, error = %e, "account lookup failed");
                false
            }
        }
    }

    fn lookup_credential(&self, name: &str) -> Result<Option<Credential>, StoreError> {
        let credential = self
            .conn()
            .query_row(SELECT_CREDENTIAL, params![name], |row| {
                let usage: i64 = row.get::<_, Option<i64>>(4)?.unwrap_or(0);
                Ok(Credential {
                    account: Account {
                        biller_id: BillerId(row.get::<_, i64>(0)? as u64),
                        name: row.get(1)?,
                        squad: row.get(3)?,
                        usage: u64::try_from(usage).unwrap_or(0),
                        first_used: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                    },
                    secret: PasswordSecret::from_stored(row.get(2)?),
                })
            })
            .optional()?;
        Ok(credential)
    }

    fn create_account(&self, name: &str, password: &str) -> Result<BillerId, StoreError> {
        // Hash before taking the lock; argon2 is deliberately slow.
        let secret = self.hasher.hash(password)?;

        let conn = self.conn();
        let inserted = conn.execute(
            r#"INSERT INTO "player" ("name", "password") VALUES (?1, ?2)"#,
            params![name, secret.as_str()],
        );

        match inserted {
            Ok(1) => {}
            Ok(got) => {
                tracing::error!(%name, got, "account insert affected unexpected rows");
                return Err(StoreError::UnexpectedRowCount { expected: 1, got });
            }
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                return Err(StoreError::DuplicateName(name.to_string()));
            }
            Err(e) => {
                tracing::error!(%name, error = %e, "account insert failed");
                return Err(e.into());
            }
        }

        let biller_id = BillerId(conn.last_insert_rowid() as u64);
        tracing::info!(%name, %biller_id, "account created");
        Ok(biller_id)
    }

    fn add_usage(&self, biller_id: BillerId, seconds: u64) -> Result<(), StoreError> {
        let seconds = i64::try_from(seconds).unwrap_or(i64::MAX);
        let updated = self.conn().execute(
            r#"UPDATE "player" SET "usage" = COALESCE("usage", 0) + ?1 WHERE "billerid" = ?2"#,
            params![seconds, biller_id.0 as i64],
        )?;
        if updated != 1 {
            return Err(StoreError::UnexpectedRowCount {
                expected: 1,
                got: updated,
            });
        }
        Ok(())
    }
}

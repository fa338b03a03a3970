//! Account store for the zone biller.
//!
//! The biller only ever talks to accounts through the [`AccountStore`]
//! trait: existence checks, credential lookup, account creation and usage
//! accounting. [`SqliteAccountStore`] is the durable implementation; it
//! creates its schema the first time it opens a new file.
//!
//! Passwords never reach the database in the clear. [`CredentialHasher`]
//! turns them into salted argon2id strings and [`PasswordSecret`] checks a
//! login attempt against what was stored.

mod account;
mod error;
mod secret;
mod sqlite;

pub use account::{Account, AccountStore, Credential};
pub use error::StoreError;
pub use secret::{CredentialHasher, PasswordSecret};
pub use sqlite::SqliteAccountStore;

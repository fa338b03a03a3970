//! Account records and the store trait.

use biller_protocol::BillerId;

use crate::{PasswordSecret, StoreError};

/// The public part of an account row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub biller_id: BillerId,
    pub name: String,
    pub squad: Option<String>,
    /// Accumulated arena time in seconds.
    pub usage: u64,
    /// First-used date formatted `MM-DD-YYYY HH:MM:SS`.
    pub first_used: String,
}

/// An account together with its stored password secret.
#[derive(Debug, Clone)]
pub struct Credential {
    pub account: Account,
    pub secret: PasswordSecret,
}

impl Credential {
    /// Checks a login attempt against the stored secret.
    pub fn verify(&self, password: &str) -> bool {
        self.secret.verify(password)
    }
}

/// Durable account storage.
///
/// Implementations must be safe to share between every connection task and
/// serialize conflicting writes themselves; in particular two concurrent
/// [`create_account`](Self::create_account) calls for the same name must
/// not both succeed.
pub trait AccountStore: Send + Sync + 'static {
    /// Returns whether an account with this name exists.
    ///
    /// Store faults are logged and reported as "does not exist".
    fn account_exists(&self, name: &str) -> bool;

    /// Looks up the account and stored secret for a name.
    ///
    /// Returns `Ok(None)` when no such account exists.
    fn lookup_credential(&self, name: &str) -> Result<Option<Credential>, StoreError>;

    /// Creates an account and returns its newly assigned id.
    ///
    /// # Errors
    /// - [`StoreError::DuplicateName`] if the name is taken
    /// - [`StoreError::UnexpectedRowCount`] if the insert didn't add one row
    fn create_account(&self, name: &str, password: &str) -> Result<BillerId, StoreError>;

    /// Adds arena time to an account's cumulative usage.
    fn add_usage(&self, biller_id: BillerId, seconds: u64) -> Result<(), StoreError>;
}

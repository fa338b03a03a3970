//! Error types for the account store.

/// Errors raised by an [`AccountStore`](crate::AccountStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying SQLite database failed.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// An account with this name already exists.
    #[error("account name {0:?} is already taken")]
    DuplicateName(String),

    /// A write touched a different number of rows than it should have.
    #[error("expected {expected} affected row(s), got {got}")]
    UnexpectedRowCount { expected: usize, got: usize },

    /// Hashing a password failed.
    #[error("password hashing failed: {0}")]
    Hash(String),

    /// The configured hashing cost is outside what argon2 accepts.
    #[error("invalid hashing cost: {0}")]
    InvalidCost(String),
}

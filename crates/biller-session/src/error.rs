//! Error types for the session layer.

use biller_protocol::Pid;
use biller_store::StoreError;

/// Errors returned by [`Biller`](crate::Biller) operations.
///
/// Every variant except [`UnknownZone`](Self::UnknownZone) and
/// [`Store`](Self::Store) is an ordinary outcome of a player's request and
/// is reported back to the zone; the connection stays open.
#[derive(Debug, thiserror::Error)]
pub enum BillerError {
    /// The zone never sent CONNECT.
    #[error("zone {0:?} is not connected")]
    UnknownZone(String),

    /// No account has this name.
    #[error("{0:?} is not registered")]
    NotRegistered(String),

    /// The account already has an active session.
    #[error("{0:?} is already logged in")]
    AlreadyLoggedIn(String),

    /// The password didn't match.
    #[error("wrong password for {0:?}")]
    WrongPassword(String),

    /// Registration asked for a name that's taken.
    #[error("{0:?} is already registered")]
    DuplicateName(String),

    /// Registration asked for an empty name.
    #[error("invalid account name")]
    InvalidName,

    /// The zone reported a pid that is already bound to another player.
    #[error("pid {pid} is already in use in zone {zone:?}")]
    PidInUse { zone: String, pid: Pid },

    /// The account store failed.
    #[error("account store failure: {0}")]
    Store(#[source] StoreError),
}

impl From<StoreError> for BillerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateName(name) => Self::DuplicateName(name),
            other => Self::Store(other),
        }
    }
}

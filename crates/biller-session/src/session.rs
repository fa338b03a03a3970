//! Session types: the biller's record of a logged-in account.

use std::time::Instant;

use biller_protocol::{BillerId, Pid};

/// Where a logged-in player currently is.
///
/// ```text
///   (absent) ──login──→ LoggedIn ──enter arena──→ InArena
///       ↑                                            │
///       └──────────────── leave arena ───────────────┘
/// ```
///
/// Leaving the arena ends the session; there is no separate logout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Authenticated, not yet in an arena.
    LoggedIn,

    /// In an arena since the given instant. Time spent here is added to
    /// the account's usage when the session ends.
    InArena { since: Instant },
}

/// Identifies one particular login of an account.
///
/// Every successful login gets a fresh ticket, so a later session of the
/// same account at the same zone and pid is still told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(pub(crate) u64);

/// One logged-in account.
///
/// `zone` and `pid` are set together at login and always match the
/// binding in that zone's registry entry.
#[derive(Debug, Clone)]
pub struct Session {
    pub biller_id: BillerId,
    pub name: String,
    pub zone: String,
    pub pid: Pid,
    pub state: SessionState,
    pub ticket: Ticket,
}

impl Session {
    /// Returns `true` once the zone has reported the player in an arena.
    pub fn in_arena(&self) -> bool {
        matches!(self.state, SessionState::InArena { .. })
    }
}

//! Zone registry entries: which pid is which account, per zone.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use biller_protocol::{BillerId, Pid};

/// The pid → billerId table of one connected zone.
///
/// Each zone guards its table with its own lock, so traffic from one zone
/// never waits on another.
///
/// The zone's name is the key it is filed under in the biller.
#[derive(Debug, Default)]
pub struct Zone {
    players: RwLock<HashMap<Pid, BillerId>>,
}

impl Zone {
    /// Creates an entry with no bound pids.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `pid` to `biller_id`.
    ///
    /// Returns `false` and changes nothing if the pid is already bound.
    pub fn register(&self, pid: Pid, biller_id: BillerId) -> bool {
        let mut players = self.players.write().unwrap_or_else(PoisonError::into_inner);
        if players.contains_key(&pid) {
            return false;
        }
        players.insert(pid, biller_id);
        true
    }

    /// Returns the account bound to `pid`, if any.
    pub fn resolve(&self, pid: Pid) -> Option<BillerId> {
        self.players
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&pid)
            .copied()
    }

    /// Removes the binding for `pid`. Removing an unbound pid is a no-op.
    pub fn unregister(&self, pid: Pid) -> Option<BillerId> {
        self.players
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&pid)
    }

    /// Number of bound pids.
    pub fn len(&self) -> usize {
        self.players.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if no pid is bound.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

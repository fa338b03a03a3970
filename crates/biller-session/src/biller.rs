//! The biller: the process-wide authority over accounts, zones and sessions.
//!
//! Connection handlers never touch the maps in here directly; they call the
//! operations on [`Biller`], which keep three things consistent:
//!
//! - at most one [`Session`] per account,
//! - every session's `(zone, pid)` is bound in that zone's [`Zone`] entry,
//! - no `(zone, pid)` is bound to two accounts.
//!
//! # Locking
//!
//! The session map, the zone table and each zone's pid table have their own
//! locks. Anything that needs the session map together with a zone goes
//! through [`Biller::lock_all`], which always takes the session map first.
//! Nothing acquires the session map while holding a zone lock, so the order
//! can't invert.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use biller_protocol::{BillerId, Pid};
use biller_store::{Account, AccountStore};

use crate::{BillerError, Session, SessionState, Ticket, Zone};

type Sessions = HashMap<BillerId, Session>;
type Zones = HashMap<String, Arc<Zone>>;

/// Session map and zone table, locked in the one permitted order.
struct Locked<'a> {
    sessions: RwLockWriteGuard<'a, Sessions>,
    zones: RwLockReadGuard<'a, Zones>,
}

/// A successful login: the account summary and the ticket of the new session.
#[derive(Debug, Clone)]
pub struct Login {
    pub account: Account,
    pub ticket: Ticket,
}

/// The authority over accounts, zones and logged-in sessions.
///
/// Generic over the [`AccountStore`] so tests can run against an in-memory
/// database or a deliberately broken one.
pub struct Biller<S: AccountStore> {
    store: S,
    sessions: RwLock<Sessions>,
    zones: RwLock<Zones>,
    next_ticket: AtomicU64,
}

impl<S: AccountStore> Biller<S> {
    /// Creates a biller with no zones and no sessions.
    pub fn new(store: S) -> Self {
        Self {
            store,
            sessions: RwLock::new(HashMap::new()),
            zones: RwLock::new(HashMap::new()),
            next_ticket: AtomicU64::new(1),
        }
    }

    /// The account store this biller owns.
    pub fn store(&self) -> &S {
        &self.store
    }

    // =====================================================================
    // Zones
    // =====================================================================

    /// Creates the registry entry for a zone.
    ///
    /// Returns `false` if the zone already had one; that's not an error, a
    /// zone that reconnects keeps its entry.
    pub fn create_zone(&self, name: &str) -> bool {
        let mut zones = write(&self.zones);
        if zones.contains_key(name) {
            tracing::info!(zone = %name, "zone already registered");
            return false;
        }
        zones.insert(name.to_string(), Arc::new(Zone::new()));
        tracing::info!(zone = %name, "zone registered");
        true
    }

    /// Number of zones that ever connected.
    pub fn zone_count(&self) -> usize {
        read(&self.zones).len()
    }

    // =====================================================================
    // Accounts
    // =====================================================================

    /// Returns `true` if an account with this name exists.
    pub fn account_exists(&self, name: &str) -> bool {
        self.store.account_exists(name)
    }

    /// Creates a new account. Does not log it in.
    ///
    /// # Errors
    /// - [`BillerError::InvalidName`] for an empty name
    /// - [`BillerError::DuplicateName`] if the name is taken
    /// - [`BillerError::Store`] on a store fault
    pub fn register(&self, name: &str, password: &str) -> Result<BillerId, BillerError> {
        if name.trim().is_empty() {
            return Err(BillerError::InvalidName);
        }
        Ok(self.store.create_account(name, password)?)
    }

    // =====================================================================
    // Sessions
    // =====================================================================

    /// Authenticates `name` and binds it to `pid` in `zone`.
    ///
    /// Checks run in this order: zone known, account exists, not already
    /// logged in, password matches, pid free. Everything after the zone
    /// lookup happens under one critical section, so two concurrent logins
    /// for the same account can't both pass the "not logged in" check.
    ///
    /// Returns the account summary and the session's [`Ticket`] on success.
    pub fn login(
        &self,
        name: &str,
        password: &str,
        zone: &str,
        pid: Pid,
    ) -> Result<Login, BillerError> {
        let mut locked = self.lock_all();

        let entry = locked
            .zones
            .get(zone)
            .cloned()
            .ok_or_else(|| BillerError::UnknownZone(zone.to_string()))?;

        let credential = self
            .store
            .lookup_credential(name)?
            .ok_or_else(|| BillerError::NotRegistered(name.to_string()))?;
        let biller_id = credential.account.biller_id;

        if locked.sessions.contains_key(&biller_id) {
            return Err(BillerError::AlreadyLoggedIn(name.to_string()));
        }

        if !credential.verify(password) {
            return Err(BillerError::WrongPassword(name.to_string()));
        }

        if !entry.register(pid, biller_id) {
            return Err(BillerError::PidInUse {
                zone: zone.to_string(),
                pid,
            });
        }

        let ticket = Ticket(self.next_ticket.fetch_add(1, Ordering::Relaxed));
        locked.sessions.insert(
            biller_id,
            Session {
                biller_id,
                name: credential.account.name.clone(),
                zone: zone.to_string(),
                pid,
                state: SessionState::LoggedIn,
                ticket,
            },
        );
        tracing::info!(%name, %biller_id, %zone, %pid, "session created");

        Ok(Login {
            account: credential.account,
            ticket,
        })
    }

    /// Returns `true` if the account has an active session.
    pub fn is_logged_in(&self, biller_id: BillerId) -> bool {
        read(&self.sessions).contains_key(&biller_id)
    }

    /// Returns a copy of the account's session, if it has one.
    pub fn session(&self, biller_id: BillerId) -> Option<Session> {
        read(&self.sessions).get(&biller_id).cloned()
    }

    /// Number of active sessions.
    pub fn session_count(&self) -> usize {
        read(&self.sessions).len()
    }

    /// Maps a zone-local pid to the account bound to it.
    pub fn resolve_biller_id(&self, zone: &str, pid: Pid) -> Option<BillerId> {
        let entry = read(&self.zones).get(zone).cloned()?;
        entry.resolve(pid)
    }

    /// Maps a zone-local pid to the name of the account bound to it.
    pub fn resolve_name(&self, zone: &str, pid: Pid) -> Option<String> {
        let biller_id = self.resolve_biller_id(zone, pid)?;
        read(&self.sessions).get(&biller_id).map(|s| s.name.clone())
    }

    /// Marks the account's player as inside an arena.
    ///
    /// Returns `false` (and logs) if the account has no session. Entering
    /// again while already inside keeps the original entry time.
    pub fn enter_arena(&self, biller_id: BillerId) -> bool {
        let mut sessions = write(&self.sessions);
        let Some(session) = sessions.get_mut(&biller_id) else {
            tracing::warn!(%biller_id, "enter arena for unknown session");
            return false;
        };

        if session.state == SessionState::LoggedIn {
            session.state = SessionState::InArena {
                since: std::time::Instant::now(),
            };
        }
        tracing::debug!(%biller_id, zone = %session.zone, "entered arena");
        true
    }

    /// Ends the account's session and frees its pid in the zone.
    ///
    /// Arena time is added to the account's usage. Returns `false` (and
    /// logs) if there is no session or its zone has no registry entry;
    /// calling it twice is harmless.
    pub fn leave_arena(&self, biller_id: BillerId) -> bool {
        self.end_session(biller_id, None)
    }

    /// Ends the account's session only if it is still the login that
    /// produced `ticket`.
    ///
    /// A connection uses this to clean up after itself without touching a
    /// newer login of the same account. Returns `false` if the session is
    /// gone or belongs to another login.
    pub fn release(&self, biller_id: BillerId, ticket: Ticket) -> bool {
        self.end_session(biller_id, Some(ticket))
    }

    fn end_session(&self, biller_id: BillerId, ticket: Option<Ticket>) -> bool {
        let ended = {
            let mut locked = self.lock_all();

            let (zone, pid) = match locked.sessions.get(&biller_id) {
                Some(session) if ticket.is_some_and(|t| t != session.ticket) => {
                    tracing::debug!(%biller_id, "session belongs to a newer login");
                    return false;
                }
                Some(session) => (session.zone.clone(), session.pid),
                None => {
                    if ticket.is_none() {
                        tracing::warn!(%biller_id, "leave arena for unknown session");
                    }
                    return false;
                }
            };
            let Some(entry) = locked.zones.get(&zone) else {
                tracing::warn!(%biller_id, %zone, "leave arena for unknown zone");
                return false;
            };

            entry.unregister(pid);
            locked.sessions.remove(&biller_id)
        };

        if let Some(session) = ended {
            tracing::info!(
                name = %session.name,
                %biller_id,
                zone = %session.zone,
                "session ended"
            );
            if let SessionState::InArena { since } = session.state {
                self.record_usage(biller_id, since.elapsed().as_secs());
            }
        }
        true
    }

    fn record_usage(&self, biller_id: BillerId, seconds: u64) {
        if seconds == 0 {
            return;
        }
        if let Err(e) = self.store.add_usage(biller_id, seconds) {
            tracing::error!(%biller_id, seconds, error = %e, "failed to record usage");
        }
    }

    /// The only place the session map and zone table are locked together.
    fn lock_all(&self) -> Locked<'_> {
        let sessions = write(&self.sessions);
        let zones = read(&self.zones);
        Locked { sessions, zones }
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

// =========================================================================
// Tests
// =========================================================================

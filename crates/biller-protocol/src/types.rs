//! Core protocol types for the zone ↔ biller wire format.
//!
//! Inbound traffic (zone → biller) is a [`ZoneMessage`]; outbound traffic
//! (biller → zone) is a [`BillerMessage`]. Both are plain data: turning them
//! into and out of lines is the [`Codec`](crate::Codec)'s job.

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A zone-local, transient player id assigned by the game zone.
///
/// Two zones may use the same pid for different players; a pid only means
/// something together with the zone that reported it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pid(pub u32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The persistent, globally unique account id assigned by the account store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BillerId(pub u64);

impl fmt::Display for BillerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Version
// ---------------------------------------------------------------------------

/// A `major.minor.patch` protocol version as sent in `CONNECT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

/// The protocol version this biller speaks.
pub const PROTOCOL_VERSION: Version = Version {
    major: 1,
    minor: 3,
    patch: 1,
};

impl Version {
    /// Two versions are compatible when major and minor agree; the patch
    /// level is informational.
    pub fn is_compatible_with(&self, other: &Version) -> bool {
        self.major == other.major && self.minor == other.minor
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

// ---------------------------------------------------------------------------
// Inbound: zone → biller
// ---------------------------------------------------------------------------

/// `CONNECT` — the first line a zone sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connect {
    pub version: Version,
    pub sw_name: String,
    pub zone_name: String,
    pub host_name: String,
    pub password: String,
}

/// `PLOGIN` — a player is trying to log in (or register) through a zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PLogin {
    pub pid: Pid,
    /// Create the account before logging in.
    pub register: bool,
    pub name: String,
    pub password: String,
    pub ip: String,
    pub mac_id: u32,
    /// Continuum client id; empty for other clients.
    pub cont_id: String,
}

/// Every message a zone can send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneMessage {
    Connect(Connect),
    PLogin(PLogin),
    /// The player entered an arena. Fire-and-forget.
    PEnterArena { pid: Pid },
    /// The player left the zone. Fire-and-forget.
    PLeave { pid: Pid },
}

impl ZoneMessage {
    /// The wire tag of this message.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Connect(_) => tags::CONNECT,
            Self::PLogin(_) => tags::PLOGIN,
            Self::PEnterArena { .. } => tags::PENTERARENA,
            Self::PLeave { .. } => tags::PLEAVE,
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound: biller → zone
// ---------------------------------------------------------------------------

/// `POK` — a player login succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct POk {
    pub pid: Pid,
    /// Reserved free text; zones display it when non-empty.
    pub reserved_text: String,
    pub name: String,
    pub squad: String,
    pub biller_id: BillerId,
    /// Accumulated arena time in seconds.
    pub usage: u64,
    /// First-used date, already formatted for the wire.
    pub first_used: String,
}

/// Every message the biller sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillerMessage {
    ConnectOk {
        server_name: String,
        network: String,
    },
    ConnectBad {
        server_name: String,
        network: String,
        reason: String,
    },
    POk(POk),
    PBad {
        pid: Pid,
        /// Tells the zone to offer the player to create the name.
        new_name: bool,
        reason: String,
    },
}

impl BillerMessage {
    /// The wire tag of this message.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::ConnectOk { .. } => tags::CONNECTOK,
            Self::ConnectBad { .. } => tags::CONNECTBAD,
            Self::POk(_) => tags::POK,
            Self::PBad { .. } => tags::PBAD,
        }
    }
}

/// Wire tags.
pub mod tags {
    pub const CONNECT: &str = "CONNECT";
    pub const CONNECTOK: &str = "CONNECTOK";
    pub const CONNECTBAD: &str = "CONNECTBAD";
    pub const PLOGIN: &str = "PLOGIN";
    pub const POK: &str = "POK";
    pub const PBAD: &str = "PBAD";
    pub const PENTERARENA: &str = "PENTERARENA";
    pub const PLEAVE: &str = "PLEAVE";
}

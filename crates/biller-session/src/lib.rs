//! Zone registry and player sessions for the zone biller.
//!
//! [`Biller`] is the one authority every zone connection goes through. It
//! owns the account store, a [`Zone`] entry for each zone that connected and
//! a [`Session`] for each logged-in account.
//!
//! ```text
//! biller (server)   ← one handler task per zone connection
//!     ↕
//! biller-session    ← this crate: who is logged in, and where
//!     ↕
//! biller-store      ← accounts on disk
//! ```
//!
//! All operations are synchronous. None of them waits on the network, but
//! they take std locks and `login` holds the session lock across a password
//! check and a store lookup, so async callers run them on the blocking pool.

mod biller;
mod error;
mod session;
mod zone;

pub use biller::{Biller, Login};
pub use error::BillerError;
pub use session::{Session, SessionState, Ticket};
pub use zone::Zone;

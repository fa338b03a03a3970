//! Wire protocol for the zone biller.
//!
//! This crate defines the "language" zones and the biller speak:
//!
//! - **Types** ([`ZoneMessage`], [`BillerMessage`], [`Pid`], [`BillerId`],
//!   [`Version`]) — the messages that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`LineCodec`]) — how those messages are
//!   converted to and from colon-delimited lines.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while doing so.
//!
//! ```text
//! Transport (lines) → Protocol (ZoneMessage) → Biller (sessions, zones)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, LineCodec};
pub use error::ProtocolError;
pub use types::{
    BillerId, BillerMessage, Connect, PLogin, POk, PROTOCOL_VERSION, Pid, Version,
    ZoneMessage, tags,
};

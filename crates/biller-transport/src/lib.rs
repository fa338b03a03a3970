//! Transport abstraction layer for the zone biller.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! how zone processes reach the biller, and a newline-framed TCP
//! implementation ([`TcpTransport`], [`TcpConnection`]).
//!
//! A "message" at this layer is one line of bytes without its terminator.
//! Lines longer than [`MAX_LINE_LEN`] are a transport error and end the
//! connection.

#![allow(async_fn_in_trait)]

mod error;
mod tcp;

pub use error::TransportError;
pub use tcp::{TcpConnection, TcpTransport};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Longest line (excluding the line terminator) a peer may send.
pub const MAX_LINE_LEN: usize = 1023;

/// Process-unique number of an accepted connection, used to tell zone
/// links apart in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Hands out the next id. Ids start at 1 and are never reused.
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    ///
    /// Dropping the transport stops accepting; connections already handed
    /// out stay open.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;
}

/// A single connection that exchanges lines with a zone.
///
/// Reads and writes are independent: one task may sit in
/// [`recv`](Connection::recv) while another calls
/// [`send`](Connection::send) on the same connection.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends one line to the remote peer. The terminator is appended.
    async fn send(&self, line: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next line from the remote peer, without its terminator.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the write side of the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}

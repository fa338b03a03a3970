//! Unified error type for the biller server.

use biller_protocol::ProtocolError;
use biller_session::BillerError;
use biller_store::StoreError;
use biller_transport::TransportError;

/// Top-level error that wraps every crate-specific error.
///
/// The `#[from]` attribute on each variant generates the `From` impl, so
/// `?` converts sub-crate errors without ceremony.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A line that could not be decoded or a reply that could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A login or registration that the biller refused.
    #[error(transparent)]
    Session(#[from] BillerError),

    /// The account database could not be opened.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A biller operation's blocking task panicked or was cancelled.
    #[error("blocking task failed: {0}")]
    Blocking(#[from] tokio::task::JoinError),

    /// The configuration file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid JSON for [`BillerConfig`](crate::BillerConfig).
    #[error("invalid config: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

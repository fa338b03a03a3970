//! # Biller
//!
//! Session and authentication broker for game zone servers.
//!
//! Zone processes connect over TCP, identify themselves with CONNECT, and
//! then ask the biller to log players in (PLOGIN), and report when those
//! players enter an arena (PENTERARENA) or leave (PLEAVE). The biller owns
//! the account database and guarantees an account is logged in at most
//! once across every connected zone.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use biller::prelude::*;
//!
//! # async fn start() -> Result<(), ServerError> {
//! let server = BillerServer::builder()
//!     .bind("0.0.0.0:1850")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::BillerConfig;
pub use error::ServerError;
pub use server::{BillerServer, BillerServerBuilder};

pub mod prelude {
    pub use crate::{BillerConfig, BillerServer, BillerServerBuilder, ServerError};
    pub use biller_protocol::{BillerId, Pid, PROTOCOL_VERSION};
    pub use biller_session::{Biller, BillerError};
    pub use biller_store::{AccountStore, CredentialHasher, SqliteAccountStore};
}

//! `BillerServer` builder and accept loop.
//!
//! This is the entry point for running a biller. It ties the layers
//! together: transport → protocol → session → store.

use std::future::Future;
use std::sync::Arc;

use biller_protocol::LineCodec;
use biller_session::Biller;
use biller_store::{AccountStore, SqliteAccountStore};
use biller_transport::{Connection, TcpTransport, Transport};
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::handler::handle_connection;
use crate::{BillerConfig, ServerError};

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cloned across tasks. The [`Biller`] does
/// its own locking, so nothing here needs an outer mutex.
pub(crate) struct ServerState<S: AccountStore> {
    pub(crate) biller: Biller<S>,
    pub(crate) codec: LineCodec,
    pub(crate) config: BillerConfig,
}

/// Builder for configuring and starting a biller.
///
/// # Example
///
/// ```rust,ignore
/// use biller::prelude::*;
///
/// let server = BillerServer::builder()
///     .bind("127.0.0.1:1850")
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct BillerServerBuilder {
    config: BillerConfig,
}

impl BillerServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: BillerConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: BillerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the zone listener to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind = addr.to_string();
        self
    }

    /// Requires zones to send this password in CONNECT.
    pub fn zone_password(mut self, password: &str) -> Self {
        self.config.zone_password = Some(password.to_string());
        self
    }

    /// Opens the configured SQLite database and binds the listener.
    pub async fn build(self) -> Result<BillerServer<SqliteAccountStore>, ServerError> {
        let store = SqliteAccountStore::open(&self.config.database, self.config.hasher()?)?;
        self.build_with_store(store).await
    }

    /// Binds the listener and serves accounts from `store`.
    pub async fn build_with_store<S: AccountStore>(
        self,
        store: S,
    ) -> Result<BillerServer<S>, ServerError> {
        let transport = TcpTransport::bind(&self.config.bind).await?;

        let state = Arc::new(ServerState {
            biller: Biller::new(store),
            codec: LineCodec,
            config: self.config,
        });

        Ok(BillerServer { transport, state })
    }
}

impl Default for BillerServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound biller, ready to accept zone connections.
///
/// Call [`run()`](Self::run) or [`run_until()`](Self::run_until) to start
/// serving.
pub struct BillerServer<S: AccountStore> {
    transport: TcpTransport,
    state: Arc<ServerState<S>>,
}

impl BillerServer<SqliteAccountStore> {
    /// Creates a new builder.
    pub fn builder() -> BillerServerBuilder {
        BillerServerBuilder::new()
    }
}

impl<S: AccountStore> BillerServer<S> {
    /// Returns the local address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Serves until Ctrl+C.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Serves until `shutdown` completes.
    ///
    /// Each accepted connection runs in its own task. When `shutdown`
    /// fires the listener closes, every connection task is told to stop
    /// after the message it is processing, and this returns once all of
    /// them have exited.
    pub async fn run_until(
        self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), ServerError> {
        let Self {
            mut transport,
            state,
        } = self;
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut workers = JoinSet::new();

        tracing::info!(
            server = %state.config.server_name,
            network = %state.config.network,
            "biller running"
        );

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => break,

                accepted = transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&state);
                        let stop = stop_rx.clone();
                        workers.spawn(async move {
                            let conn_id = conn.id();
                            if let Err(e) = handle_connection(conn, state, stop).await {
                                tracing::debug!(%conn_id, error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },

                Some(joined) = workers.join_next(), if !workers.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!(error = %e, "connection task failed");
                    }
                }
            }
        }

        tracing::info!(connections = workers.len(), "shutting down");
        drop(transport);
        let _ = stop_tx.send(true);

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "connection task failed");
            }
        }

        tracing::info!(
            sessions = state.biller.session_count(),
            "biller stopped"
        );
        Ok(())
    }
}

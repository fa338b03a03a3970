//! Per-connection handler: CONNECT handshake, then player messages.
//!
//! Each accepted zone connection gets its own Tokio task running this
//! handler, plus a reader task that feeds it lines. The flow is:
//!   1. Wait for CONNECT → check version, zone name, zone password
//!   2. Reply CONNECTOK → the connection is bound to that zone
//!   3. Loop: PLOGIN gets POK/PBAD, PENTERARENA and PLEAVE get no reply
//!   4. On close or shutdown, end every session this connection created

use std::collections::HashMap;
use std::sync::Arc;

use biller_protocol::{
    BillerId, BillerMessage, Codec, Connect, PLogin, POk, PROTOCOL_VERSION, Pid, ProtocolError,
    ZoneMessage, tags,
};
use biller_session::{Biller, BillerError, Login, Ticket};
use biller_store::AccountStore;
use biller_transport::{Connection, TcpConnection};
use tokio::sync::{mpsc, watch};

use crate::ServerError;
use crate::server::ServerState;

/// Lines buffered between the reader task and the dispatch loop.
const LINE_QUEUE: usize = 32;

/// Where a connection is in its lifecycle.
enum Phase {
    /// Accepted, no CONNECT yet.
    AwaitingConnect,

    /// CONNECT accepted; every player message refers to this zone.
    Connected { zone: String },
}

/// What the dispatch loop does after a message.
enum Flow {
    Continue,
    Close,
}

/// Per-connection bookkeeping.
struct ZoneLink {
    phase: Phase,
    /// Sessions this connection created and hasn't seen PLEAVE for.
    logins: HashMap<BillerId, Ticket>,
}

impl ZoneLink {
    fn new() -> Self {
        Self {
            phase: Phase::AwaitingConnect,
            logins: HashMap::new(),
        }
    }

    fn zone(&self) -> Option<&str> {
        match &self.phase {
            Phase::AwaitingConnect => None,
            Phase::Connected { zone } => Some(zone.as_str()),
        }
    }
}

/// Handles a single zone connection from accept to close.
pub(crate) async fn handle_connection<S: AccountStore>(
    conn: TcpConnection,
    state: Arc<ServerState<S>>,
    mut stop: watch::Receiver<bool>,
) -> Result<(), ServerError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    let (line_tx, mut lines) = mpsc::channel(LINE_QUEUE);
    let reader = tokio::spawn(read_lines(Arc::clone(&conn), line_tx));

    let mut link = ZoneLink::new();
    let result = dispatch(&conn, &state, &mut link, &mut lines, &mut stop).await;

    reader.abort();
    release_sessions(&state, &mut link).await;
    if let Err(e) = conn.close().await {
        tracing::debug!(%conn_id, error = %e, "close failed");
    }
    tracing::info!(%conn_id, zone = link.zone().unwrap_or("-"), "connection closed");

    result
}

/// Reads lines until the zone hangs up or the dispatch loop goes away.
async fn read_lines(conn: Arc<TcpConnection>, lines: mpsc::Sender<Vec<u8>>) {
    let conn_id = conn.id();
    loop {
        match conn.recv().await {
            Ok(Some(line)) => {
                if lines.send(line).await.is_err() {
                    break;
                }
            }
            Ok(None) => {
                tracing::debug!(%conn_id, "zone closed the connection");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
        }
    }
}

async fn dispatch<S: AccountStore>(
    conn: &TcpConnection,
    state: &Arc<ServerState<S>>,
    link: &mut ZoneLink,
    lines: &mut mpsc::Receiver<Vec<u8>>,
    stop: &mut watch::Receiver<bool>,
) -> Result<(), ServerError> {
    let connect_deadline = tokio::time::sleep(state.config.connect_timeout());
    tokio::pin!(connect_deadline);

    loop {
        if *stop.borrow() {
            tracing::debug!(conn_id = %conn.id(), "stopping for shutdown");
            return Ok(());
        }

        let line = tokio::select! {
            changed = stop.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                continue;
            }

            () = &mut connect_deadline, if link.zone().is_none() => {
                tracing::info!(conn_id = %conn.id(), "no CONNECT before timeout");
                return Ok(());
            }

            line = lines.recv() => match line {
                Some(line) => line,
                None => return Ok(()),
            },
        };

        tracing::debug!(
            conn_id = %conn.id(),
            line = %String::from_utf8_lossy(&line),
            "recv"
        );

        if let Flow::Close = handle_line(conn, state, link, &line).await? {
            return Ok(());
        }
    }
}

async fn handle_line<S: AccountStore>(
    conn: &TcpConnection,
    state: &Arc<ServerState<S>>,
    link: &mut ZoneLink,
    line: &[u8],
) -> Result<Flow, ServerError> {
    let decoded = state.codec.decode(line);

    let Some(zone) = link.zone().map(str::to_owned) else {
        return match decoded {
            Ok(ZoneMessage::Connect(connect)) => handle_connect(conn, state, link, connect).await,
            Err(e) if e.tag() == Some(tags::CONNECT) => {
                tracing::info!(conn_id = %conn.id(), error = %e, "malformed CONNECT");
                connect_bad(conn, state, "Wrong connection message").await
            }
            Ok(other) => {
                tracing::info!(conn_id = %conn.id(), tag = other.tag(), "message before CONNECT");
                connect_bad(conn, state, "Not yet connected").await
            }
            Err(_) => connect_bad(conn, state, "Not yet connected").await,
        };
    };

    match decoded {
        Ok(ZoneMessage::Connect(_)) => connect_bad(conn, state, "Already connected").await,
        Err(e) if e.tag() == Some(tags::CONNECT) => {
            connect_bad(conn, state, "Already connected").await
        }

        Ok(ZoneMessage::PLogin(request)) => {
            handle_login(conn, state, link, zone, request).await?;
            Ok(Flow::Continue)
        }

        Ok(ZoneMessage::PEnterArena { pid }) => {
            enter_arena(state, zone, pid).await?;
            Ok(Flow::Continue)
        }

        Ok(ZoneMessage::PLeave { pid }) => {
            if let Some(biller_id) = leave_arena(state, zone, pid).await? {
                link.logins.remove(&biller_id);
            }
            Ok(Flow::Continue)
        }

        Err(e) => {
            log_dropped(conn, &zone, &e);
            Ok(Flow::Continue)
        }
    }
}

async fn handle_connect<S: AccountStore>(
    conn: &TcpConnection,
    state: &Arc<ServerState<S>>,
    link: &mut ZoneLink,
    connect: Connect,
) -> Result<Flow, ServerError> {
    let conn_id = conn.id();

    if !connect.version.is_compatible_with(&PROTOCOL_VERSION) {
        tracing::info!(
            %conn_id,
            got = %connect.version,
            expected = %PROTOCOL_VERSION,
            "protocol version mismatch"
        );
        return connect_bad(conn, state, "Protocol mismatch").await;
    }

    let zone = connect.zone_name.trim();
    if zone.is_empty() {
        return connect_bad(conn, state, "Invalid zonename").await;
    }

    if let Some(expected) = &state.config.zone_password {
        if connect.password != *expected {
            tracing::warn!(%conn_id, %zone, "zone sent wrong password");
            return connect_bad(conn, state, "Invalid password").await;
        }
    }

    let name = zone.to_string();
    with_biller(state, move |biller| biller.create_zone(&name)).await?;
    tracing::info!(
        %conn_id,
        %zone,
        software = %connect.sw_name,
        host = %connect.host_name,
        version = %connect.version,
        "zone connected"
    );

    link.phase = Phase::Connected {
        zone: zone.to_string(),
    };
    reply(
        conn,
        state,
        &BillerMessage::ConnectOk {
            server_name: state.config.server_name.clone(),
            network: state.config.network.clone(),
        },
    )
    .await?;
    Ok(Flow::Continue)
}

async fn handle_login<S: AccountStore>(
    conn: &TcpConnection,
    state: &Arc<ServerState<S>>,
    link: &mut ZoneLink,
    zone: String,
    request: PLogin,
) -> Result<(), ServerError> {
    let pid = request.pid;

    let outcome = with_biller(state, move |biller| login(biller, &zone, &request)).await;

    let Login { account, ticket } = match outcome {
        Ok(Ok(login)) => login,
        Ok(Err(e)) => {
            tracing::info!(conn_id = %conn.id(), %pid, error = %e, "login refused");
            return reply(conn, state, &rejection(pid, &e)).await;
        }
        Err(e) => {
            tracing::error!(conn_id = %conn.id(), %pid, error = %e, "login task failed");
            return reply(conn, state, &internal_error(pid)).await;
        }
    };

    link.logins.insert(account.biller_id, ticket);

    let accepted = BillerMessage::POk(POk {
        pid,
        reserved_text: String::new(),
        name: account.name,
        squad: account.squad.unwrap_or_default(),
        biller_id: account.biller_id,
        usage: account.usage,
        first_used: account.first_used,
    });
    match reply(conn, state, &accepted).await {
        Err(ServerError::Protocol(e)) => {
            tracing::error!(%pid, error = %e, "account summary not encodable");
            reply(conn, state, &internal_error(pid)).await
        }
        other => other,
    }
}

async fn enter_arena<S: AccountStore>(
    state: &Arc<ServerState<S>>,
    zone: String,
    pid: Pid,
) -> Result<(), ServerError> {
    with_biller(state, move |biller| match biller.resolve_biller_id(&zone, pid) {
        Some(biller_id) => {
            biller.enter_arena(biller_id);
        }
        None => tracing::warn!(%zone, %pid, "enter arena for unknown pid"),
    })
    .await
}

/// Ends the session at `pid` and returns whose it was.
async fn leave_arena<S: AccountStore>(
    state: &Arc<ServerState<S>>,
    zone: String,
    pid: Pid,
) -> Result<Option<BillerId>, ServerError> {
    with_biller(state, move |biller| {
        let Some(biller_id) = biller.resolve_biller_id(&zone, pid) else {
            tracing::warn!(%zone, %pid, "leave for unknown pid");
            return None;
        };
        biller.leave_arena(biller_id);
        Some(biller_id)
    })
    .await
}

/// Registers first if asked to, then logs in.
fn login<S: AccountStore>(
    biller: &Biller<S>,
    zone: &str,
    request: &PLogin,
) -> Result<Login, BillerError> {
    if request.register {
        biller.register(&request.name, &request.password)?;
    }
    biller.login(&request.name, &request.password, zone, request.pid)
}

/// The PBAD a zone gets for a refused login.
fn rejection(pid: Pid, err: &BillerError) -> BillerMessage {
    let (new_name, reason) = match err {
        BillerError::NotRegistered(_) => (true, "User does not exist"),
        BillerError::WrongPassword(_) => (false, "Wrong password"),
        BillerError::AlreadyLoggedIn(_) => (false, "Already logged in"),
        BillerError::DuplicateName(_) => (false, "Name already taken"),
        BillerError::InvalidName => (false, "Invalid name"),
        BillerError::PidInUse { .. } => (false, "Player id already in use"),
        BillerError::UnknownZone(_) => (false, "Zone not connected"),
        BillerError::Store(_) => return internal_error(pid),
    };
    BillerMessage::PBad {
        pid,
        new_name,
        reason: reason.to_string(),
    }
}

fn internal_error(pid: Pid) -> BillerMessage {
    BillerMessage::PBad {
        pid,
        new_name: false,
        reason: "Internal error".to_string(),
    }
}

/// Replies CONNECTBAD; the connection closes after it.
async fn connect_bad<S: AccountStore>(
    conn: &TcpConnection,
    state: &ServerState<S>,
    reason: &str,
) -> Result<Flow, ServerError> {
    reply(
        conn,
        state,
        &BillerMessage::ConnectBad {
            server_name: state.config.server_name.clone(),
            network: state.config.network.clone(),
            reason: reason.to_string(),
        },
    )
    .await?;
    Ok(Flow::Close)
}

async fn reply<S: AccountStore>(
    conn: &TcpConnection,
    state: &ServerState<S>,
    msg: &BillerMessage,
) -> Result<(), ServerError> {
    let line = state.codec.encode(msg)?;
    tracing::debug!(
        conn_id = %conn.id(),
        tag = msg.tag(),
        line = %String::from_utf8_lossy(&line),
        "send"
    );
    conn.send(&line).await?;
    Ok(())
}

fn log_dropped(conn: &TcpConnection, zone: &str, err: &ProtocolError) {
    tracing::debug!(conn_id = %conn.id(), %zone, error = %err, "dropped malformed message");
}

/// Runs a biller operation on the blocking pool.
///
/// Biller operations take std locks, and a login holds the session lock
/// while it hashes a password.
async fn with_biller<S, T, F>(state: &Arc<ServerState<S>>, op: F) -> Result<T, ServerError>
where
    S: AccountStore,
    T: Send + 'static,
    F: FnOnce(&Biller<S>) -> T + Send + 'static,
{
    let state = Arc::clone(state);
    Ok(tokio::task::spawn_blocking(move || op(&state.biller)).await?)
}

/// Ends the sessions a closing connection still owns.
///
/// Each session is ended only if it is still the login this connection
/// made; a newer login of the same account is left alone.
async fn release_sessions<S: AccountStore>(state: &Arc<ServerState<S>>, link: &mut ZoneLink) {
    let logins = std::mem::take(&mut link.logins);
    if logins.is_empty() {
        return;
    }
    let zone = link.zone().unwrap_or("-").to_string();

    let released = with_biller(state, move |biller| {
        for (biller_id, ticket) in logins {
            if biller.release(biller_id, ticket) {
                tracing::info!(%zone, %biller_id, "ended session of closed connection");
            }
        }
    })
    .await;
    if let Err(e) = released {
        tracing::error!(error = %e, "failed to release sessions");
    }
}

//! Integration tests for the biller server: real TCP zone connections
//! against a server backed by an in-memory account store.

use std::time::Duration;

use biller::prelude::*;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

// =========================================================================
// Helpers
// =========================================================================

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

fn test_config() -> BillerConfig {
    BillerConfig {
        bind: "127.0.0.1:0".to_string(),
        server_name: "biller".to_string(),
        network: "testnet".to_string(),
        ..BillerConfig::default()
    }
}

fn store() -> SqliteAccountStore {
    let hasher = CredentialHasher::with_cost(8, 1).expect("valid cost");
    SqliteAccountStore::in_memory(hasher).expect("in-memory store")
}

/// A running server and the means to stop it.
struct TestServer {
    addr: String,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<(), ServerError>>,
}

impl TestServer {
    async fn start() -> Self {
        Self::start_with(test_config()).await
    }

    async fn start_with(config: BillerConfig) -> Self {
        let server = BillerServerBuilder::new()
            .config(config)
            .build_with_store(store())
            .await
            .expect("server should build");

        let addr = server
            .local_addr()
            .expect("should have local addr")
            .to_string();

        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(server.run_until(async {
            let _ = stopped.await;
        }));

        Self {
            addr,
            stop: Some(stop),
            task,
        }
    }

    /// Signals shutdown and waits for the server to return.
    async fn shutdown(mut self) -> Result<(), ServerError> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        tokio::time::timeout(RECV_TIMEOUT, self.task)
            .await
            .expect("server should stop in time")
            .expect("server task should not panic")
    }
}

/// The zone side of a connection.
struct ZoneClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl ZoneClient {
    async fn open(addr: &str) -> Self {
        let stream = TcpStream::connect(addr).await.expect("should connect");
        let (read_half, writer) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer,
        }
    }

    /// Opens a connection and completes CONNECT for `zone`.
    async fn connect(addr: &str, zone: &str) -> Self {
        let mut client = Self::open(addr).await;
        client
            .send(&format!("CONNECT:1.3.1:subgame:{zone}:host.local:pw"))
            .await;
        assert_eq!(client.recv().await.as_deref(), Some("CONNECTOK:biller:testnet"));
        client
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .await
            .expect("send");
    }

    /// Next line from the biller, or `None` once it closed the connection.
    async fn recv(&mut self) -> Option<String> {
        let mut line = String::new();
        let read = tokio::time::timeout(RECV_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("biller should answer in time")
            .ok()?;
        if read == 0 {
            return None;
        }
        Some(line.trim_end_matches(['\r', '\n']).to_string())
    }

    async fn login(&mut self, pid: u32, register: bool, name: &str, password: &str) -> String {
        let flag = if register { 1 } else { 0 };
        self.send(&format!(
            "PLOGIN:{pid}:{flag}:{name}:{password}:127.0.0.1:1234:cont"
        ))
        .await;
        self.recv().await.expect("login reply")
    }
}

fn is_pok(reply: &str, pid: u32, name: &str) -> bool {
    reply.starts_with(&format!("POK:{pid}::{name}:"))
}

// =========================================================================
// CONNECT
// =========================================================================

#[tokio::test]
async fn test_connect_valid_zone_gets_connectok() {
    let server = TestServer::start().await;
    ZoneClient::connect(&server.addr, "zone1").await;
}

#[tokio::test]
async fn test_connect_version_mismatch_rejected_and_closed() {
    let server = TestServer::start().await;
    let mut zone = ZoneClient::open(&server.addr).await;

    zone.send("CONNECT:1.2.0:subgame:zone1:host:pw").await;

    assert_eq!(
        zone.recv().await.as_deref(),
        Some("CONNECTBAD:biller:testnet:Protocol mismatch")
    );
    assert_eq!(zone.recv().await, None);
}

#[tokio::test]
async fn test_connect_patch_version_ignored() {
    let server = TestServer::start().await;
    let mut zone = ZoneClient::open(&server.addr).await;

    zone.send("CONNECT:1.3.7:subgame:zone1:host:pw").await;

    assert_eq!(zone.recv().await.as_deref(), Some("CONNECTOK:biller:testnet"));
}

#[tokio::test]
async fn test_connect_empty_zone_name_rejected() {
    let server = TestServer::start().await;
    let mut zone = ZoneClient::open(&server.addr).await;

    zone.send("CONNECT:1.3.1:subgame::host:pw").await;

    assert_eq!(
        zone.recv().await.as_deref(),
        Some("CONNECTBAD:biller:testnet:Invalid zonename")
    );
    assert_eq!(zone.recv().await, None);
}

#[tokio::test]
async fn test_connect_malformed_rejected() {
    let server = TestServer::start().await;
    let mut zone = ZoneClient::open(&server.addr).await;

    zone.send("CONNECT:1.3.1:subgame").await;

    let reply = zone.recv().await.expect("reply");
    assert!(reply.starts_with("CONNECTBAD:"), "got {reply}");
    assert_eq!(zone.recv().await, None);
}

#[tokio::test]
async fn test_login_before_connect_rejected() {
    let server = TestServer::start().await;
    let mut zone = ZoneClient::open(&server.addr).await;

    zone.send("PLOGIN:5:1:alice:secret:127.0.0.1:0:").await;

    assert_eq!(
        zone.recv().await.as_deref(),
        Some("CONNECTBAD:biller:testnet:Not yet connected")
    );
    assert_eq!(zone.recv().await, None);
}

#[tokio::test]
async fn test_second_connect_rejected_and_closed() {
    let server = TestServer::start().await;
    let mut zone = ZoneClient::connect(&server.addr, "zone1").await;

    zone.send("CONNECT:1.3.1:subgame:zone2:host:pw").await;

    assert_eq!(
        zone.recv().await.as_deref(),
        Some("CONNECTBAD:biller:testnet:Already connected")
    );
    assert_eq!(zone.recv().await, None);
}

#[tokio::test]
async fn test_connect_zone_password_checked() {
    let config = BillerConfig {
        zone_password: Some("letmein".to_string()),
        ..test_config()
    };
    let server = TestServer::start_with(config).await;

    let mut wrong = ZoneClient::open(&server.addr).await;
    wrong.send("CONNECT:1.3.1:subgame:zone1:host:nope").await;
    let reply = wrong.recv().await.expect("reply");
    assert!(reply.starts_with("CONNECTBAD:biller:testnet:"), "got {reply}");
    assert_eq!(wrong.recv().await, None);

    let mut right = ZoneClient::open(&server.addr).await;
    right.send("CONNECT:1.3.1:subgame:zone1:host:letmein").await;
    assert_eq!(right.recv().await.as_deref(), Some("CONNECTOK:biller:testnet"));
}

#[tokio::test]
async fn test_no_connect_within_timeout_closes() {
    let config = BillerConfig {
        connect_timeout_secs: 1,
        ..test_config()
    };
    let server = TestServer::start_with(config).await;
    let mut zone = ZoneClient::open(&server.addr).await;

    assert_eq!(zone.recv().await, None);
}

// =========================================================================
// PLOGIN
// =========================================================================

#[tokio::test]
async fn test_login_flow_register_then_already_logged_in() {
    let server = TestServer::start().await;
    let mut zone = ZoneClient::connect(&server.addr, "zone1").await;

    let reply = zone.login(5, false, "alice", "secret").await;
    assert_eq!(reply, "PBAD:5:1:User does not exist");

    let reply = zone.login(5, true, "alice", "secret").await;
    assert!(is_pok(&reply, 5, "alice"), "got {reply}");

    let reply = zone.login(6, false, "alice", "secret").await;
    assert_eq!(reply, "PBAD:6:0:Already logged in");
}

#[tokio::test]
async fn test_login_pok_carries_account_summary() {
    let server = TestServer::start().await;
    let mut zone = ZoneClient::connect(&server.addr, "zone1").await;

    let reply = zone.login(5, true, "alice", "secret").await;

    // POK:pid:reserved:name:squad:billerId:usage:firstUsed
    let fields: Vec<&str> = reply.splitn(8, ':').collect();
    assert_eq!(fields.len(), 8, "got {reply}");
    assert_eq!(fields[0], "POK");
    assert_eq!(fields[1], "5");
    assert_eq!(fields[2], "");
    assert_eq!(fields[3], "alice");
    assert_eq!(fields[4], "");
    assert!(fields[5].parse::<u64>().is_ok());
    assert_eq!(fields[6], "0");
    assert_eq!(fields[7].len(), "MM-DD-YYYY HH:MM:SS".len());
}

#[tokio::test]
async fn test_login_wrong_password_keeps_connection_open() {
    let server = TestServer::start().await;
    let mut zone = ZoneClient::connect(&server.addr, "zone1").await;
    zone.login(5, true, "alice", "secret").await;
    zone.send("PLEAVE:5").await;

    let reply = zone.login(6, false, "alice", "wrong").await;
    assert_eq!(reply, "PBAD:6:0:Wrong password");

    let reply = zone.login(6, false, "alice", "secret").await;
    assert!(is_pok(&reply, 6, "alice"), "got {reply}");
}

#[tokio::test]
async fn test_register_taken_name_rejected() {
    let server = TestServer::start().await;
    let mut zone = ZoneClient::connect(&server.addr, "zone1").await;
    zone.login(5, true, "alice", "secret").await;

    let reply = zone.login(6, true, "alice", "other").await;

    assert_eq!(reply, "PBAD:6:0:Name already taken");
}

#[tokio::test]
async fn test_login_pid_in_use_rejected() {
    let server = TestServer::start().await;
    let mut zone = ZoneClient::connect(&server.addr, "zone1").await;
    zone.login(5, true, "alice", "secret").await;

    let reply = zone.login(5, true, "bob", "pw").await;

    assert_eq!(reply, "PBAD:5:0:Player id already in use");
}

#[tokio::test]
async fn test_same_pid_in_two_zones_both_succeed() {
    let server = TestServer::start().await;
    let mut zone1 = ZoneClient::connect(&server.addr, "zone1").await;
    let mut zone2 = ZoneClient::connect(&server.addr, "zone2").await;

    let a = zone1.login(1, true, "alice", "secret").await;
    let b = zone2.login(1, true, "bob", "pw").await;

    assert!(is_pok(&a, 1, "alice"), "got {a}");
    assert!(is_pok(&b, 1, "bob"), "got {b}");
}

#[tokio::test]
async fn test_account_logged_in_on_one_zone_rejected_on_another() {
    let server = TestServer::start().await;
    let mut zone1 = ZoneClient::connect(&server.addr, "zone1").await;
    let mut zone2 = ZoneClient::connect(&server.addr, "zone2").await;
    zone1.login(1, true, "alice", "secret").await;

    let reply = zone2.login(9, false, "alice", "secret").await;

    assert_eq!(reply, "PBAD:9:0:Already logged in");
}

// =========================================================================
// PENTERARENA / PLEAVE / malformed input
// =========================================================================

#[tokio::test]
async fn test_enter_arena_unknown_pid_dropped_without_reply() {
    let server = TestServer::start().await;
    let mut zone = ZoneClient::connect(&server.addr, "zone1").await;

    zone.send("PENTERARENA:99").await;
    let reply = zone.login(5, true, "alice", "secret").await;

    // The first line back answers PLOGIN; nothing was sent for PENTERARENA.
    assert!(is_pok(&reply, 5, "alice"), "got {reply}");
}

#[tokio::test]
async fn test_malformed_lines_dropped_while_connected() {
    let server = TestServer::start().await;
    let mut zone = ZoneClient::connect(&server.addr, "zone1").await;

    zone.send("").await;
    zone.send("HELLO:1").await;
    zone.send("PLOGIN:5:maybe:alice:secret:127.0.0.1:0:").await;
    zone.send("PLEAVE:notanumber").await;
    let reply = zone.login(5, true, "alice", "secret").await;

    assert!(is_pok(&reply, 5, "alice"), "got {reply}");
}

#[tokio::test]
async fn test_enter_then_leave_allows_new_login() {
    let server = TestServer::start().await;
    let mut zone = ZoneClient::connect(&server.addr, "zone1").await;
    zone.login(5, true, "alice", "secret").await;

    zone.send("PENTERARENA:5").await;
    zone.send("PLEAVE:5").await;
    let reply = zone.login(7, false, "alice", "secret").await;

    assert!(is_pok(&reply, 7, "alice"), "got {reply}");
}

#[tokio::test]
async fn test_leave_frees_pid() {
    let server = TestServer::start().await;
    let mut zone = ZoneClient::connect(&server.addr, "zone1").await;
    zone.login(5, true, "alice", "secret").await;

    zone.send("PLEAVE:5").await;
    let reply = zone.login(5, true, "bob", "pw").await;

    assert!(is_pok(&reply, 5, "bob"), "got {reply}");
}

#[tokio::test]
async fn test_overlong_line_closes_connection() {
    let server = TestServer::start().await;
    let mut zone = ZoneClient::connect(&server.addr, "zone1").await;

    zone.send(&format!("PLEAVE:{}", "1".repeat(2000))).await;

    assert_eq!(zone.recv().await, None);
}

// =========================================================================
// Disconnect and shutdown
// =========================================================================

#[tokio::test]
async fn test_disconnect_releases_sessions() {
    let server = TestServer::start().await;
    let mut zone1 = ZoneClient::connect(&server.addr, "zone1").await;
    zone1.login(1, true, "alice", "secret").await;
    drop(zone1);

    let mut zone2 = ZoneClient::connect(&server.addr, "zone2").await;

    // Teardown of zone1 races with this login; retry until it has run.
    let mut reply = String::new();
    for attempt in 0..50 {
        reply = zone2.login(10 + attempt, false, "alice", "secret").await;
        if !reply.ends_with("Already logged in") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(reply.starts_with("POK:"), "got {reply}");
}

#[tokio::test]
async fn test_shutdown_waits_for_connections_and_closes_them() {
    let server = TestServer::start().await;
    let mut zone1 = ZoneClient::connect(&server.addr, "zone1").await;
    let mut zone2 = ZoneClient::connect(&server.addr, "zone2").await;
    zone1.login(1, true, "alice", "secret").await;

    server.shutdown().await.expect("clean shutdown");

    assert_eq!(zone1.recv().await, None);
    assert_eq!(zone2.recv().await, None);
}

#[tokio::test]
async fn test_shutdown_with_no_connections_returns() {
    let server = TestServer::start().await;
    let addr = server.addr.clone();

    server.shutdown().await.expect("clean shutdown");

    assert!(TcpStream::connect(&addr).await.is_err());
}

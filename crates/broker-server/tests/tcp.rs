// crates/broker-server/tests/tcp.rs
//
// Drives the accept loop over real sockets on 127.0.0.1.

use std::sync::Arc;
use std::time::Duration;

use broker_core::{
    BrokerConfig, BrokerResult, Brokerage, CustomerDirectory, CustomerId, InMemoryDirectory,
    LoggingPayoutGateway, Role,
};
use broker_server::config::Config;
use broker_server::server::{build_brokerage, serve};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

async fn start_server(max_clients: usize) -> std::net::SocketAddr {
    start_server_with(build_brokerage(&Config::default()).unwrap(), max_clients).await
}

async fn start_server_with(brokerage: Brokerage, max_clients: usize) -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let brokerage = Arc::new(brokerage);
    tokio::spawn(async move {
        let _ = serve(listener, brokerage, max_clients).await;
    });
    addr
}

struct TestClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    async fn connect(addr: std::net::SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read, writer) = stream.into_split();
        TestClient {
            lines: BufReader::new(read).lines(),
            writer,
        }
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .unwrap();
    }

    async fn recv(&mut self) -> String {
        timeout(Duration::from_secs(5), self.lines.next_line())
            .await
            .expect("timed out waiting for a reply")
            .unwrap()
            .expect("server closed the connection")
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn replies_come_back_in_request_order() {
    let addr = start_server(16).await;
    let mut client = TestClient::connect(addr).await;

    // Pipelined without waiting for replies.
    for line in [
        "R, alice, pw",
        "D, admin, alice, 100",
        "N, alice, alice, AAPL, B, 10, 2",
        "B, alice, alice, -",
    ] {
        client.send(line).await;
    }

    assert_eq!(client.recv().await, "OK, registered alice");
    assert_eq!(client.recv().await, "OK, deposited 100");
    assert!(client.recv().await.starts_with("ORD, 1, alice, AAPL, B, 10, 2, PENDING, "));
    assert_eq!(client.recv().await, "BAL, alice, TRY, 100, 80");
    assert_eq!(client.recv().await, "END, 1");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn replies_go_only_to_the_requester() {
    let addr = start_server(16).await;
    let mut first = TestClient::connect(addr).await;
    let mut second = TestClient::connect(addr).await;

    first.send("R, bob, pw").await;
    assert_eq!(first.recv().await, "OK, registered bob");

    second.send("R, bob, pw").await;
    assert!(second.recv().await.starts_with("ERR, CUSTOMER_EXISTS, "));

    // Nothing extra is waiting for the first client.
    let stray = timeout(Duration::from_millis(200), first.lines.next_line()).await;
    assert!(stray.is_err(), "unexpected line for first client: {:?}", stray);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn connections_beyond_max_clients_are_closed() {
    let addr = start_server(1).await;
    let mut first = TestClient::connect(addr).await;
    first.send("R, carol, pw").await;
    assert_eq!(first.recv().await, "OK, registered carol");

    let mut extra = TcpStream::connect(addr).await.unwrap();
    let mut buf = [0u8; 16];
    let n = timeout(Duration::from_secs(5), extra.read(&mut buf))
        .await
        .expect("rejected connection was left open")
        .unwrap_or(0);
    assert_eq!(n, 0);

    // The accepted client keeps working.
    first.send("B, carol, carol, -").await;
    assert_eq!(first.recv().await, "END, 0");
}

/// Directory that blows up when asked to register `boom`.
struct ExplodingDirectory(InMemoryDirectory);

impl CustomerDirectory for ExplodingDirectory {
    fn register(&self, username: &str, credential: &str, role: Role) -> BrokerResult<CustomerId> {
        assert_ne!(username, "boom", "directory failure");
        self.0.register(username, credential, role)
    }

    fn resolve_customer_id(&self, username: &str) -> BrokerResult<CustomerId> {
        self.0.resolve_customer_id(username)
    }

    fn role(&self, customer_id: CustomerId) -> BrokerResult<Role> {
        self.0.role(customer_id)
    }

    fn username(&self, customer_id: CustomerId) -> BrokerResult<String> {
        self.0.username(customer_id)
    }
}

/// Connect and register `username`, retrying while the only slot is
/// still being released.
async fn register_when_slot_frees(addr: std::net::SocketAddr, username: &str) -> String {
    for _ in 0..50 {
        let mut client = TestClient::connect(addr).await;
        client.send(&format!("R, {}, pw", username)).await;
        match timeout(Duration::from_millis(500), client.lines.next_line()).await {
            Ok(Ok(Some(line))) => return line,
            _ => tokio::time::sleep(Duration::from_millis(50)).await,
        }
    }
    panic!("slot was never released");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn out_of_range_order_is_an_error_reply_and_keeps_the_slot_usable() {
    let addr = start_server(1).await;
    let mut first = TestClient::connect(addr).await;
    first.send("R, alice, pw").await;
    assert_eq!(first.recv().await, "OK, registered alice");
    first
        .send("N, alice, alice, X, B, 79228162514264337593543950335, 2")
        .await;
    assert!(first.recv().await.starts_with("ERR, INVALID_ARGUMENT, "));
    drop(first);

    assert_eq!(register_when_slot_frees(addr, "bob").await, "OK, registered bob");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn crashed_session_releases_its_slot() {
    let brokerage = Brokerage::with_parts(
        BrokerConfig::default(),
        Arc::new(ExplodingDirectory(InMemoryDirectory::new())),
        Arc::new(LoggingPayoutGateway),
    );
    let addr = start_server_with(brokerage, 1).await;

    let mut doomed = TestClient::connect(addr).await;
    doomed.send("R, boom, pw").await;
    // The session dies without answering.
    let ended = timeout(Duration::from_secs(5), doomed.lines.next_line())
        .await
        .expect("crashed session was left open");
    assert!(!matches!(ended, Ok(Some(_))), "unexpected reply {:?}", ended);

    assert_eq!(register_when_slot_frees(addr, "carol").await, "OK, registered carol");
}

//! Network tests: real branch servers on localhost, driven over WebSocket.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use bank_replica::config::{Timing, Topology};
use bank_replica::launcher;
use bank_replica::server::BranchServer;
use bank_replica::{
    Branch, Operation, Propagator, Reply, Request, Transport, WebSocketTransport, WriteSet,
};
use futures_util::{SinkExt, Stream, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::sleep;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

fn fast_timing() -> Timing {
    Timing {
        propagation_delay: Duration::from_millis(50),
        retry_interval: Duration::from_millis(20),
        settle: Duration::ZERO,
    }
}

type Cluster = (
    WebSocketTransport,
    Arc<Propagator<WebSocketTransport>>,
    Vec<Arc<Branch>>,
    Vec<BranchServer>,
);

async fn serve(branches: &[(u64, i64)]) -> Cluster {
    let transport = WebSocketTransport::default();
    let propagator = Arc::new(Propagator::new(
        transport.clone(),
        fast_timing().propagation_delay,
    ));
    let ids: Vec<_> = branches.iter().map(|&(id, _)| id).collect();

    let mut handles = Vec::new();
    let mut servers = Vec::new();
    for &(id, balance) in branches {
        let branch = Arc::new(Branch::new(id, balance, ids.clone(), propagator.clone()));
        let server = BranchServer::bind(Arc::clone(&branch), SocketAddr::new(LOCALHOST, 0))
            .await
            .unwrap();
        transport.register(id, server.local_addr());
        handles.push(branch);
        servers.push(server);
    }
    (transport, propagator, handles, servers)
}

async fn http_get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        path, addr
    );
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn test_deposit_propagates_over_websocket() {
    let (transport, _propagator, branches, servers) = serve(&[(1, 100), (2, 100)]).await;

    let reply = transport
        .deliver(1, Request::new(Operation::Deposit, 50, WriteSet::genesis()))
        .await
        .unwrap();
    assert_eq!(reply, Reply::success(Operation::Deposit, 150));

    let reply = transport
        .deliver(1, Request::query(WriteSet::genesis()))
        .await
        .unwrap();
    assert_eq!(reply, Reply::failed(Operation::Query));

    sleep(Duration::from_millis(500)).await;
    assert_eq!(branches[1].balance(), 150);
    assert_eq!(branches[1].write_set(), WriteSet::with_writes(1));

    for server in servers {
        server.shutdown();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_back_to_back_writes_arrive_in_order_over_websocket() {
    let (transport, propagator, branches, servers) = serve(&[(1, 0), (2, 0), (3, 0)]).await;

    let mut write_set = WriteSet::genesis();
    for amount in 1..=8 {
        let reply = transport
            .deliver(1, Request::new(Operation::Deposit, amount, write_set.clone()))
            .await
            .unwrap();
        assert!(reply.is_success());
        write_set = write_set.next();
    }

    propagator.idle().await;
    for branch in &branches {
        assert_eq!(branch.write_set(), write_set, "branch {}", branch.id());
        assert_eq!(branch.balance(), 36);
    }

    for server in servers {
        server.shutdown();
    }
}

#[tokio::test]
async fn test_unknown_operation_reply_keeps_session_open() {
    let (_transport, _propagator, _branches, servers) = serve(&[(1, 10)]).await;
    let url = format!("ws://{}/ws", servers[0].local_addr());
    let (mut stream, _) = connect_async(url.as_str()).await.unwrap();

    stream
        .send(Message::Text(
            r#"{"interface": "transfer", "money": "5", "writeSet": [0]}"#.to_string(),
        ))
        .await
        .unwrap();
    let reply = next_reply(&mut stream).await;
    assert_eq!(reply, Reply::unknown_operation());

    // Same connection, well-formed request
    stream
        .send(Message::Text(
            r#"{"interface": "query", "money": "0", "writeSet": [0]}"#.to_string(),
        ))
        .await
        .unwrap();
    let reply = next_reply(&mut stream).await;
    assert_eq!(reply, Reply::success(Operation::Query, 10));

    for server in servers {
        server.shutdown();
    }
}

#[tokio::test]
async fn test_binary_frames_and_pings_on_one_session() {
    let (_transport, _propagator, branches, servers) = serve(&[(1, 10)]).await;
    let url = format!("ws://{}/ws", servers[0].local_addr());
    let (mut stream, _) = connect_async(url.as_str()).await.unwrap();

    stream
        .send(Message::Binary(
            br#"{"interface": "deposit", "money": "5", "writeSet": [0]}"#.to_vec(),
        ))
        .await
        .unwrap();
    let reply = next_reply(&mut stream).await;
    assert_eq!(reply, Reply::success(Operation::Deposit, 15));

    stream.send(Message::Ping(b"still there".to_vec())).await.unwrap();
    stream
        .send(Message::Text(
            r#"{"interface": "query", "money": "0", "writeSet": [0, 1]}"#.to_string(),
        ))
        .await
        .unwrap();
    let reply = next_reply(&mut stream).await;
    assert_eq!(reply, Reply::success(Operation::Query, 15));
    assert_eq!(branches[0].write_set(), WriteSet::with_writes(1));

    for server in servers {
        server.shutdown();
    }
}

async fn next_reply<S>(stream: &mut S) -> Reply
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        match stream.next().await.unwrap().unwrap() {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            _ => continue,
        }
    }
}

#[tokio::test]
async fn test_health_and_state_endpoints() {
    let (transport, _propagator, _branches, servers) = serve(&[(7, 30)]).await;
    transport
        .deliver(7, Request::new(Operation::Withdraw, 45, WriteSet::genesis()))
        .await
        .unwrap();

    let health = http_get(servers[0].local_addr(), "/health").await;
    assert!(health.starts_with("HTTP/1.1 200"));
    assert!(health.contains(r#""status":"ok""#));
    assert!(health.contains(r#""branch":7"#));

    let state = http_get(servers[0].local_addr(), "/state").await;
    assert!(state.contains(r#""balance":-15"#));
    assert!(state.contains(r#""writeSet":[0,1]"#));

    for server in servers {
        server.shutdown();
    }
}

#[tokio::test]
async fn test_launcher_over_network() {
    let topology = Topology::from_json(
        r#"[
            {"type": "branch", "id": 1, "balance": 400},
            {"type": "branch", "id": 2, "balance": 400},
            {"type": "branch", "id": 3, "balance": 400},
            {"type": "customer", "id": 1, "events": [
                {"dest": 1, "interface": "deposit", "money": 70},
                {"dest": 2, "interface": "withdraw", "money": 30},
                {"dest": 3, "interface": "query"}
            ]}
        ]"#,
    )
    .unwrap();

    let result = launcher::run_over_network(&topology, fast_timing(), LOCALHOST)
        .await
        .unwrap();

    let report = &result.reports[0];
    assert_eq!(
        report.recv,
        vec![
            Reply::success(Operation::Deposit, 470),
            Reply::success(Operation::Withdraw, 440),
            Reply::success(Operation::Query, 440),
        ]
    );

    let json = serde_json::to_value(report).unwrap();
    assert_eq!(json["id"], 1);
    assert_eq!(json["recv"][0]["result"], "success");
    assert_eq!(json["recv"][2]["money"], "440");

    for snapshot in &result.branches {
        assert_eq!(snapshot.balance, 440, "branch {}", snapshot.id);
        assert_eq!(snapshot.write_set, WriteSet::with_writes(2));
    }
}

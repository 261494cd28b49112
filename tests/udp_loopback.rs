//! End-to-end tests over loopback UDP.
//!
//! A small fake OpenSIPS answers mi_datagram commands and raises events
//! towards the event server under test. Set `RUST_LOG=opensips_datagram=trace`
//! to see the library's logs.

use opensips_datagram::{
    ConnectionPool, Connector, ConnectorOptions, DatagramEvent, EventHandlers, EventName,
    EventServer, MaxReconnects, PoolOptions,
};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(3);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Fake mi_datagram endpoint.
///
/// Replies `200 OK\n` + command to every datagram and remembers which local
/// addresses commands came from. A `:raise_event:` command also sends the
/// event given on its following lines to `events_to`.
struct FakeOpensips {
    addr: SocketAddr,
    peers: Arc<Mutex<HashSet<SocketAddr>>>,
}

impl FakeOpensips {
    async fn start(events_to: Option<SocketAddr>) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0")
            .await
            .unwrap();
        let addr = socket
            .local_addr()
            .unwrap();
        let peers = Arc::new(Mutex::new(HashSet::new()));
        let seen = peers.clone();

        tokio::spawn(async move {
            let mut buf = vec![0u8; 65457];
            while let Ok((n, from)) = socket
                .recv_from(&mut buf)
                .await
            {
                seen.lock()
                    .unwrap()
                    .insert(from);
                let cmd = &buf[..n];

                if let (Some(target), Some(event)) =
                    (events_to, cmd.strip_prefix(b":raise_event:\n".as_slice()))
                {
                    let mut datagram = event.to_vec();
                    datagram.push(b'\n');
                    let _ = socket
                        .send_to(&datagram, target)
                        .await;
                }

                let mut reply = b"200 OK\n".to_vec();
                reply.extend_from_slice(cmd);
                let _ = socket
                    .send_to(&reply, from)
                    .await;
            }
        });

        Self { addr, peers }
    }

    fn distinct_peers(&self) -> usize {
        self.peers
            .lock()
            .unwrap()
            .len()
    }
}

/// Event server whose handlers forward every event for `names` to a channel.
async fn collecting_server(
    names: &[&str],
) -> (
    SocketAddr,
    mpsc::UnboundedReceiver<Arc<DatagramEvent>>,
    CancellationToken,
    tokio::task::JoinHandle<opensips_datagram::DatagramResult<()>>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut handlers = EventHandlers::new();
    for name in names {
        let tx = tx.clone();
        handlers = handlers.on(name, move |event| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(event);
            }
        });
    }

    let server = EventServer::bind("127.0.0.1:0", handlers)
        .await
        .unwrap();
    let addr = server
        .local_addr()
        .unwrap();
    let token = CancellationToken::new();
    let task = tokio::spawn(server.serve_until(token.clone()));
    (addr, rx, token, task)
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<Arc<DatagramEvent>>) -> Arc<DatagramEvent> {
    timeout(WAIT, rx.recv())
        .await
        .expect("no event within timeout")
        .expect("event channel closed")
}

#[tokio::test]
async fn event_split_over_datagrams_is_reassembled() {
    init_tracing();
    let (addr, mut rx, token, task) = collecting_server(&["E_ACC_CDR"]).await;
    let client = UdpSocket::bind("127.0.0.1:0")
        .await
        .unwrap();

    for part in [
        b"E_ACC_CDR\nmeth".as_slice(),
        b"od::INVITE\nsip_code::200\n",
        b"\n",
    ] {
        client
            .send_to(part, addr)
            .await
            .unwrap();
    }

    let event = next_event(&mut rx).await;
    assert!(event.is(EventName::AccCdr));
    assert_eq!(event.attribute("method"), Some("INVITE"));
    assert_eq!(event.attribute("sip_code"), Some("200"));
    assert!(event
        .values()
        .is_empty());

    token.cancel();
    assert!(task
        .await
        .unwrap()
        .is_ok());
}

#[tokio::test]
async fn two_events_in_one_datagram_are_both_dispatched() {
    init_tracing();
    let (addr, mut rx, token, task) = collecting_server(&["E_SCRIPT_EVENT"]).await;
    let client = UdpSocket::bind("127.0.0.1:0")
        .await
        .unwrap();

    client
        .send_to(b"E_SCRIPT_EVENT\nvalue2\nvalue1\n\nE_SCRIPT_EVENT\nk::v\n\n", addr)
        .await
        .unwrap();

    let mut events = vec![next_event(&mut rx).await, next_event(&mut rx).await];
    events.sort_by_key(|e| e.values().len());
    assert_eq!(events[0].attribute("k"), Some("v"));
    assert_eq!(events[1].values(), ["value2", "value1"]);

    token.cancel();
    task.await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn panicking_handler_is_isolated() {
    init_tracing();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handlers = EventHandlers::new()
        .on("E_PIKE_BLOCKED", |_event| async {
            panic!("handler bug");
        })
        .on("E_PIKE_BLOCKED", move |event| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(event);
            }
        });
    let server = EventServer::bind("127.0.0.1:0", handlers)
        .await
        .unwrap();
    let addr = server
        .local_addr()
        .unwrap();
    let token = CancellationToken::new();
    let task = tokio::spawn(server.serve_until(token.clone()));

    let client = UdpSocket::bind("127.0.0.1:0")
        .await
        .unwrap();
    for ip in ["10.0.0.1", "10.0.0.2"] {
        client
            .send_to(format!("E_PIKE_BLOCKED\nip::{}\n\n", ip).as_bytes(), addr)
            .await
            .unwrap();
    }

    let mut ips = HashSet::new();
    for _ in 0..2 {
        let event = timeout(WAIT, rx.recv())
            .await
            .unwrap()
            .unwrap();
        ips.insert(
            event
                .attribute("ip")
                .unwrap()
                .to_string(),
        );
    }
    assert_eq!(ips.len(), 2);
    assert!(!task.is_finished());

    token.cancel();
    task.await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn command_raises_event_end_to_end() {
    init_tracing();
    let (events_addr, mut rx, token, task) = collecting_server(&["E_SCRIPT_EVENT"]).await;
    let opensips = FakeOpensips::start(Some(events_addr)).await;
    let connector = Connector::connect(&opensips.addr.to_string(), MaxReconnects::Limited(2))
        .await
        .unwrap();

    let cmd = b":raise_event:\nE_SCRIPT_EVENT\nuser::alice\nhello\n";
    let reply = connector
        .send(cmd)
        .await
        .unwrap();
    assert!(reply.starts_with(b"200 OK\n"));
    assert!(reply.ends_with(cmd));

    let event = next_event(&mut rx).await;
    assert_eq!(event.attribute("user"), Some("alice"));
    assert_eq!(event.values(), ["hello"]);
    assert_eq!(event.origin(), Some(opensips.addr));

    token.cancel();
    task.await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn pool_runs_commands_in_parallel_within_capacity() {
    init_tracing();
    let opensips = FakeOpensips::start(None).await;
    let pool = ConnectionPool::with_options(
        &opensips.addr.to_string(),
        PoolOptions {
            capacity: 4,
            connector: ConnectorOptions {
                reply_timeout: Some(WAIT),
                ..ConnectorOptions::with_max_reconnects(2)
            },
        },
    )
    .await
    .unwrap();

    let mut tasks = Vec::new();
    for i in 0..32 {
        let pool = pool.clone();
        tasks.push(tokio::spawn(async move {
            let cmd = format!(":get_statistics:\ncounter_{}\n", i);
            let reply = pool
                .send(cmd.as_bytes())
                .await
                .unwrap();
            assert_eq!(reply, format!("200 OK\n{}", cmd).into_bytes());
        }));
    }
    for task in tasks {
        task.await
            .unwrap();
    }

    assert!(opensips.distinct_peers() <= 4);
    assert!(pool.idle_connectors() <= 4);
    assert_eq!(pool.available(), 4);
}

#[tokio::test]
async fn pool_recovers_after_server_restart() {
    init_tracing();
    // Reserve a port, then free it so the first command fails.
    let placeholder = UdpSocket::bind("127.0.0.1:0")
        .await
        .unwrap();
    let addr = placeholder
        .local_addr()
        .unwrap();
    drop(placeholder);

    let pool = ConnectionPool::with_options(
        &addr.to_string(),
        PoolOptions {
            capacity: 1,
            connector: ConnectorOptions {
                reply_timeout: Some(Duration::from_millis(300)),
                ..ConnectorOptions::with_max_reconnects(1)
            },
        },
    )
    .await
    .unwrap();

    assert!(pool
        .send(b":ps:\n")
        .await
        .is_err());
    assert_eq!(pool.idle_connectors(), 0);
    assert_eq!(pool.available(), 1);

    // Server comes up on the same port.
    let server = UdpSocket::bind(addr)
        .await
        .unwrap();
    tokio::spawn(async move {
        let mut buf = [0u8; 512];
        while let Ok((n, from)) = server
            .recv_from(&mut buf)
            .await
        {
            let _ = server
                .send_to(&buf[..n], from)
                .await;
        }
    });

    let reply = timeout(WAIT, pool.send(b":ps:\n"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply, b":ps:\n");
    assert_eq!(pool.idle_connectors(), 1);
}

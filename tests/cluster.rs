//! Multi-node tests: real nodes on ephemeral ports, zero simulated latency

use quorumkv::client::{probe_replication_window, KvClient};
use quorumkv::common::{Config, LatencyConfig, NodeRole};
use quorumkv::{Error, NodeServer};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

struct TestCluster {
    clients: Vec<KvClient>,
    _shutdown: Vec<oneshot::Sender<()>>,
}

impl TestCluster {
    fn node(&self, i: usize) -> &KvClient {
        &self.clients[i]
    }
}

fn url(listener: &TcpListener) -> String {
    format!("http://{}", listener.local_addr().unwrap())
}

/// A peer whose port stays reserved but never answers; calls to it time out
async fn silent_peer() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = url(&listener);
    (listener, url)
}

fn node_config(id: usize, role: NodeRole, peers: Vec<String>, w: usize, r: usize) -> Config {
    Config {
        node_id: format!("node{}", id + 1),
        role,
        peers,
        write_quorum: w,
        read_quorum: r,
        latency: LatencyConfig::zero(),
        request_timeout_ms: 1_000,
        ..Config::default()
    }
}

async fn start(configs_and_listeners: Vec<(Config, TcpListener)>) -> TestCluster {
    let mut clients = Vec::new();
    let mut shutdown = Vec::new();

    for (config, listener) in configs_and_listeners {
        clients.push(KvClient::with_timeout(url(&listener), Duration::from_secs(5)).unwrap());
        let server = NodeServer::new(config).unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(server.serve_on(listener, async move {
            let _ = rx.await;
        }));
        shutdown.push(tx);
    }

    TestCluster {
        clients,
        _shutdown: shutdown,
    }
}

async fn listeners(n: usize) -> (Vec<TcpListener>, Vec<String>) {
    let mut listeners = Vec::new();
    for _ in 0..n {
        listeners.push(TcpListener::bind("127.0.0.1:0").await.unwrap());
    }
    let urls = listeners.iter().map(url).collect();
    (listeners, urls)
}

/// Every node of a leaderless cluster of `n`, each listing all others as peers
async fn leaderless(n: usize, w: usize, r: usize) -> TestCluster {
    let (listeners, urls) = listeners(n).await;
    let nodes = listeners
        .into_iter()
        .enumerate()
        .map(|(i, listener)| {
            let peers = urls
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, u)| u.clone())
                .collect();
            (node_config(i, NodeRole::Peer, peers, w, r), listener)
        })
        .collect();
    start(nodes).await
}

/// Node 0 leads, the rest follow
async fn leader_follower(n: usize, w: usize, r: usize) -> TestCluster {
    let (listeners, urls) = listeners(n).await;
    let followers = urls[1..].to_vec();
    let nodes = listeners
        .into_iter()
        .enumerate()
        .map(|(i, listener)| {
            let config = if i == 0 {
                node_config(i, NodeRole::Leader, followers.clone(), w, r)
            } else {
                node_config(i, NodeRole::Follower, Vec::new(), 1, 1)
            };
            (config, listener)
        })
        .collect();
    start(nodes).await
}

async fn wait_for_version(node: &KvClient, key: &str, version: u64) -> bool {
    for _ in 0..100 {
        if let Ok(Some(found)) = node.local_read(key).await {
            if found.version == version {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn test_leaderless_quorum_read_sees_latest_write() {
    let cluster = leaderless(5, 3, 3).await;

    let first = cluster.node(0).set("user:1", "alice").await.unwrap();
    assert_eq!(first.version, 1);
    assert_eq!(first.coordinator, "node1");

    let read = cluster.node(4).get("user:1").await.unwrap().unwrap();
    assert_eq!(read.value, "alice");
    assert_eq!(read.version, 1);
    assert_eq!(read.node, "node5");

    // node3 already holds version 1, so its next version is 2
    let second = cluster.node(2).set("user:1", "bob").await.unwrap();
    assert_eq!(second.version, 2);

    for i in 0..5 {
        let read = cluster.node(i).get("user:1").await.unwrap().unwrap();
        assert_eq!(read.value, "bob", "stale read through node{}", i + 1);
        assert_eq!(read.version, second.version);
    }
}

#[tokio::test]
async fn test_leaderless_w1_replicates_in_background() {
    let cluster = leaderless(3, 1, 1).await;

    let ack = cluster.node(1).set("k", "v").await.unwrap();
    assert_eq!(ack.version, 1);

    for i in [0, 2] {
        assert!(
            wait_for_version(cluster.node(i), "k", 1).await,
            "node{} never received the background replication",
            i + 1
        );
    }
}

#[tokio::test]
async fn test_leader_follower_replication() {
    let cluster = leader_follower(3, 3, 1).await;

    let ack = cluster.node(0).set("k", "v").await.unwrap();
    assert_eq!(ack.version, 1);

    // W=N: every follower holds the write once it is acknowledged
    for i in 1..3 {
        let local = cluster.node(i).local_read("k").await.unwrap().unwrap();
        assert_eq!(local.version, 1);
        assert_eq!(local.value, "v");

        let read = cluster.node(i).get("k").await.unwrap().unwrap();
        assert_eq!(read.version, 1);
    }

    let health = cluster.node(1).health().await.unwrap();
    assert_eq!(health.role, "follower");
    assert_eq!(health.topology, "leader-follower");
}

#[tokio::test]
async fn test_follower_rejects_set() {
    let cluster = leader_follower(2, 1, 1).await;

    let result = cluster.node(1).set("k", "v").await;
    assert!(matches!(result, Err(Error::Forbidden(_))));
    assert!(cluster.node(1).local_read("k").await.unwrap().is_none());
}

#[tokio::test]
async fn test_leader_w1_skips_replication() {
    let cluster = leader_follower(2, 1, 1).await;

    cluster.node(0).set("k", "v").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(cluster.node(1).local_read("k").await.unwrap().is_none());
}

#[tokio::test]
async fn test_write_quorum_failure_keeps_local_write() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let (_silent_a, peer_a) = silent_peer().await;
    let (_silent_b, peer_b) = silent_peer().await;
    let peers = vec![peer_a, peer_b];
    let config = node_config(0, NodeRole::Leader, peers, 2, 1);
    let cluster = start(vec![(config, listener)]).await;

    match cluster.node(0).set("k", "v").await {
        Err(Error::Http(msg)) => assert!(msg.starts_with("status 500"), "{}", msg),
        other => panic!("expected a 500, got {:?}", other),
    }

    let local = cluster.node(0).local_read("k").await.unwrap().unwrap();
    assert_eq!(local.version, 1);
}

#[tokio::test]
async fn test_read_quorum_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let (_silent, peer) = silent_peer().await;
    let peers = vec![peer];
    let config = node_config(0, NodeRole::Peer, peers, 1, 2);
    let cluster = start(vec![(config, listener)]).await;

    cluster.node(0).set("k", "v").await.unwrap();
    assert!(matches!(
        cluster.node(0).get("k").await,
        Err(Error::Http(_))
    ));
}

#[tokio::test]
async fn test_missing_key_is_none() {
    let cluster = leaderless(3, 2, 2).await;
    assert!(cluster.node(0).get("missing").await.unwrap().is_none());
    assert!(cluster.node(1).local_read("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_probe_reports_write() {
    let cluster = leader_follower(3, 3, 1).await;

    let report = probe_replication_window(
        cluster.node(0),
        &cluster.clients[1..],
        "probe-key",
        "probe-value",
        Duration::from_millis(100),
        Duration::from_millis(10),
    )
    .await
    .unwrap();

    assert_eq!(report.version, 1);
    assert!(report.observations >= 2);
    assert_eq!(report.stale_by_node.len(), 2);
    assert_eq!(report.errors, 0);
}

//! Integration scenarios against real nodes on localhost ephemeral ports
//! (§8 concrete scenarios).

use std::sync::Arc;
use std::time::Duration;

use chordring::address::Address;
use chordring::config::{RingConfig, Tuning};
use chordring::maintenance;
use chordring::node::Node;
use chordring::server;
use chordring::shutdown::Shutdown;

/// Fast tuning so stabilization converges quickly in tests.
fn test_tuning() -> Tuning {
    Tuning {
        successor_list_len: 4,
        stabilize_interval: Duration::from_millis(20),
        fix_fingers_interval: Duration::from_millis(15),
        check_predecessor_interval: Duration::from_millis(20),
        rpc_timeout: Duration::from_millis(500),
    }
}

struct RunningNode {
    node: Arc<Node>,
    shutdown: Shutdown,
    handles: Vec<tokio::task::JoinHandle<()>>,
}

impl RunningNode {
    async fn shut_down(self) {
        self.shutdown.signal();
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

async fn spawn_lone(ring: RingConfig) -> RunningNode {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let local = listener.local_addr().unwrap();
    let self_address = Address::new("127.0.0.1", local.port());
    let node = Arc::new(Node::start_lone(self_address, ring, test_tuning()));
    start(node, listener)
}

async fn spawn_joining(ring: RingConfig, bootstrap: &Address) -> RunningNode {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let local = listener.local_addr().unwrap();
    let self_address = Address::new("127.0.0.1", local.port());
    let node = Node::join(self_address, bootstrap.clone(), ring, test_tuning())
        .await
        .expect("join should succeed against a live bootstrap");
    start(Arc::new(node), listener)
}

fn start(node: Arc<Node>, listener: tokio::net::TcpListener) -> RunningNode {
    let shutdown = Shutdown::new();
    let mut handles = maintenance::spawn_all(node.clone(), shutdown.clone());
    let serve_node = node.clone();
    let serve_shutdown = shutdown.clone();
    handles.push(tokio::spawn(async move {
        let _ = server::serve(listener, serve_node, serve_shutdown, Duration::from_secs(1)).await;
    }));
    RunningNode { node, shutdown, handles }
}

#[tokio::test(flavor = "multi_thread")]
async fn lone_node_resolves_every_key_to_itself() {
    let ring = RingConfig { m: 8 };
    let a = spawn_lone(ring).await;

    for k in [0u64, 1, 127, 200, 255] {
        let resolved = a.node.find_successor(k).await.unwrap();
        assert_eq!(&resolved, a.node.self_address());
    }
    assert_eq!(a.node.state().predecessor(), None);

    a.shut_down().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn two_node_join_converges_to_mutual_successor_and_predecessor() {
    let ring = RingConfig { m: 8 };
    let a = spawn_lone(ring).await;
    let b = spawn_joining(ring, a.node.self_address()).await;

    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(a.node.state().immediate_successor(), *b.node.self_address());
    assert_eq!(b.node.state().immediate_successor(), *a.node.self_address());
    assert_eq!(a.node.state().predecessor(), Some(b.node.self_address().clone()));
    assert_eq!(b.node.state().predecessor(), Some(a.node.self_address().clone()));

    a.shut_down().await;
    b.shut_down().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn five_node_ring_converges_and_routes_consistently() {
    let ring = RingConfig { m: 8 };
    let seed = spawn_lone(ring).await;
    let mut nodes = vec![seed];
    for _ in 0..4 {
        let bootstrap = nodes[0].node.self_address().clone();
        nodes.push(spawn_joining(ring, &bootstrap).await);
    }

    tokio::time::sleep(Duration::from_secs(2)).await;

    // P1: following successors from any node visits every live node and returns to origin.
    let start_address = nodes[0].node.self_address().clone();
    let mut visited = vec![start_address.clone()];
    let mut current = nodes[0].node.state().immediate_successor();
    for _ in 0..nodes.len() {
        if current == start_address {
            break;
        }
        visited.push(current.clone());
        let next_node = nodes.iter().find(|n| n.node.self_address() == &current);
        current = match next_node {
            Some(n) => n.node.state().immediate_successor(),
            None => break,
        };
    }
    let mut expected: Vec<_> = nodes.iter().map(|n| n.node.self_address().clone()).collect();
    let mut got = visited.clone();
    expected.sort();
    got.sort();
    assert_eq!(expected, got, "successor chain should visit every node exactly once");

    // P2: find_successor(k) agrees across every node for a sample of keys.
    for k in [0u64, 17, 63, 128, 200] {
        let mut results = Vec::new();
        for n in &nodes {
            results.push(n.node.find_successor(k).await.unwrap());
        }
        let first = &results[0];
        assert!(
            results.iter().all(|r| r == first),
            "find_successor({k}) disagreed across nodes: {results:?}"
        );
    }

    for n in nodes {
        n.shut_down().await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn failure_recovery_restores_ring_closure() {
    let ring = RingConfig { m: 8 };
    let seed = spawn_lone(ring).await;
    let mut nodes = vec![seed];
    for _ in 0..3 {
        let bootstrap = nodes[0].node.self_address().clone();
        nodes.push(spawn_joining(ring, &bootstrap).await);
    }
    tokio::time::sleep(Duration::from_millis(800)).await;

    // Kill a non-bootstrap node.
    let victim = nodes.remove(2);
    let victim_address = victim.node.self_address().clone();
    victim.shut_down().await;

    tokio::time::sleep(Duration::from_secs(1)).await;

    for n in &nodes {
        let mut current = n.node.state().immediate_successor();
        for _ in 0..nodes.len() + 1 {
            assert_ne!(current, victim_address, "dead node should be routed around");
            if current == *n.node.self_address() {
                break;
            }
            let next_node = nodes.iter().find(|m| m.node.self_address() == &current);
            current = match next_node {
                Some(m) => m.node.state().immediate_successor(),
                None => break,
            };
        }
    }

    for n in nodes {
        n.shut_down().await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn notify_ignores_candidate_outside_the_open_arc() {
    let ring = RingConfig { m: 8 };
    let a = spawn_lone(ring).await;
    let b = spawn_joining(ring, a.node.self_address()).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    let b_predecessor_before = b.node.state().predecessor();
    // Notify b with its own address — never inside the open arc (pred, self).
    b.node.notify(b.node.self_address().clone());
    assert_eq!(b.node.state().predecessor(), b_predecessor_before);

    a.shut_down().await;
    b.shut_down().await;
}

//! Shared helpers for tangle integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use tangle_dht::{Message, Node, NodeConfig};
use tangle_fabric::Fabric;

/// Loopback endpoint for test networks.
#[must_use]
pub fn addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

/// Initialise test logging once; honours `RUST_LOG`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Start `count` nodes on one fabric, ports from `base_port`, and bootstrap
/// each against the first. Returns all nodes, the seed first.
pub async fn bootstrap_network(
    fabric: Arc<dyn Fabric<Message>>,
    base_port: u16,
    count: usize,
    config: NodeConfig,
) -> Vec<Node> {
    let mut nodes = Vec::with_capacity(count);
    for i in 0..count {
        let port = base_port + u16::try_from(i).expect("test network fits in port range");
        nodes.push(Node::with_config(fabric.clone(), addr(port), config));
    }

    let seed = nodes[0].peer().clone();
    for node in &nodes[1..] {
        node.bootstrap(&[seed.clone()])
            .await
            .expect("bootstrap completes");
    }
    nodes
}

//! Iterative node lookup.
//!
//! A lookup keeps a candidate list of the closest peers it has heard of,
//! repeatedly asks the closest unqueried candidates for peers nearer the
//! target, and stops when every candidate has been asked and nothing closer
//! surfaced. Unanswered queries count as asked, so unreachable peers cannot
//! wedge convergence.

use crate::key::Key;
use crate::messages::{FindNodeRequest, Message, MessageKind};
use crate::node::{Node, NodeError};
use crate::peer::Peer;
use crate::routing::K;
use futures::future::join_all;
use std::collections::HashSet;
use tracing::{debug, trace};

/// One find-node search driving toward a target key.
///
/// Seeded from the local routing table plus the own peer; every round asks
/// the closest unqueried candidates in parallel, bounded by the node's α,
/// and folds their answers back into the candidate list.
pub struct IterativeLookup {
    node: Node,
    target: Key,
    /// Candidates keyed by XOR distance to the target, ascending, at most
    /// [`K`] after each round.
    closest: Vec<(Key, Peer)>,
    /// Keys whose find-node call has completed, successfully or not.
    queried: HashSet<Key>,
}

impl IterativeLookup {
    /// Prepare a lookup for `target` driven through `node`.
    #[must_use]
    pub fn new(node: Node, target: Key) -> Self {
        Self {
            node,
            target,
            closest: Vec::new(),
            queried: HashSet::new(),
        }
    }

    /// Drive the search to convergence.
    ///
    /// Returns at most [`K`] peers, ascending by XOR distance to the target.
    /// The own peer participates like any other candidate, so it may appear
    /// in the result.
    ///
    /// # Errors
    ///
    /// Only [`NodeError::Stopped`]; per-peer timeouts are absorbed.
    pub async fn run(mut self) -> Result<Vec<Peer>, NodeError> {
        let mut seed = self.node.closest_for(&self.target).await?;
        seed.push(self.node.peer().clone());
        self.absorb(seed);
        self.queried.insert(self.node.key().clone());

        loop {
            let batch = self.next_batch();
            if batch.is_empty() {
                break;
            }
            self.query_round(batch).await?;
        }

        debug!(target = %self.target, found = self.closest.len(), "lookup converged");
        Ok(self.closest.into_iter().map(|(_, peer)| peer).collect())
    }

    /// The closest candidates not yet queried, up to the parallelism bound.
    fn next_batch(&self) -> Vec<Peer> {
        self.closest
            .iter()
            .filter(|(_, peer)| !self.queried.contains(peer.key()))
            .take(self.node.config().alpha)
            .map(|(_, peer)| peer.clone())
            .collect()
    }

    /// Ask one batch in parallel and fold every answer into the candidates.
    async fn query_round(&mut self, batch: Vec<Peer>) -> Result<(), NodeError> {
        let calls = batch.iter().map(|peer| {
            let request = FindNodeRequest::new(self.node.peer().clone(), self.target.clone());
            self.node.call(
                peer.addr(),
                Message::FindNodeRequest(request),
                MessageKind::FindNodeResponse,
            )
        });
        let outcomes = join_all(calls).await;

        for (peer, outcome) in batch.into_iter().zip(outcomes) {
            self.queried.insert(peer.key().clone());
            match outcome {
                Ok(Message::FindNodeResponse(response)) => {
                    trace!(from = %peer, learned = response.peers.len(), "find-node answered");
                    self.absorb(response.peers);
                }
                Ok(_) => {}
                Err(NodeError::CallTimeout) => {
                    debug!(peer = %peer, "find-node unanswered, counted as queried");
                }
                Err(err @ NodeError::Stopped) => return Err(err),
            }
        }
        Ok(())
    }

    /// Merge new candidates, keeping the list deduplicated by key, sorted by
    /// distance to the target, and capped at [`K`].
    ///
    /// Already-queried peers are not re-admitted; a peer of foreign key size
    /// cannot be measured against the target and is skipped.
    fn absorb(&mut self, peers: Vec<Peer>) {
        for peer in peers {
            let Ok(distance) = self.target.xor(peer.key()) else {
                continue;
            };
            if self.queried.contains(peer.key()) {
                continue;
            }
            if self.closest.iter().any(|(_, known)| known.key() == peer.key()) {
                continue;
            }
            self.closest.push((distance, peer));
        }
        self.closest.sort_by(|a, b| a.0.cmp(&b.0));
        self.closest.truncate(K);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeConfig;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;
    use tangle_fabric::MemoryFabric;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn fast() -> NodeConfig {
        NodeConfig {
            call_timeout: Duration::from_millis(100),
            ..NodeConfig::default()
        }
    }

    #[tokio::test]
    async fn lookup_on_empty_table_returns_only_self() {
        let fabric = Arc::new(MemoryFabric::<Message>::new());
        let node = Node::with_config(fabric, addr(4600), fast());

        let found = node.find(&Key::random()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key(), node.key());
    }

    #[tokio::test]
    async fn lookup_walks_the_overlay() {
        let fabric = Arc::new(MemoryFabric::<Message>::new());
        let nodes: Vec<Node> = (0..8)
            .map(|i| Node::with_config(fabric.clone(), addr(4610 + i), fast()))
            .collect();

        let seed = nodes[0].peer().clone();
        for node in &nodes[1..] {
            node.bootstrap(&[seed.clone()]).await.unwrap();
        }

        // A node that only ever talked to the seed still finds peers it
        // never contacted directly.
        let target = nodes[7].key().clone();
        let found = nodes[1].find(&target).await.unwrap();
        assert!(found.iter().any(|p| p.key() == &target));
    }

    #[tokio::test]
    async fn lookup_result_is_sorted_and_unique() {
        let fabric = Arc::new(MemoryFabric::<Message>::new());
        let nodes: Vec<Node> = (0..10)
            .map(|i| Node::with_config(fabric.clone(), addr(4620 + i), fast()))
            .collect();

        let seed = nodes[0].peer().clone();
        for node in &nodes[1..] {
            node.bootstrap(&[seed.clone()]).await.unwrap();
        }

        let target = Key::random();
        let found = nodes[3].find(&target).await.unwrap();

        assert!(found.len() <= K);
        let distances: Vec<Key> = found
            .iter()
            .map(|p| target.xor(p.key()).unwrap())
            .collect();
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));

        let keys: HashSet<&Key> = found.iter().map(Peer::key).collect();
        assert_eq!(keys.len(), found.len());
    }
}

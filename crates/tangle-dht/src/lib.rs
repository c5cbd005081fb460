//! Kademlia-style overlay routing core.
//!
//! Given a fresh node and one or more seed contacts, a population of nodes
//! self-organises so that every node's routing table is strongly biased
//! toward peers close to its own key in XOR distance, while retaining
//! long-range contacts across the whole identifier space. Key pieces:
//!
//! - 160-bit node keys with the XOR distance metric
//! - K-bucket routing table (k = 20), recency-ordered with oldest-out
//!   eviction
//! - Iterative find-node lookup with α-parallel queries (α = 3)
//! - A message-driven node actor multiplexing calls by correlation id
//! - Bootstrap by seed ping plus self-lookup
//!
//! Transport is abstracted behind the `tangle-fabric` crate; the in-memory
//! fabric there is all the tests need, and real transports plug in at the
//! same seam.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tangle_dht::Node;
//! use tangle_fabric::MemoryFabric;
//!
//! # async fn example() {
//! let fabric = Arc::new(MemoryFabric::<tangle_dht::Message>::new());
//!
//! let seed = Node::start(fabric.clone(), "127.0.0.1:9000".parse().unwrap());
//! let node = Node::start(fabric, "127.0.0.1:9001".parse().unwrap());
//!
//! node.bootstrap(&[seed.peer().clone()]).await.unwrap();
//! let closest = node.find(&tangle_dht::Key::random()).await.unwrap();
//! println!("{} peers near that key", closest.len());
//! # }
//! ```

pub mod key;
pub mod lookup;
pub mod messages;
pub mod node;
pub mod peer;
pub mod routing;

pub use key::{KEY_BITS, Key, KeyError};
pub use lookup::IterativeLookup;
pub use messages::{
    CallId, FindNodeRequest, FindNodeResponse, Message, MessageError, MessageKind, PingRequest,
    PingResponse,
};
pub use node::{ALPHA, DEFAULT_CALL_TIMEOUT, Node, NodeConfig, NodeError};
pub use peer::Peer;
pub use routing::{Bucket, K, NUM_BUCKETS, RoutingTable};

//! Message fabric for tangle nodes.
//!
//! The fabric is the seam between a node and the rest of the overlay: a
//! registry of endpoints and a best-effort, unordered, possibly lossy way to
//! move messages between them. Nodes register an inbound queue under their
//! endpoint and address each other by endpoint alone; how the bytes travel is
//! entirely the fabric's business.
//!
//! [`MemoryFabric`] is the reference implementation: a process-local endpoint
//! map with asynchronous dispatch, used by the test networks. Real transports
//! implement [`Fabric`] over sockets and keep the same contract.

pub mod fabric;
pub mod memory;

pub use fabric::{Fabric, FabricError};
pub use memory::MemoryFabric;

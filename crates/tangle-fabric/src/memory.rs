//! In-memory reference fabric.

use crate::fabric::{Fabric, FabricError};
use async_trait::async_trait;
use dashmap::DashMap;
use rand::Rng;
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tracing::trace;

/// Process-local fabric: an endpoint map with asynchronous dispatch.
///
/// Every registered endpoint owns an unbounded inbound queue, so `send`
/// never blocks on a slow receiver. Messages are moved into the queue by
/// value; sender and receiver cannot alias.
///
/// A loss rate can be configured to exercise convergence under message
/// loss; each message is then dropped independently with that probability.
///
/// # Examples
///
/// ```
/// use tangle_fabric::{Fabric, MemoryFabric};
/// use tokio::sync::mpsc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let fabric: MemoryFabric<String> = MemoryFabric::new();
/// let addr = "127.0.0.1:4000".parse().unwrap();
///
/// let (tx, mut rx) = mpsc::unbounded_channel();
/// fabric.register(addr, tx);
///
/// fabric.send(addr, "hello".to_string()).await.unwrap();
/// assert_eq!(rx.recv().await.as_deref(), Some("hello"));
/// # }
/// ```
pub struct MemoryFabric<M> {
    endpoints: DashMap<SocketAddr, mpsc::UnboundedSender<M>>,
    loss_rate: f64,
}

impl<M> MemoryFabric<M> {
    /// Create a fabric that delivers every message it can.
    #[must_use]
    pub fn new() -> Self {
        Self {
            endpoints: DashMap::new(),
            loss_rate: 0.0,
        }
    }

    /// Create a fabric that drops each message with probability `loss_rate`.
    ///
    /// Values outside `[0, 1]` are clamped.
    #[must_use]
    pub fn with_loss(loss_rate: f64) -> Self {
        Self {
            endpoints: DashMap::new(),
            loss_rate: loss_rate.clamp(0.0, 1.0),
        }
    }

    /// Number of registered endpoints.
    #[must_use]
    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }
}

impl<M> Default for MemoryFabric<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<M> Fabric<M> for MemoryFabric<M>
where
    M: Send + 'static,
{
    fn register(&self, addr: SocketAddr, inbound: mpsc::UnboundedSender<M>) {
        self.endpoints.insert(addr, inbound);
    }

    async fn send(&self, addr: SocketAddr, message: M) -> Result<(), FabricError> {
        if self.loss_rate > 0.0 && rand::thread_rng().gen_bool(self.loss_rate) {
            trace!(%addr, "dropped message");
            return Ok(());
        }
        let inbound = {
            let entry = self
                .endpoints
                .get(&addr)
                .ok_or(FabricError::UnknownEndpoint(addr))?;
            entry.value().clone()
        };
        inbound.send(message).map_err(|_| FabricError::Closed(addr))
    }
}

//! The transport contract consumed by nodes.

use async_trait::async_trait;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::sync::mpsc;

/// Duplex message mover between endpoints.
///
/// `register` associates an endpoint with a node's inbound queue; `send`
/// delivers a message to whatever is registered at the target endpoint.
/// Delivery is best-effort and unordered, and messages may be lost; a
/// delivery failure is indistinguishable from loss as far as the routing
/// core is concerned.
///
/// Messages cross the fabric by value. An implementation must never leak
/// shared mutable state between sender and receiver: once a message is
/// handed to `send`, nothing the sender does can be observed on the
/// receiving side.
#[async_trait]
pub trait Fabric<M>: Send + Sync
where
    M: Send + 'static,
{
    /// Associate `addr` with an inbound queue.
    ///
    /// Registering the same endpoint twice replaces the previous queue.
    fn register(&self, addr: SocketAddr, inbound: mpsc::UnboundedSender<M>);

    /// Deliver `message` to the endpoint registered at `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`FabricError::UnknownEndpoint`] when nothing is registered at
    /// `addr`, and [`FabricError::Closed`] when the registered queue is no
    /// longer receiving.
    async fn send(&self, addr: SocketAddr, message: M) -> Result<(), FabricError>;
}

/// Fabric delivery errors.
#[derive(Debug, Error)]
pub enum FabricError {
    /// No endpoint is registered at the target address.
    #[error("no endpoint registered at {0}")]
    UnknownEndpoint(SocketAddr),

    /// The endpoint was registered but its queue is gone.
    #[error("endpoint at {0} is no longer receiving")]
    Closed(SocketAddr),
}

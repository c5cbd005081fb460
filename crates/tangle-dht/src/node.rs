//! The node actor.
//!
//! A node owns one peer identity, one routing table, and a table of
//! outstanding calls, all mutated from a single task looping on a command
//! queue. Inbound messages, outbound transmissions, and call bookkeeping are
//! serialised through that loop, so no two handlers ever interleave on the
//! same node. The public [`Node`] value is a cheap clonable handle;
//! operations that need an answer suspend on a oneshot reply.
//!
//! Every inbound message runs the same pipeline: learn from it (the sender
//! is a live contact, relayed peers are candidate routing entries), serve it
//! if it is a request, then resolve any call waiting on its id.

use crate::key::Key;
use crate::lookup::IterativeLookup;
use crate::messages::{CallId, FindNodeResponse, Message, MessageKind, PingRequest, PingResponse};
use crate::peer::Peer;
use crate::routing::RoutingTable;
use futures::future::join_all;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tangle_fabric::Fabric;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

/// Default lookup parallelism: outstanding find-node calls per lookup step.
pub const ALPHA: usize = 3;

/// Default deadline for a single request/response call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_millis(500);

const COMMAND_QUEUE: usize = 1024;

/// Node tunables.
#[derive(Debug, Clone, Copy)]
pub struct NodeConfig {
    /// Deadline for one request/response exchange.
    pub call_timeout: Duration,
    /// Lookup parallelism bound.
    pub alpha: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
            alpha: ALPHA,
        }
    }
}

/// Node operation errors.
///
/// Transient network trouble never surfaces here: lost and unanswered
/// messages are absorbed by bootstrap and lookup convergence.
#[derive(Debug, Error)]
pub enum NodeError {
    /// A call exceeded its deadline. Recoverable: bootstrap skips the seed,
    /// lookups count the peer as queried without contribution.
    #[error("call timed out")]
    CallTimeout,

    /// The node's actor task is gone; no further operations are possible.
    #[error("node has stopped")]
    Stopped,
}

enum Command {
    Inbound(Message),
    Transmit {
        to: SocketAddr,
        message: Message,
    },
    Call {
        to: SocketAddr,
        request: Message,
        expect: MessageKind,
        reply: oneshot::Sender<Message>,
    },
    CancelCall(CallId),
    ClosestFor {
        target: Key,
        reply: oneshot::Sender<Vec<Peer>>,
    },
    PeerCount(oneshot::Sender<usize>),
}

/// Handle to a running node.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use tangle_dht::Node;
/// use tangle_fabric::MemoryFabric;
///
/// # async fn example() {
/// let fabric = Arc::new(MemoryFabric::<tangle_dht::Message>::new());
/// let seed = Node::start(fabric.clone(), "127.0.0.1:9000".parse().unwrap());
/// let node = Node::start(fabric, "127.0.0.1:9001".parse().unwrap());
///
/// let closest = node.bootstrap(&[seed.peer().clone()]).await.unwrap();
/// println!("joined; {} peers near our key", closest.len());
/// # }
/// ```
#[derive(Clone)]
pub struct Node {
    peer: Peer,
    config: NodeConfig,
    commands: mpsc::Sender<Command>,
}

impl Node {
    /// Start a node with a fresh random key at `addr`.
    ///
    /// Registers the node's inbound queue with the fabric and spawns the
    /// actor task. Must be called within a tokio runtime.
    #[must_use]
    pub fn start(fabric: Arc<dyn Fabric<Message>>, addr: SocketAddr) -> Self {
        Self::with_config(fabric, addr, NodeConfig::default())
    }

    /// Start a node with explicit tunables.
    #[must_use]
    pub fn with_config(
        fabric: Arc<dyn Fabric<Message>>,
        addr: SocketAddr,
        config: NodeConfig,
    ) -> Self {
        let peer = Peer::new(Key::random(), addr);
        let (commands, command_rx) = mpsc::channel(COMMAND_QUEUE);
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        fabric.register(addr, inbound_tx);

        let state = NodeState {
            table: RoutingTable::new(peer.key().clone()),
            peer: peer.clone(),
            pending: HashMap::new(),
            fabric,
        };
        tokio::spawn(state.run(command_rx));
        tokio::spawn(pump(inbound_rx, commands.clone()));

        debug!(peer = %peer, "node started");
        Node {
            peer,
            config,
            commands,
        }
    }

    /// The node's own peer descriptor.
    #[must_use]
    pub fn peer(&self) -> &Peer {
        &self.peer
    }

    /// The node's key.
    #[must_use]
    pub fn key(&self) -> &Key {
        self.peer.key()
    }

    /// The endpoint this node receives at.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.peer.addr()
    }

    /// The node's tunables.
    #[must_use]
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Join the overlay through `seeds`.
    ///
    /// Pings every seed concurrently; seeds that do not answer within the
    /// call deadline are skipped. With whatever subset survives, the node
    /// then looks up its own key, which walks the overlay toward the node's
    /// neighbourhood and fills the routing table with well-distributed
    /// contacts along the way. Returns the self-lookup result.
    ///
    /// # Errors
    ///
    /// Only [`NodeError::Stopped`]; unanswered seeds are not an error.
    pub async fn bootstrap(&self, seeds: &[Peer]) -> Result<Vec<Peer>, NodeError> {
        let pings = seeds.iter().map(|seed| {
            let request = Message::PingRequest(PingRequest::new(self.peer.clone()));
            self.call(seed.addr(), request, MessageKind::PingResponse)
        });
        for (seed, outcome) in seeds.iter().zip(join_all(pings).await) {
            match outcome {
                Ok(_) => trace!(seed = %seed, "bootstrap ping answered"),
                Err(NodeError::CallTimeout) => {
                    debug!(seed = %seed, "bootstrap ping unanswered, skipping seed");
                }
                Err(err @ NodeError::Stopped) => return Err(err),
            }
        }
        self.find(self.peer.key()).await
    }

    /// Iteratively look up the peers closest to `target`.
    ///
    /// Returns at most [`K`](crate::routing::K) peers ordered by XOR
    /// distance to `target`, closest first.
    ///
    /// # Errors
    ///
    /// Only [`NodeError::Stopped`]; unanswered queries are absorbed by the
    /// lookup's convergence.
    pub async fn find(&self, target: &Key) -> Result<Vec<Peer>, NodeError> {
        IterativeLookup::new(self.clone(), target.clone()).run().await
    }

    /// Fire-and-forget transmission.
    ///
    /// The message is moved to the fabric; delivery failures are treated as
    /// message loss.
    ///
    /// # Errors
    ///
    /// Only [`NodeError::Stopped`].
    pub async fn send(&self, to: SocketAddr, message: Message) -> Result<(), NodeError> {
        self.command(Command::Transmit { to, message }).await
    }

    /// Request/response exchange.
    ///
    /// Transmits `request` and suspends until a message of kind `expect`
    /// arrives carrying the request's id, or the call deadline passes. The
    /// waiter is registered and the request transmitted in one turn of the
    /// actor loop, so a response can never race past its waiter.
    ///
    /// # Errors
    ///
    /// [`NodeError::CallTimeout`] when the deadline passes; the waiter is
    /// withdrawn and a late response is ignored.
    pub async fn call(
        &self,
        to: SocketAddr,
        request: Message,
        expect: MessageKind,
    ) -> Result<Message, NodeError> {
        let id = request.id();
        let (reply, response) = oneshot::channel();
        self.command(Command::Call {
            to,
            request,
            expect,
            reply,
        })
        .await?;
        match tokio::time::timeout(self.config.call_timeout, response).await {
            Ok(Ok(message)) => Ok(message),
            Ok(Err(_)) => Err(NodeError::Stopped),
            Err(_) => {
                let _ = self.commands.send(Command::CancelCall(id)).await;
                Err(NodeError::CallTimeout)
            }
        }
    }

    /// Number of peers currently in the routing table.
    ///
    /// # Errors
    ///
    /// Only [`NodeError::Stopped`].
    pub async fn peer_count(&self) -> Result<usize, NodeError> {
        let (reply, count) = oneshot::channel();
        self.command(Command::PeerCount(reply)).await?;
        count.await.map_err(|_| NodeError::Stopped)
    }

    /// Unordered gather of peers near `target` from the routing table.
    ///
    /// # Errors
    ///
    /// Only [`NodeError::Stopped`].
    pub async fn closest_for(&self, target: &Key) -> Result<Vec<Peer>, NodeError> {
        let (reply, peers) = oneshot::channel();
        self.command(Command::ClosestFor {
            target: target.clone(),
            reply,
        })
        .await?;
        peers.await.map_err(|_| NodeError::Stopped)
    }

    async fn command(&self, command: Command) -> Result<(), NodeError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| NodeError::Stopped)
    }
}

/// Forward fabric deliveries into the actor's command queue.
async fn pump(mut inbound: mpsc::UnboundedReceiver<Message>, commands: mpsc::Sender<Command>) {
    while let Some(message) = inbound.recv().await {
        if commands.send(Command::Inbound(message)).await.is_err() {
            break;
        }
    }
}

struct PendingCall {
    expect: MessageKind,
    reply: oneshot::Sender<Message>,
}

struct NodeState {
    peer: Peer,
    table: RoutingTable,
    pending: HashMap<CallId, PendingCall>,
    fabric: Arc<dyn Fabric<Message>>,
}

impl NodeState {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        while let Some(command) = commands.recv().await {
            match command {
                Command::Inbound(message) => self.on_message(message).await,
                Command::Transmit { to, message } => self.transmit(to, message).await,
                Command::Call {
                    to,
                    request,
                    expect,
                    reply,
                } => {
                    // Waiter and transmission share this turn of the loop;
                    // no inbound message is handled in between.
                    self.pending
                        .insert(request.id(), PendingCall { expect, reply });
                    self.transmit(to, request).await;
                }
                Command::CancelCall(id) => {
                    self.pending.remove(&id);
                }
                Command::ClosestFor { target, reply } => {
                    let _ = reply.send(self.table.closest_for(&target));
                }
                Command::PeerCount(reply) => {
                    let _ = reply.send(self.table.peer_count());
                }
            }
        }
        trace!(peer = %self.peer, "node actor stopped");
    }

    async fn on_message(&mut self, message: Message) {
        trace!(
            peer = %self.peer,
            from = %message.source(),
            kind = ?message.kind(),
            id = %message.id(),
            "inbound message"
        );
        self.learn(&message);
        match &message {
            Message::PingRequest(request) => {
                let response = PingResponse::new(request.id, self.peer.clone());
                self.transmit(request.source.addr(), Message::PingResponse(response))
                    .await;
            }
            Message::FindNodeRequest(request) => {
                let peers = self.table.closest_for(&request.target);
                let response = FindNodeResponse::new(request.id, self.peer.clone(), peers);
                self.transmit(request.source.addr(), Message::FindNodeResponse(response))
                    .await;
            }
            Message::PingResponse(_) | Message::FindNodeResponse(_) => {}
        }
        self.resolve(message);
    }

    /// Every message teaches: the sender is a live contact, and any relayed
    /// peers are candidate routing entries.
    fn learn(&mut self, message: &Message) {
        let mut source = message.source().clone();
        source.mark_contacted();
        self.table.insert(source);
        for peer in message.carried_peers() {
            self.table.insert(peer.clone());
        }
    }

    /// Resolve the waiter registered under the message's id, if one exists
    /// and its expected kind matches.
    fn resolve(&mut self, message: Message) {
        let id = message.id();
        let matches = self
            .pending
            .get(&id)
            .is_some_and(|call| call.expect == message.kind());
        if !matches {
            return;
        }
        if let Some(call) = self.pending.remove(&id) {
            if call.reply.send(message).is_err() {
                trace!(%id, "caller gave up before the response arrived");
            }
        }
    }

    async fn transmit(&self, to: SocketAddr, message: Message) {
        if let Err(error) = self.fabric.send(to, message).await {
            debug!(peer = %self.peer, %to, %error, "transmit failed, treating as loss");
        }
    }
}

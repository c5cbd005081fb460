//! Overlay protocol messages.
//!
//! Four message shapes bind nodes together: ping and find-node, each as a
//! request/response pair. Every message carries an opaque correlation id and
//! the sender's peer descriptor; a response echoes the id of the request it
//! answers, and that echo is the only correlation mechanism in the protocol.
//!
//! Messages are self-contained values. Encoding for a byte-oriented
//! transport is available via [`Message::to_bytes`]/[`Message::from_bytes`],
//! but the in-memory fabric moves the values themselves.

use crate::key::Key;
use crate::peer::Peer;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Opaque correlation token carried by every message.
///
/// Six random octets, rendered as twelve hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId([u8; 6]);

impl CallId {
    /// Draw a fresh random id.
    #[must_use]
    pub fn random() -> Self {
        let mut bytes = [0u8; 6];
        rand::thread_rng().fill(&mut bytes[..]);
        Self(bytes)
    }

    /// The raw token octets.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallId({})", hex::encode(self.0))
    }
}

/// Message discriminant, used to match responses against expectations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Liveness probe.
    PingRequest,
    /// Answer to a liveness probe.
    PingResponse,
    /// Ask for peers near a target key.
    FindNodeRequest,
    /// Peers near the requested target.
    FindNodeResponse,
}

/// Liveness probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingRequest {
    /// Correlation id, echoed by the response.
    pub id: CallId,
    /// The sender.
    pub source: Peer,
}

impl PingRequest {
    /// A new probe from `source` with a fresh id.
    #[must_use]
    pub fn new(source: Peer) -> Self {
        Self {
            id: CallId::random(),
            source,
        }
    }
}

/// Answer to a [`PingRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResponse {
    /// The id of the request being answered.
    pub id: CallId,
    /// The responder.
    pub source: Peer,
}

impl PingResponse {
    /// Answer the request carrying `id`.
    #[must_use]
    pub fn new(id: CallId, source: Peer) -> Self {
        Self { id, source }
    }
}

/// Ask for peers near `target`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindNodeRequest {
    /// Correlation id, echoed by the response.
    pub id: CallId,
    /// The sender.
    pub source: Peer,
    /// The key to find peers near.
    pub target: Key,
}

impl FindNodeRequest {
    /// A new query from `source` for peers near `target`, with a fresh id.
    #[must_use]
    pub fn new(source: Peer, target: Key) -> Self {
        Self {
            id: CallId::random(),
            source,
            target,
        }
    }
}

/// Peers the responder knows near the requested target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindNodeResponse {
    /// The id of the request being answered.
    pub id: CallId,
    /// The responder.
    pub source: Peer,
    /// Peers near the requested target, in no particular order.
    pub peers: Vec<Peer>,
}

impl FindNodeResponse {
    /// Answer the request carrying `id` with `peers`.
    #[must_use]
    pub fn new(id: CallId, source: Peer, peers: Vec<Peer>) -> Self {
        Self { id, source, peers }
    }
}

/// Envelope for everything that crosses the fabric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Message {
    /// Liveness probe.
    PingRequest(PingRequest),
    /// Answer to a liveness probe.
    PingResponse(PingResponse),
    /// Ask for peers near a target key.
    FindNodeRequest(FindNodeRequest),
    /// Peers near the requested target.
    FindNodeResponse(FindNodeResponse),
}

impl Message {
    /// Correlation id.
    #[must_use]
    pub fn id(&self) -> CallId {
        match self {
            Self::PingRequest(m) => m.id,
            Self::PingResponse(m) => m.id,
            Self::FindNodeRequest(m) => m.id,
            Self::FindNodeResponse(m) => m.id,
        }
    }

    /// The sender's peer descriptor.
    #[must_use]
    pub fn source(&self) -> &Peer {
        match self {
            Self::PingRequest(m) => &m.source,
            Self::PingResponse(m) => &m.source,
            Self::FindNodeRequest(m) => &m.source,
            Self::FindNodeResponse(m) => &m.source,
        }
    }

    /// The message's discriminant.
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::PingRequest(_) => MessageKind::PingRequest,
            Self::PingResponse(_) => MessageKind::PingResponse,
            Self::FindNodeRequest(_) => MessageKind::FindNodeRequest,
            Self::FindNodeResponse(_) => MessageKind::FindNodeResponse,
        }
    }

    /// Peers relayed inside the message, if any.
    #[must_use]
    pub fn carried_peers(&self) -> &[Peer] {
        match self {
            Self::FindNodeResponse(m) => &m.peers,
            _ => &[],
        }
    }

    /// Encode for a byte-oriented transport.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::Serialization`] if encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, MessageError> {
        bincode::serialize(self).map_err(MessageError::Serialization)
    }

    /// Decode a message produced by [`Message::to_bytes`].
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::Serialization`] if the bytes do not decode.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MessageError> {
        bincode::deserialize(bytes).map_err(MessageError::Serialization)
    }
}

/// Message encoding errors.
#[derive(Debug, Error)]
pub enum MessageError {
    /// Encoding or decoding failed.
    #[error("serialization failed: {0}")]
    Serialization(bincode::Error),
}

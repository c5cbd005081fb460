//! Overlay peers: identity plus reachability.

use crate::key::Key;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;
use std::time::SystemTime;

/// A peer of the overlay: a key plus the endpoint it is reachable at.
///
/// Two peers with equal keys name the same routing entry regardless of
/// address, so equality and hashing consider the key alone.
///
/// `last_contact` is absent until the peer has been observed, i.e. until a
/// message or response has been received directly from it. The stamp travels
/// with the peer when it is relayed inside a response, so receivers learn
/// relayed peers as already-observed contacts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Peer {
    key: Key,
    addr: SocketAddr,
    last_contact: Option<SystemTime>,
}

impl Peer {
    /// A peer that has not been observed yet.
    #[must_use]
    pub fn new(key: Key, addr: SocketAddr) -> Self {
        Self {
            key,
            addr,
            last_contact: None,
        }
    }

    /// The peer's identifier.
    #[must_use]
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// The endpoint the peer is reachable at.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// When a message was last received from this peer, if ever.
    #[must_use]
    pub fn last_contact(&self) -> Option<SystemTime> {
        self.last_contact
    }

    /// True once a message has been received from this peer.
    #[must_use]
    pub fn contacted(&self) -> bool {
        self.last_contact.is_some()
    }

    /// Record that a message has just been received from this peer.
    pub fn mark_contacted(&mut self) {
        self.last_contact = Some(SystemTime::now());
    }
}

impl PartialEq for Peer {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Peer {}

impl Hash for Peer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.key, self.addr)
    }
}

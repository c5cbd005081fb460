//! K-bucket routing state.
//!
//! A routing table keeps one bucket per bit of the key space, indexed by the
//! highest differing bit between a peer's key and the local key. Nearby
//! shells of the space get dedicated buckets of their own while the far half
//! of the overlay shares one, which is what biases the table toward close
//! peers without losing long-range contacts.

use crate::key::{KEY_BITS, Key};
use crate::peer::Peer;
use std::collections::VecDeque;

/// Bucket capacity: how many peers each distance shell retains.
pub const K: usize = 20;

/// Number of buckets in a routing table, one per key bit.
pub const NUM_BUCKETS: usize = KEY_BITS;

/// Bounded, recency-ordered peer list.
///
/// Position 0 is the most recently observed peer. When a full bucket takes a
/// new peer, the oldest entry (the tail) is evicted unconditionally; the
/// evictee is not probed for liveness first.
#[derive(Clone, Debug)]
pub struct Bucket {
    peers: VecDeque<Peer>,
    capacity: usize,
}

impl Bucket {
    /// Create a bucket holding at most `capacity` peers.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            peers: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert a peer at the front.
    ///
    /// Peers that have never been contacted are not stored. A peer whose key
    /// is already present leaves the bucket unchanged; in particular the
    /// existing entry keeps its position. A full bucket evicts its oldest
    /// entry to make room.
    pub fn insert(&mut self, peer: Peer) {
        if !peer.contacted() {
            return;
        }
        if self.peers.iter().any(|p| p.key() == peer.key()) {
            return;
        }
        if self.peers.len() >= self.capacity {
            self.peers.pop_back();
        }
        self.peers.push_front(peer);
    }

    /// Peers in recency order, most recent first.
    pub fn peers(&self) -> impl Iterator<Item = &Peer> {
        self.peers.iter()
    }

    /// Number of peers stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// True when no peers are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

impl Default for Bucket {
    fn default() -> Self {
        Self::new(K)
    }
}

/// XOR-distance-indexed routing table.
///
/// The bucket for peer `p` is `leading_set_bit_index(p.key XOR local_key)`,
/// the exponent of the highest bit in which the two keys differ. The local
/// key itself has no bucket (its distance is zero), so inserting the own
/// peer is a no-op.
///
/// # Examples
///
/// ```
/// use tangle_dht::{Key, Peer, RoutingTable};
///
/// let mut table = RoutingTable::new(Key::random());
/// let mut peer = Peer::new(Key::random(), "127.0.0.1:4000".parse().unwrap());
/// peer.mark_contacted();
/// table.insert(peer);
/// assert_eq!(table.peer_count(), 1);
/// ```
#[derive(Clone, Debug)]
pub struct RoutingTable {
    local_key: Key,
    buckets: Vec<Bucket>,
}

impl RoutingTable {
    /// An empty table centred on `local_key`.
    #[must_use]
    pub fn new(local_key: Key) -> Self {
        let buckets = (0..NUM_BUCKETS).map(|_| Bucket::new(K)).collect();
        Self { local_key, buckets }
    }

    /// The key the table is centred on.
    #[must_use]
    pub fn local_key(&self) -> &Key {
        &self.local_key
    }

    /// Bucket index for `key`: `None` for the local key itself, or for a key
    /// of foreign size, which cannot be placed.
    fn index_for(&self, key: &Key) -> Option<usize> {
        self.local_key.xor(key).ok()?.leading_set_bit_index()
    }

    /// Insert a peer into its distance bucket.
    ///
    /// Inserting the own peer is a silent no-op, as is inserting a peer that
    /// has never been contacted or whose key size does not match the table's.
    pub fn insert(&mut self, peer: Peer) {
        let Some(index) = self.index_for(peer.key()) else {
            return;
        };
        self.buckets[index].insert(peer);
    }

    /// Gather peers near `target` until [`K`] are found or the table is
    /// exhausted.
    ///
    /// Starts at the target's bucket (bucket 0 when the target is the local
    /// key) and expands outward one bucket at a time in both directions,
    /// appending whole buckets. The result is neither sorted by distance nor
    /// truncated; callers that need the closest-[`K`] ordering sort and cut
    /// themselves.
    #[must_use]
    pub fn closest_for(&self, target: &Key) -> Vec<Peer> {
        let start = self.index_for(target).unwrap_or(0);
        let mut gathered = Vec::new();
        for offset in 0..NUM_BUCKETS {
            let mut in_range = false;
            if let Some(below) = start.checked_sub(offset) {
                in_range = true;
                gathered.extend(self.buckets[below].peers().cloned());
                if gathered.len() >= K {
                    break;
                }
            }
            let above = start + offset;
            if offset > 0 && above < NUM_BUCKETS {
                in_range = true;
                gathered.extend(self.buckets[above].peers().cloned());
                if gathered.len() >= K {
                    break;
                }
            }
            if !in_range {
                break;
            }
        }
        gathered
    }

    /// Total peers across all buckets.
    #[must_use]
    pub fn peer_count(&self) -> usize {
        self.buckets.iter().map(Bucket::len).sum()
    }

    /// Snapshot of every peer in the table.
    #[must_use]
    pub fn peers(&self) -> Vec<Peer> {
        self.buckets
            .iter()
            .flat_map(|bucket| bucket.peers().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::net::SocketAddr;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn contacted(key: Key, port: u16) -> Peer {
        let mut peer = Peer::new(key, addr(port));
        peer.mark_contacted();
        peer
    }

    /// A 20-octet key whose XOR distance from the zero key lands in `bucket`.
    fn key_in_bucket(bucket: usize) -> Key {
        let mut bytes = [0u8; 20];
        bytes[19 - bucket / 8] = 1 << (bucket % 8);
        Key::new(bytes)
    }

    #[test]
    fn bucket_rejects_uncontacted_peers() {
        let mut bucket = Bucket::new(3);
        bucket.insert(Peer::new(Key::random(), addr(4300)));
        assert!(bucket.is_empty());
    }

    #[test]
    fn bucket_prepends_most_recent() {
        let mut bucket = Bucket::new(3);
        let first = contacted(Key::random(), 4301);
        let second = contacted(Key::random(), 4302);
        bucket.insert(first.clone());
        bucket.insert(second.clone());

        let peers: Vec<_> = bucket.peers().cloned().collect();
        assert_eq!(peers, vec![second, first]);
    }

    #[test]
    fn bucket_duplicate_insert_keeps_position() {
        let mut bucket = Bucket::new(3);
        let first = contacted(Key::random(), 4303);
        let second = contacted(Key::random(), 4304);
        bucket.insert(first.clone());
        bucket.insert(second.clone());
        bucket.insert(first.clone());

        assert_eq!(bucket.len(), 2);
        let front = bucket.peers().next().unwrap();
        assert_eq!(front.key(), second.key());
    }

    #[test]
    fn full_bucket_evicts_oldest() {
        let mut bucket = Bucket::new(3);
        let oldest = contacted(Key::random(), 4305);
        bucket.insert(oldest.clone());
        for port in 4306..4308 {
            bucket.insert(contacted(Key::random(), port));
        }
        let newcomer = contacted(Key::random(), 4308);
        bucket.insert(newcomer.clone());

        assert_eq!(bucket.len(), 3);
        let keys: Vec<_> = bucket.peers().map(Peer::key).collect();
        assert!(keys.contains(&newcomer.key()));
        assert!(!keys.contains(&oldest.key()));
        assert_eq!(bucket.peers().next().unwrap().key(), newcomer.key());
    }

    #[test]
    fn table_ignores_own_key() {
        let local = Key::random();
        let mut table = RoutingTable::new(local.clone());
        table.insert(contacted(local, 4310));
        assert_eq!(table.peer_count(), 0);
    }

    #[test]
    fn table_ignores_foreign_key_sizes() {
        let mut table = RoutingTable::new(Key::random());
        table.insert(contacted(Key::new([1u8, 2u8]), 4311));
        assert_eq!(table.peer_count(), 0);
    }

    #[test]
    fn table_places_peers_by_distance_bit() {
        let mut table = RoutingTable::new(Key::new([0u8; 20]));
        table.insert(contacted(key_in_bucket(0), 4312));
        table.insert(contacted(key_in_bucket(159), 4313));
        assert_eq!(table.peer_count(), 2);
        assert!(!table.buckets[0].is_empty());
        assert!(!table.buckets[159].is_empty());
    }

    #[test]
    fn table_keys_stay_unique() {
        let mut table = RoutingTable::new(Key::new([0u8; 20]));
        let key = key_in_bucket(42);
        table.insert(contacted(key.clone(), 4314));
        table.insert(contacted(key, 4315));

        assert_eq!(table.peer_count(), 1);
        let keys: HashSet<_> = table.peers().into_iter().map(|p| p.key().clone()).collect();
        assert_eq!(keys.len(), 1);
    }

    #[test]
    fn closest_for_returns_everything_when_sparse() {
        let mut table = RoutingTable::new(Key::new([0u8; 20]));
        for bucket in [0, 1, 159] {
            table.insert(contacted(key_in_bucket(bucket), 4320 + bucket as u16));
        }
        let gathered = table.closest_for(&key_in_bucket(1));
        assert_eq!(gathered.len(), 3);
    }

    #[test]
    fn closest_for_self_starts_at_the_nearest_bucket() {
        let local = Key::new([0u8; 20]);
        let mut table = RoutingTable::new(local.clone());
        let near = contacted(key_in_bucket(0), 4330);
        let far = contacted(key_in_bucket(159), 4331);
        table.insert(near.clone());
        table.insert(far);

        let gathered = table.closest_for(&local);
        assert_eq!(gathered.len(), 2);
        assert_eq!(gathered[0].key(), near.key());
    }

    #[test]
    fn closest_for_stops_once_k_are_gathered() {
        let mut table = RoutingTable::new(Key::new([0u8; 20]));
        // Spread 3 * K peers over the top three buckets.
        for i in 0..(3 * K) {
            let mut bytes = [0u8; 20];
            bytes[0] = 0b0010_0000 << (i % 3);
            bytes[18] = (i / 3 + 1) as u8;
            table.insert(contacted(Key::new(bytes), 4340 + i as u16));
        }
        assert_eq!(table.peer_count(), 3 * K);

        let gathered = table.closest_for(&key_in_bucket(157));
        assert!(gathered.len() >= K);
        assert!(gathered.len() < 3 * K);
    }
}

//! Property tests for the key algebra and routing invariants.

use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::HashSet;
use std::net::SocketAddr;
use tangle_dht::{Bucket, K, Key, Message, Peer, PingRequest, RoutingTable};

fn addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

fn contacted(key: Key, port: u16) -> Peer {
    let mut peer = Peer::new(key, addr(port));
    peer.mark_contacted();
    peer
}

proptest! {
    #[test]
    fn xor_with_self_is_zero(bytes in vec(any::<u8>(), 20)) {
        let key = Key::new(bytes);
        prop_assert!(key.xor(&key).unwrap().is_zero());
    }

    #[test]
    fn xor_is_symmetric(a in vec(any::<u8>(), 20), b in vec(any::<u8>(), 20)) {
        let a = Key::new(a);
        let b = Key::new(b);
        prop_assert_eq!(a.xor(&b).unwrap(), b.xor(&a).unwrap());
    }

    #[test]
    fn leading_index_is_in_range(bytes in vec(any::<u8>(), 20)) {
        let key = Key::new(bytes);
        match key.leading_set_bit_index() {
            Some(index) => prop_assert!(index < 160),
            None => prop_assert!(key.is_zero()),
        }
    }

    #[test]
    fn key_bytes_round_trip(bytes in vec(any::<u8>(), 20)) {
        let key = Key::new(bytes.clone());
        prop_assert_eq!(key.as_bytes(), &bytes[..]);
    }

    #[test]
    fn bucket_never_exceeds_capacity_or_repeats_keys(
        seeds in vec(vec(any::<u8>(), 20), 1..60),
    ) {
        let mut bucket = Bucket::default();
        for (i, seed) in seeds.iter().enumerate() {
            bucket.insert(contacted(Key::new(seed.clone()), 6000 + i as u16));
        }

        prop_assert!(bucket.len() <= K);
        let keys: HashSet<_> = bucket.peers().map(|p| p.key().clone()).collect();
        prop_assert_eq!(keys.len(), bucket.len());
        prop_assert!(bucket.peers().all(Peer::contacted));
    }

    #[test]
    fn table_keys_form_a_set(
        seeds in vec(vec(any::<u8>(), 20), 1..80),
    ) {
        let mut table = RoutingTable::new(Key::new([0u8; 20]));
        for (i, seed) in seeds.iter().enumerate() {
            table.insert(contacted(Key::new(seed.clone()), 6100 + i as u16));
        }

        let peers = table.peers();
        let keys: HashSet<_> = peers.iter().map(|p| p.key().clone()).collect();
        prop_assert_eq!(keys.len(), peers.len());
        prop_assert_eq!(table.peer_count(), peers.len());
    }

    #[test]
    fn messages_survive_encoding(bytes in vec(any::<u8>(), 20), port in 1024u16..u16::MAX) {
        let source = Peer::new(Key::new(bytes), addr(port));
        let original = Message::PingRequest(PingRequest::new(source));

        let encoded = original.to_bytes().unwrap();
        let decoded = Message::from_bytes(&encoded).unwrap();
        prop_assert_eq!(decoded.id(), original.id());
        prop_assert_eq!(decoded.source(), original.source());
    }
}

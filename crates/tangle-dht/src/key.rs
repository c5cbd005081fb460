//! Node identity and the XOR distance metric.
//!
//! Keys are opaque byte strings compared and combined bit-wise. A production
//! overlay uses 160-bit keys; smaller sizes are accepted so long as every key
//! in one network shares the same size.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Key width used by the overlay, in bits.
pub const KEY_BITS: usize = 160;

/// Identifier in the overlay's XOR metric space.
///
/// The byte string is big-endian: byte 0 carries the most significant bits.
/// `Ord` compares keys as big-endian integers, which for equal-size keys is
/// exactly the ordering of XOR distances.
///
/// # Examples
///
/// ```
/// use tangle_dht::Key;
///
/// let a = Key::new([0b1010_0000, 0x00]);
/// let b = Key::new([0b0010_0000, 0x00]);
/// let distance = a.xor(&b).unwrap();
/// assert_eq!(distance.as_bytes(), &[0b1000_0000, 0x00]);
/// assert_eq!(distance.leading_set_bit_index(), Some(15));
/// ```
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Key(Box<[u8]>);

impl Key {
    /// Wrap raw octets as a key.
    pub fn new(bytes: impl Into<Box<[u8]>>) -> Self {
        Self(bytes.into())
    }

    /// Generate a random [`KEY_BITS`]-bit key from cryptographic randomness.
    #[must_use]
    pub fn random() -> Self {
        let mut bytes = vec![0u8; KEY_BITS / 8];
        rand::thread_rng().fill(&mut bytes[..]);
        Self(bytes.into())
    }

    /// Generate a random key of `bits` bits.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidKeySize`] unless `bits` is a positive
    /// multiple of 8.
    pub fn random_bits(bits: usize) -> Result<Self, KeyError> {
        if bits == 0 || bits % 8 != 0 {
            return Err(KeyError::InvalidKeySize(bits));
        }
        let mut bytes = vec![0u8; bits / 8];
        rand::thread_rng().fill(&mut bytes[..]);
        Ok(Self(bytes.into()))
    }

    /// Raw octets, most significant first.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Key width in bits.
    #[must_use]
    pub fn bit_len(&self) -> usize {
        self.0.len() * 8
    }

    /// Byte-wise XOR with another key of the same size.
    ///
    /// Read as a big-endian integer, the result is the XOR distance between
    /// the two keys: zero for equal keys, symmetric, and satisfying the
    /// triangle inequality.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::SizeMismatch`] when the key sizes differ.
    pub fn xor(&self, other: &Key) -> Result<Key, KeyError> {
        if self.0.len() != other.0.len() {
            return Err(KeyError::SizeMismatch {
                left: self.bit_len(),
                right: other.bit_len(),
            });
        }
        let bytes: Box<[u8]> = self
            .0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| a ^ b)
            .collect();
        Ok(Key(bytes))
    }

    /// Index of the highest-order set bit, or `None` for the all-zero key.
    ///
    /// Bit 0 is the least significant bit of the last octet; bit
    /// `bit_len() - 1` is the most significant bit of the first octet.
    /// Applied to an XOR distance this yields the Kademlia bucket index: it
    /// partitions the key space into `bit_len()` exponentially growing
    /// shells around a node.
    ///
    /// # Examples
    ///
    /// ```
    /// use tangle_dht::Key;
    ///
    /// assert_eq!(Key::new([0xf0, 0x00]).leading_set_bit_index(), Some(15));
    /// assert_eq!(Key::new([0x00, 0x01]).leading_set_bit_index(), Some(0));
    /// assert_eq!(Key::new([0x00, 0x00]).leading_set_bit_index(), None);
    /// ```
    #[must_use]
    pub fn leading_set_bit_index(&self) -> Option<usize> {
        let len = self.0.len();
        for (offset, byte) in self.0.iter().enumerate() {
            if *byte != 0 {
                let bit = 7 - byte.leading_zeros() as usize;
                return Some((len - 1 - offset) * 8 + bit);
            }
        }
        None
    }

    /// True when every bit is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", URL_SAFE.encode(&self.0))
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({self})")
    }
}

/// Key construction and arithmetic errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    /// XOR of keys of differing sizes.
    #[error("key size mismatch: {left} bits vs {right} bits")]
    SizeMismatch { left: usize, right: usize },

    /// A key size that is not a positive multiple of 8 bits.
    #[error("invalid key size: {0} bits is not a positive multiple of 8")]
    InvalidKeySize(usize),
}

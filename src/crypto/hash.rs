use std::cmp;
use std::cmp::Ordering;
use std::fmt;
use std::hash;

use base64::Engine;
use constant_time_eq::constant_time_eq;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Digest length in bytes. Shared with the external crypto-parameters module;
/// the client signature challenge is exactly this wide.
pub const HASH_LEN: usize = 32;

/// SHA-256 digest of a byte range. It is impractical to produce an identical
/// hash from different data.
#[derive(Copy, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hash {
    digest: [u8; HASH_LEN],
}

impl Hash {
    /// Hash the given bytes.
    pub fn of(data: &[u8]) -> Hash {
        let digest = Sha256::digest(data);
        Hash {
            digest: digest.into(),
        }
    }

    /// Reconstruct a digest from exactly [`HASH_LEN`] raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Hash> {
        let digest: [u8; HASH_LEN] = bytes.try_into().map_err(|_| {
            Error::bad_encoding(
                "read hash",
                format!("expected {} bytes, got {}", HASH_LEN, bytes.len()),
            )
        })?;
        Ok(Hash { digest })
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.digest
    }

    /// Byte-wise XOR with another digest. The client signature protocol
    /// combines its transcript hash and content hash this way; the combination
    /// must stay XOR for wire compatibility.
    pub fn xor(&self, other: &Hash) -> Hash {
        let mut digest = [0u8; HASH_LEN];
        for (out, (a, b)) in digest
            .iter_mut()
            .zip(self.digest.iter().zip(other.digest.iter()))
        {
            *out = a ^ b;
        }
        Hash { digest }
    }

    /// The digest interpreted as a big-endian unsigned integer.
    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_be(&self.digest)
    }
}

impl Eq for Hash {}

impl PartialEq for Hash {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        constant_time_eq(&self.digest, &other.digest)
    }
}

// Not constant time; no cryptographic operation requires Ord. This is solely
// for ordering in a BTree.
impl cmp::Ord for Hash {
    fn cmp(&self, other: &Self) -> Ordering {
        self.digest.cmp(&other.digest)
    }
}

impl cmp::PartialOrd for Hash {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl hash::Hash for Hash {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.digest.hash(state);
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&base64::engine::general_purpose::STANDARD_NO_PAD.encode(self.digest))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Hash({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digest() {
        // SHA-256 of the empty string
        let expected =
            hex::decode("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
                .unwrap();
        assert_eq!(Hash::of(b"").as_bytes(), expected.as_slice());
    }

    #[test]
    fn xor_is_involutive() {
        let a = Hash::of(b"left");
        let b = Hash::of(b"right");
        let combined = a.xor(&b);
        assert_eq!(combined.xor(&b), a);
        assert_eq!(combined.xor(&a), b);
        assert_ne!(combined, a);
    }

    #[test]
    fn from_bytes_length() {
        let digest = Hash::of(b"data");
        let back = Hash::from_bytes(digest.as_bytes()).unwrap();
        assert_eq!(back, digest);
        Hash::from_bytes(&digest.as_bytes()[1..]).unwrap_err();
    }
}

//! 32-byte double SHA-256 digests used as transaction fingerprints.

use crate::types::encoding::EncodeSink;
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 digest length in bytes.
pub const HASH_LEN: usize = 32;

/// Fixed-size 32-byte digest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Hash, Ord, PartialOrd)]
pub struct Hash(pub [u8; HASH_LEN]);

impl Hash {
    /// Computes `SHA-256(SHA-256(data))`.
    pub fn double_sha256(data: &[u8]) -> Hash {
        let mut builder = HashBuilder::new();
        builder.update(data);
        builder.finalize_double()
    }

    /// Returns the digest as a byte slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Returns the lowercase hex form of the digest.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Incremental SHA-256 builder.
///
/// Implements [`EncodeSink`] so encodable values can be hashed straight from
/// their wire form.
pub struct HashBuilder {
    hasher: Sha256,
}

impl HashBuilder {
    /// Creates a new hash builder with empty state.
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
        }
    }

    /// Feeds data into the hash computation.
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Consumes the builder and returns SHA-256 applied twice.
    pub fn finalize_double(self) -> Hash {
        let first = self.hasher.finalize();
        Hash(Sha256::digest(first).into())
    }
}

impl Default for HashBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EncodeSink for HashBuilder {
    fn write(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_sha256_of_empty_input() {
        // Well-known value: SHA-256(SHA-256("")).
        let hash = Hash::double_sha256(b"");
        assert_eq!(
            hash.to_hex(),
            "5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456"
        );
    }

    #[test]
    fn double_differs_from_single() {
        let single = Sha256::digest(b"consenter");
        assert_ne!(Hash::double_sha256(b"consenter").as_slice(), single.as_slice());
    }

    #[test]
    fn sink_writes_match_update() {
        let mut a = HashBuilder::new();
        a.write(&[1, 2]);
        a.write(&[3]);
        assert_eq!(a.finalize_double(), Hash::double_sha256(&[1, 2, 3]));
    }

    #[test]
    fn display_is_lowercase_hex() {
        let hash = Hash([0xAB; HASH_LEN]);
        assert_eq!(hash.to_string(), "ab".repeat(HASH_LEN));
    }
}

//! Schnorr key pairs on secp256k1.
//!
//! The authority node holds a [`PrivateKey`]; the rest of the node treats it
//! as an opaque credential handed to the consensus engine.

use k256::schnorr::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use std::fmt;
use thiserror::Error;
use zeroize::Zeroizing;

/// Length of a raw secret scalar.
pub const PRIVATE_KEY_LEN: usize = 32;

/// Errors produced while loading a private key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("private key is not valid hex")]
    InvalidHex,

    #[error("private key must be {PRIVATE_KEY_LEN} bytes, got {0}")]
    InvalidLength(usize),

    #[error("private key is not a valid secp256k1 scalar")]
    InvalidScalar,
}

/// Private key for signing.
///
/// Never serialized or transmitted over the network.
#[derive(Clone)]
pub struct PrivateKey {
    key: SigningKey,
}

/// Public half of a [`PrivateKey`] (x-only, 32 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicKey {
    key: VerifyingKey,
}

impl PrivateKey {
    /// Generates a new random private key using OS-provided entropy.
    pub fn generate() -> Self {
        Self {
            key: SigningKey::random(&mut OsRng),
        }
    }

    /// Creates a private key from a raw scalar.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != PRIVATE_KEY_LEN {
            return Err(KeyError::InvalidLength(bytes.len()));
        }
        SigningKey::from_bytes(bytes)
            .map(|key| Self { key })
            .map_err(|_| KeyError::InvalidScalar)
    }

    /// Parses a hex-encoded scalar. Surrounding whitespace and a `0x` prefix are accepted.
    pub fn from_hex(text: &str) -> Result<Self, KeyError> {
        let text = text.trim();
        let text = text.strip_prefix("0x").unwrap_or(text);
        let bytes = Zeroizing::new(hex::decode(text).map_err(|_| KeyError::InvalidHex)?);
        Self::from_bytes(&bytes)
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            key: *self.key.verifying_key(),
        }
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey({})", self.public_key())
    }
}

impl PublicKey {
    pub fn to_hex(&self) -> String {
        hex::encode(self.key.to_bytes())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_HEX: &str = "0000000000000000000000000000000000000000000000000000000000000001";

    #[test]
    fn generated_keys_differ() {
        assert_ne!(
            PrivateKey::generate().public_key(),
            PrivateKey::generate().public_key()
        );
    }

    #[test]
    fn from_hex_is_deterministic() {
        let a = PrivateKey::from_hex(KEY_HEX).unwrap();
        let b = PrivateKey::from_hex(&format!("0x{KEY_HEX}\n")).unwrap();
        assert_eq!(a.public_key(), b.public_key());
        // x coordinate of the secp256k1 generator point
        assert_eq!(
            a.public_key().to_hex(),
            "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
        );
    }

    #[test]
    fn from_hex_rejects_bad_input() {
        assert_eq!(PrivateKey::from_hex("zz").unwrap_err(), KeyError::InvalidHex);
        assert_eq!(
            PrivateKey::from_hex("abcd").unwrap_err(),
            KeyError::InvalidLength(2)
        );
        assert_eq!(
            PrivateKey::from_hex(&"00".repeat(32)).unwrap_err(),
            KeyError::InvalidScalar
        );
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let key = PrivateKey::from_hex(KEY_HEX).unwrap();
        let debug = format!("{key:?}");
        assert!(!debug.contains(KEY_HEX));
        assert!(debug.contains(&key.public_key().to_hex()));
    }
}

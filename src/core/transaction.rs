//! Transaction structure and fingerprinting.

use crate::types::encoding::Encode;
use crate::types::hash::{Hash, HashBuilder};
use consenter_derive::BinaryCodec;
use rand::RngCore;

/// A simulated client transaction.
///
/// Carries only a random nonce: it exists to be relayed, deduplicated and
/// batched into blocks, not executed. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, BinaryCodec)]
pub struct Transaction {
    /// Random value chosen at creation; makes each transaction distinct.
    pub nonce: u64,
}

impl Transaction {
    /// Creates a transaction with the given nonce.
    pub fn new(nonce: u64) -> Self {
        Self { nonce }
    }

    /// Creates a transaction with a nonce drawn from `rng`.
    pub fn random<R: RngCore + ?Sized>(rng: &mut R) -> Self {
        Self::new(rng.next_u64())
    }

    /// Returns the double SHA-256 digest of the serialized transaction.
    ///
    /// This is the identity used by the relay cache.
    pub fn fingerprint(&self) -> Hash {
        let mut h = HashBuilder::new();
        self.encode(&mut h);
        h.finalize_double()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::encoding::Decode;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn fingerprint_hashes_serialized_bytes() {
        let tx = Transaction::new(42);
        assert_eq!(tx.fingerprint(), Hash::double_sha256(&tx.to_bytes()));
    }

    #[test]
    fn fingerprint_is_stable() {
        let tx = Transaction::new(7);
        assert_eq!(tx.fingerprint(), Transaction::new(7).fingerprint());
        assert_ne!(tx.fingerprint(), Transaction::new(8).fingerprint());
    }

    #[test]
    fn serialized_form_is_the_nonce() {
        let tx = Transaction::new(0x0102030405060708);
        assert_eq!(tx.to_bytes(), 0x0102030405060708u64.to_le_bytes().to_vec());
        assert_eq!(Transaction::from_bytes(&tx.to_bytes()).unwrap(), tx);
    }

    #[test]
    fn random_is_reproducible_with_seed() {
        let mut a = ChaCha8Rng::seed_from_u64(9);
        let mut b = ChaCha8Rng::seed_from_u64(9);
        assert_eq!(Transaction::random(&mut a), Transaction::random(&mut b));
        assert_ne!(Transaction::random(&mut a), Transaction::random(&mut a));
    }
}

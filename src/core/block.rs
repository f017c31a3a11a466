//! Block and header structures.

use crate::core::transaction::Transaction;
use consenter_derive::BinaryCodec;

/// Block header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BinaryCodec)]
pub struct Header {
    /// Position in the producing engine's sequence. The first block is 1.
    ///
    /// Local to one engine instance; not agreed across the network.
    pub index: u32,
    /// Random value chosen at creation.
    pub nonce: u64,
}

/// A batch of transactions emitted by a consensus engine.
///
/// Never mutated after emission.
#[derive(Debug, Clone, PartialEq, Eq, BinaryCodec)]
pub struct Block {
    pub header: Header,
    /// Transactions in the order the engine received them.
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Creates the block that follows `prev_index` in an engine's sequence.
    pub fn next(prev_index: u32, nonce: u64, transactions: Vec<Transaction>) -> Self {
        Self {
            header: Header {
                index: prev_index.wrapping_add(1),
                nonce,
            },
            transactions,
        }
    }

    /// Returns the block index.
    pub fn index(&self) -> u32 {
        self.header.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::encoding::{Decode, Encode};

    #[test]
    fn next_increments_index() {
        let first = Block::next(0, 1, vec![]);
        assert_eq!(first.index(), 1);
        let second = Block::next(first.index(), 2, vec![]);
        assert_eq!(second.index(), 2);
    }

    #[test]
    fn header_layout_is_index_then_nonce() {
        let header = Header { index: 3, nonce: 4 };
        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), 4 + 8);
        assert_eq!(&bytes[..4], &3u32.to_le_bytes());
        assert_eq!(&bytes[4..], &4u64.to_le_bytes());
    }

    #[test]
    fn block_keeps_transaction_order() {
        let txs = vec![Transaction::new(3), Transaction::new(1), Transaction::new(2)];
        let block = Block::next(5, 99, txs.clone());
        let decoded = Block::from_bytes(&block.to_bytes()).unwrap();
        assert_eq!(decoded.transactions, txs);
        assert_eq!(decoded.header, block.header);
    }

    #[test]
    fn truncated_block_fails() {
        let block = Block::next(0, 1, vec![Transaction::new(1)]);
        let bytes = block.to_bytes();
        assert!(Block::from_bytes(&bytes[..bytes.len() - 1]).is_err());
    }
}

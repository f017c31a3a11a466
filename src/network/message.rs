//! Wire message envelope.

use crate::core::block::Block;
use crate::core::transaction::Transaction;
use consenter_derive::BinaryCodec;

/// The unit of relay between nodes: exactly one transaction or one block.
///
/// Encoded as a one-byte variant tag (0 = transaction, 1 = block) followed by
/// the payload.
#[derive(Debug, Clone, PartialEq, Eq, BinaryCodec)]
pub enum Message {
    Transaction(Transaction),
    Block(Block),
}

impl Message {
    /// Short name of the payload kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Transaction(_) => "transaction",
            Message::Block(_) => "block",
        }
    }
}

impl From<Transaction> for Message {
    fn from(tx: Transaction) -> Self {
        Message::Transaction(tx)
    }
}

impl From<Block> for Message {
    fn from(block: Block) -> Self {
        Message::Block(block)
    }
}

//! Consensus engine contract.
//!
//! An engine is configured once with an outbound publish channel and, on an
//! authority node, a signing key. After that the server hands it every
//! first-seen transaction through [`Engine::add_transaction`]; whatever the
//! engine publishes is relayed to all peers.

pub mod solo;

use crate::core::transaction::Transaction;
use crate::crypto::key_pair::PrivateKey;
use crate::network::message::Message;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::Sender;

pub use solo::SoloEngine;

/// Default interval between blocks of the solo engine.
pub const DEFAULT_BLOCK_TIME: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsensusError {
    #[error("unknown consensus engine `{0}`")]
    UnknownEngine(String),
}

/// A pluggable block producer.
pub trait Engine: Send + Sync {
    /// Registry name of the engine.
    fn name(&self) -> &'static str;

    /// Wires the engine to the node. Called once, before the server starts.
    ///
    /// Must be called from within a tokio runtime.
    fn configure(&mut self, relay: Sender<Message>, key: Option<PrivateKey>);

    /// Hands over a first-seen transaction. Never blocks and never fails.
    fn add_transaction(&self, tx: Transaction);
}

/// Builds the engine registered under `name`.
pub fn engine_by_name(name: &str, block_time: Duration) -> Result<Box<dyn Engine>, ConsensusError> {
    match name {
        SoloEngine::NAME => Ok(Box::new(SoloEngine::new(block_time))),
        other => Err(ConsensusError::UnknownEngine(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solo_is_registered() {
        let engine = engine_by_name("solo", DEFAULT_BLOCK_TIME).unwrap();
        assert_eq!(engine.name(), "solo");
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = engine_by_name("raft", DEFAULT_BLOCK_TIME).err().unwrap();
        assert_eq!(err, ConsensusError::UnknownEngine("raft".into()));
    }
}

//! Gossip node library.
//!
//! Provides the wire codec, transports, peers, relay cache, consensus engines
//! and the server that ties them together.

pub mod cli;
pub mod consensus;
pub mod core;
pub mod crypto;
pub mod network;
pub mod storage;
pub mod types;
pub mod utils;

//! Core data model relayed between nodes.
//!
//! - `Transaction`: opaque, immutable unit identified by its fingerprint
//! - `Block`: header plus the transactions an engine accumulated since the previous block
//!
//! Validity is never checked here; every well-formed value is accepted.

pub mod block;
pub mod transaction;

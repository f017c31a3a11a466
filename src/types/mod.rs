//! Primitive types shared across the node.
//!
//! - `encoding`: deterministic binary `Encode`/`Decode` traits for the wire schema
//! - `hash`: 32-byte double SHA-256 fingerprints
//! - `wrapper_types`: aliases for object-safe async signatures

pub mod encoding;
pub mod hash;
pub mod wrapper_types;

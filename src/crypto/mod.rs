//! Cryptographic credentials.

pub mod key_pair;

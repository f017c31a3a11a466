//! Network layer for peer-to-peer communication between nodes.
//!
//! - [`message`]: the wire message envelope
//! - [`codec`]: length-prefixed framing over byte streams
//! - [`transport`]: transport trait and the connection hand-off to the server
//! - [`tcp_transport`]: TCP transport
//! - [`local_transport`]: in-memory transport for tests and simulations
//! - [`peer`]: peers, their error latch and the per-connection read loop
//! - [`server`]: the node's event loop, relay and bootstrap

pub mod codec;
pub mod local_transport;
pub mod message;
pub mod peer;
pub mod server;
pub mod tcp_transport;
pub mod transport;

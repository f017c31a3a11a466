//! Core transport abstractions.
//!
//! A [`Transport`] knows how to produce connections; it does not own peers.
//! Every established connection, accepted or dialed, is turned into a
//! [`Peer`](crate::network::peer::Peer) and announced to the server through a
//! [`ConnectionSink`]. The sink is the only path from connection tasks into
//! the server's event loop.

use crate::network::message::Message;
use crate::network::peer::{Peer, PeerError};
use crate::types::wrapper_types::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{Receiver, Sender, channel};

/// Errors that can occur during transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The listening resource could not be acquired.
    #[error("failed to listen on {addr}: {reason}")]
    Bind { addr: String, reason: String },

    /// The remote end could not be reached.
    #[error("failed to dial {addr}: {reason}")]
    Dial { addr: String, reason: String },

    /// The remote end did not answer within the dial timeout.
    #[error("dialing {addr} timed out after {timeout:?}")]
    DialTimeout { addr: String, timeout: Duration },

    /// `dial` was called before `listen` handed the transport a sink.
    #[error("transport is not listening")]
    NotListening,

    /// `listen` was called on a transport that already listens.
    #[error("transport is already listening")]
    AlreadyListening,
}

/// Abstracts how connections are established.
///
/// Implementations hand every connection to the [`ConnectionSink`] given to
/// [`listen`](Transport::listen), spawning one reader task per connection.
pub trait Transport: Send + Sync {
    /// Binds `addr` and accepts connections in the background until
    /// [`close`](Transport::close).
    fn listen(
        self: Arc<Self>,
        addr: String,
        sink: ConnectionSink,
    ) -> BoxFuture<'static, Result<(), TransportError>>;

    /// Makes a single connection attempt to `addr` within `timeout`.
    ///
    /// Does not retry; retry policy belongs to the caller.
    fn dial(
        self: Arc<Self>,
        addr: String,
        timeout: Duration,
    ) -> BoxFuture<'static, Result<(), TransportError>>;

    /// Stops accepting and releases the listening resource. Idempotent.
    fn close(&self);
}

/// An inbound message together with the peer whose connection produced it.
pub struct Inbound {
    pub peer: Arc<dyn Peer>,
    pub message: Message,
}

/// Notification that a connection failed and its peer should be dropped.
pub struct PeerDrop {
    pub peer: Arc<dyn Peer>,
    pub reason: PeerError,
}

/// Sending half of the server's connection mailboxes.
///
/// Every send waits for mailbox capacity, so a busy event loop slows down
/// all connection readers.
#[derive(Clone)]
pub struct ConnectionSink {
    add_peer: Sender<Arc<dyn Peer>>,
    inbound: Sender<Inbound>,
    drop_peer: Sender<PeerDrop>,
}

/// Receiving half of the server's connection mailboxes.
pub struct Mailboxes {
    pub add_peer: Receiver<Arc<dyn Peer>>,
    pub inbound: Receiver<Inbound>,
    pub drop_peer: Receiver<PeerDrop>,
}

impl ConnectionSink {
    /// Creates connected sink and mailboxes, each queue bounded by `capacity`.
    pub fn channel(capacity: usize) -> (ConnectionSink, Mailboxes) {
        let (add_tx, add_rx) = channel(capacity);
        let (inbound_tx, inbound_rx) = channel(capacity);
        let (drop_tx, drop_rx) = channel(capacity);

        (
            ConnectionSink {
                add_peer: add_tx,
                inbound: inbound_tx,
                drop_peer: drop_tx,
            },
            Mailboxes {
                add_peer: add_rx,
                inbound: inbound_rx,
                drop_peer: drop_rx,
            },
        )
    }

    /// Announces a newly established connection.
    ///
    /// Returns `false` once the receiving server has gone away.
    pub async fn connected(&self, peer: Arc<dyn Peer>) -> bool {
        self.add_peer.send(peer).await.is_ok()
    }

    /// Forwards a decoded message. Returns `false` once the server has gone away.
    pub async fn deliver(&self, peer: Arc<dyn Peer>, message: Message) -> bool {
        self.inbound.send(Inbound { peer, message }).await.is_ok()
    }

    /// Reports a failed connection. Returns `false` once the server has gone away.
    pub async fn dropped(&self, peer: Arc<dyn Peer>, reason: PeerError) -> bool {
        self.drop_peer.send(PeerDrop { peer, reason }).await.is_ok()
    }

    /// Returns `true` when the receiving mailboxes have been dropped.
    pub fn is_closed(&self) -> bool {
        self.add_peer.is_closed()
    }
}

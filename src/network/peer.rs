//! Remote peers over live byte-stream connections.
//!
//! A peer is created when a connection is dialed or accepted and lives until
//! its connection fails or the server shuts down. Terminal errors are recorded
//! in an [`ErrorLatch`]: set at most once, readable from any task without
//! blocking.

use crate::network::codec;
use crate::network::message::Message;
use crate::network::transport::ConnectionSink;
use crate::types::wrapper_types::BoxFuture;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex, watch};

/// Reasons a peer stops being usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeerError {
    /// The local server is shutting down.
    #[error("server shutting down")]
    ServerShutdown,

    /// Reading or decoding from the connection failed.
    #[error("connection failed: {0}")]
    Stream(String),

    /// Writing a frame to the connection failed.
    #[error("write failed: {0}")]
    Write(String),
}

/// Process-unique identifier of a peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(u64);

impl PeerId {
    /// Allocates the next identifier.
    pub fn next() -> PeerId {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        PeerId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A remote node reachable over an established connection.
pub trait Peer: Send + Sync {
    /// Identifier used as the key of the server's peer set.
    fn id(&self) -> PeerId;

    /// Writes `message` to the connection.
    ///
    /// Fails immediately with the latched error once the peer has been
    /// disconnected. A write failure is returned but does not latch the peer.
    fn send(self: Arc<Self>, message: Arc<Message>) -> BoxFuture<'static, Result<(), PeerError>>;

    /// Closes the connection and latches `reason`. Only the first call has an effect.
    fn disconnect(&self, reason: PeerError);

    /// Human-readable remote endpoint.
    fn endpoint(&self) -> String;
}

/// One-shot terminal error cell.
///
/// Initialized empty at construction. The first [`set`](ErrorLatch::set)
/// wins; later calls are ignored. Reads never block.
pub struct ErrorLatch {
    error: OnceLock<PeerError>,
    closed: watch::Sender<bool>,
}

impl ErrorLatch {
    pub fn new() -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            error: OnceLock::new(),
            closed,
        }
    }

    /// Latches `error`. Returns `true` only for the call that set it.
    pub fn set(&self, error: PeerError) -> bool {
        if self.error.set(error).is_err() {
            return false;
        }
        self.closed.send_replace(true);
        true
    }

    /// Returns the latched error, if any.
    pub fn get(&self) -> Option<&PeerError> {
        self.error.get()
    }

    pub fn is_set(&self) -> bool {
        self.error.get().is_some()
    }

    /// Resolves once an error has been latched.
    pub async fn wait(&self) {
        let mut rx = self.closed.subscribe();
        // The sender lives as long as `self`, so this only returns once latched.
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

impl Default for ErrorLatch {
    fn default() -> Self {
        Self::new()
    }
}

/// A [`Peer`] backed by the write half of any byte stream.
///
/// The read half is driven separately by [`serve_connection`].
pub struct StreamPeer<W> {
    id: PeerId,
    endpoint: String,
    writer: Mutex<Option<W>>,
    latch: ErrorLatch,
}

impl<W> StreamPeer<W>
where
    W: AsyncWrite + Unpin + Send + Sync + 'static,
{
    pub fn new(writer: W, endpoint: impl Into<String>) -> Self {
        Self {
            id: PeerId::next(),
            endpoint: endpoint.into(),
            writer: Mutex::new(Some(writer)),
            latch: ErrorLatch::new(),
        }
    }

    pub fn latch(&self) -> &ErrorLatch {
        &self.latch
    }
}

impl<W> Peer for StreamPeer<W>
where
    W: AsyncWrite + Unpin + Send + Sync + 'static,
{
    fn id(&self) -> PeerId {
        self.id
    }

    fn send(self: Arc<Self>, message: Arc<Message>) -> BoxFuture<'static, Result<(), PeerError>> {
        Box::pin(async move {
            if let Some(err) = self.latch.get() {
                return Err(err.clone());
            }

            let mut guard = self.writer.lock().await;
            // A disconnect may have raced with the wait for the writer.
            if let Some(err) = self.latch.get() {
                guard.take();
                return Err(err.clone());
            }
            let Some(writer) = guard.as_mut() else {
                return Err(PeerError::Write("connection closed".into()));
            };

            // A disconnect must not wait behind a write the remote never drains.
            let written = tokio::select! {
                biased;
                _ = self.latch.wait() => None,
                result = codec::write_frame(writer, &message) => Some(result),
            };

            if self.latch.is_set() {
                guard.take();
            }
            match written {
                Some(result) => result.map_err(|e| PeerError::Write(e.to_string())),
                None => Err(self
                    .latch
                    .get()
                    .cloned()
                    .unwrap_or(PeerError::ServerShutdown)),
            }
        })
    }

    fn disconnect(&self, reason: PeerError) {
        if !self.latch.set(reason) {
            return;
        }
        // An in-flight send holds the lock; it wakes on the latch and drops the writer itself.
        if let Ok(mut guard) = self.writer.try_lock() {
            guard.take();
        }
    }

    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }
}

/// Drives one connection until it fails or its peer is disconnected.
///
/// Announces the new peer, then decodes frames and forwards them in order.
/// Stops quietly when the peer is disconnected; reports the failure reason
/// through the sink when the stream breaks.
pub async fn serve_connection<R, W>(reader: R, writer: W, endpoint: String, sink: ConnectionSink)
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send + Sync + 'static,
{
    let peer = Arc::new(StreamPeer::new(writer, endpoint));
    let handle: Arc<dyn Peer> = peer.clone();

    if !sink.connected(handle.clone()).await {
        peer.disconnect(PeerError::ServerShutdown);
        return;
    }

    let mut reader = reader;
    loop {
        let message = tokio::select! {
            biased;
            _ = peer.latch().wait() => return,
            result = codec::read_frame(&mut reader) => match result {
                Ok(message) => message,
                Err(err) => {
                    let reason = PeerError::Stream(err.to_string());
                    if !sink.dropped(handle, reason.clone()).await {
                        peer.disconnect(reason);
                    }
                    return;
                }
            },
        };

        if !sink.deliver(handle.clone(), message).await {
            peer.disconnect(PeerError::ServerShutdown);
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::Transaction;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex, split};

    fn tx_message(nonce: u64) -> Arc<Message> {
        Arc::new(Message::Transaction(Transaction::new(nonce)))
    }

    #[test]
    fn latch_sets_once() {
        let latch = ErrorLatch::new();
        assert!(latch.get().is_none());
        assert!(latch.set(PeerError::ServerShutdown));
        assert!(!latch.set(PeerError::Stream("late".into())));
        assert_eq!(latch.get(), Some(&PeerError::ServerShutdown));
    }

    #[tokio::test]
    async fn latch_wait_returns_after_set() {
        let latch = Arc::new(ErrorLatch::new());
        let waiter = {
            let latch = latch.clone();
            tokio::spawn(async move { latch.wait().await })
        };
        latch.set(PeerError::ServerShutdown);
        waiter.await.unwrap();
        // Already latched: returns immediately.
        latch.wait().await;
    }

    #[tokio::test]
    async fn send_writes_one_frame() {
        let (local, mut remote) = duplex(1024);
        let peer = Arc::new(StreamPeer::new(local, "remote"));

        peer.clone().send(tx_message(3)).await.unwrap();

        let received = codec::read_frame(&mut remote).await.unwrap();
        assert_eq!(received, Message::Transaction(Transaction::new(3)));
    }

    #[tokio::test]
    async fn send_after_disconnect_returns_latched_error() {
        let (local, _remote) = duplex(1024);
        let peer = Arc::new(StreamPeer::new(local, "remote"));

        peer.disconnect(PeerError::Stream("boom".into()));
        peer.disconnect(PeerError::ServerShutdown);

        let err = peer.clone().send(tx_message(1)).await.unwrap_err();
        assert_eq!(err, PeerError::Stream("boom".into()));
    }

    #[tokio::test]
    async fn write_failure_does_not_latch() {
        let (local, remote) = duplex(64);
        drop(remote);
        let peer = Arc::new(StreamPeer::new(local, "gone"));

        let err = peer.clone().send(tx_message(1)).await.unwrap_err();
        assert!(matches!(err, PeerError::Write(_)));
        assert!(!peer.latch().is_set());
    }

    #[tokio::test]
    async fn disconnect_interrupts_stalled_send_and_closes_connection() {
        // Smaller than one frame, and the remote never reads.
        let (local, mut remote) = duplex(8);
        let peer = Arc::new(StreamPeer::new(local, "slow"));
        let send = tokio::spawn(peer.clone().send(tx_message(1)));
        tokio::task::yield_now().await;
        assert!(!send.is_finished());

        peer.disconnect(PeerError::ServerShutdown);

        let result = tokio::time::timeout(Duration::from_secs(1), send)
            .await
            .expect("send still pending after disconnect")
            .unwrap();
        assert_eq!(result, Err(PeerError::ServerShutdown));

        // The writer is gone: the remote sees the end of the stream after the partial frame.
        let mut drained = Vec::new();
        remote.read_to_end(&mut drained).await.unwrap();
        assert!(drained.len() <= 8);
        assert!(remote.write_all(b"x").await.is_err());
    }

    #[test]
    fn peer_ids_are_unique() {
        assert_ne!(PeerId::next(), PeerId::next());
    }

    #[tokio::test]
    async fn serve_connection_announces_and_forwards_in_order() {
        let (sink, mut mailboxes) = ConnectionSink::channel(4);
        let (local, remote) = duplex(4096);
        let (reader, writer) = split(local);
        tokio::spawn(serve_connection(reader, writer, "remote".into(), sink));

        let peer = mailboxes.add_peer.recv().await.unwrap();
        assert_eq!(peer.endpoint(), "remote");

        let (_remote_reader, mut remote_writer) = split(remote);
        for nonce in 0..5 {
            let frame = codec::encode_frame(&tx_message(nonce)).unwrap();
            remote_writer.write_all(&frame).await.unwrap();
        }

        for nonce in 0..5 {
            let inbound = mailboxes.inbound.recv().await.unwrap();
            assert_eq!(inbound.peer.id(), peer.id());
            assert_eq!(inbound.message, Message::Transaction(Transaction::new(nonce)));
        }
    }

    #[tokio::test]
    async fn serve_connection_reports_broken_stream() {
        let (sink, mut mailboxes) = ConnectionSink::channel(4);
        let (local, remote) = duplex(4096);
        let (reader, writer) = split(local);
        tokio::spawn(serve_connection(reader, writer, "remote".into(), sink));

        let peer = mailboxes.add_peer.recv().await.unwrap();
        drop(remote);

        let dropped = mailboxes.drop_peer.recv().await.unwrap();
        assert_eq!(dropped.peer.id(), peer.id());
        assert!(matches!(dropped.reason, PeerError::Stream(_)));
    }

    #[tokio::test]
    async fn disconnect_stops_reader_without_drop_notice() {
        let (sink, mut mailboxes) = ConnectionSink::channel(4);
        let (local, _remote) = duplex(4096);
        let (reader, writer) = split(local);
        let task = tokio::spawn(serve_connection(reader, writer, "remote".into(), sink));

        let peer = mailboxes.add_peer.recv().await.unwrap();
        peer.disconnect(PeerError::ServerShutdown);

        task.await.unwrap();
        assert!(mailboxes.drop_peer.try_recv().is_err());
    }
}

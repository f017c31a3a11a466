//! Test doubles for the node's collaborators.

use crate::core::transaction::Transaction;
use crate::crypto::key_pair::PrivateKey;
use crate::consensus::Engine;
use crate::network::message::Message;
use crate::network::peer::{ErrorLatch, Peer, PeerError, PeerId};
use crate::network::transport::{ConnectionSink, Transport, TransportError};
use crate::types::wrapper_types::BoxFuture;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tokio::time::{Instant, sleep};

/// Polls `condition` until it holds, panicking after five seconds.
pub async fn eventually<F: FnMut() -> bool>(mut condition: F) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met in time");
        sleep(Duration::from_millis(2)).await;
    }
}

/// Peer that records what it is asked to send.
pub struct MockPeer {
    id: PeerId,
    endpoint: String,
    sent: Mutex<Vec<Message>>,
    disconnects: AtomicUsize,
    fail_sends: bool,
    latch: ErrorLatch,
}

impl MockPeer {
    pub fn new(endpoint: &str) -> Arc<Self> {
        Self::build(endpoint, false)
    }

    /// A peer whose every send fails.
    pub fn failing(endpoint: &str) -> Arc<Self> {
        Self::build(endpoint, true)
    }

    fn build(endpoint: &str, fail_sends: bool) -> Arc<Self> {
        Arc::new(Self {
            id: PeerId::next(),
            endpoint: endpoint.to_string(),
            sent: Mutex::new(Vec::new()),
            disconnects: AtomicUsize::new(0),
            fail_sends,
            latch: ErrorLatch::new(),
        })
    }

    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().unwrap().clone()
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

impl Peer for MockPeer {
    fn id(&self) -> PeerId {
        self.id
    }

    fn send(self: Arc<Self>, message: Arc<Message>) -> BoxFuture<'static, Result<(), PeerError>> {
        Box::pin(async move {
            if let Some(err) = self.latch.get() {
                return Err(err.clone());
            }
            self.sent.lock().unwrap().push((*message).clone());
            if self.fail_sends {
                return Err(PeerError::Write("mock failure".into()));
            }
            Ok(())
        })
    }

    fn disconnect(&self, reason: PeerError) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.latch.set(reason);
    }

    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }
}

/// Transport that hands its sink to the test instead of opening sockets.
#[derive(Default)]
pub struct MockTransport {
    sink: Mutex<Option<ConnectionSink>>,
    listen_calls: AtomicUsize,
    close_calls: AtomicUsize,
    failing_dials: AtomicUsize,
    fail_listen: AtomicBool,
    dials: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes the next `count` dial attempts fail.
    pub fn fail_next_dials(&self, count: usize) {
        self.failing_dials.store(count, Ordering::SeqCst);
    }

    pub fn fail_listen(&self, fail: bool) {
        self.fail_listen.store(fail, Ordering::SeqCst);
    }

    pub fn sink(&self) -> Option<ConnectionSink> {
        self.sink.lock().unwrap().clone()
    }

    pub fn listen_calls(&self) -> usize {
        self.listen_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn dials(&self) -> Vec<String> {
        self.dials.lock().unwrap().clone()
    }

    /// Announces `peer` as a new connection.
    pub async fn connect(&self, peer: Arc<dyn Peer>) {
        let sink = self.sink().expect("transport is not listening");
        assert!(sink.connected(peer).await, "server mailbox closed");
    }

    /// Delivers `message` as if read from `peer`'s connection.
    pub async fn deliver(&self, peer: Arc<dyn Peer>, message: Message) {
        let sink = self.sink().expect("transport is not listening");
        assert!(sink.deliver(peer, message).await, "server mailbox closed");
    }

    /// Reports `peer`'s connection as failed.
    pub async fn drop_peer(&self, peer: Arc<dyn Peer>, reason: PeerError) {
        let sink = self.sink().expect("transport is not listening");
        assert!(sink.dropped(peer, reason).await, "server mailbox closed");
    }
}

impl Transport for MockTransport {
    fn listen(
        self: Arc<Self>,
        addr: String,
        sink: ConnectionSink,
    ) -> BoxFuture<'static, Result<(), TransportError>> {
        Box::pin(async move {
            self.listen_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_listen.load(Ordering::SeqCst) {
                return Err(TransportError::Bind {
                    addr,
                    reason: "mock failure".into(),
                });
            }
            *self.sink.lock().unwrap() = Some(sink);
            Ok(())
        })
    }

    fn dial(
        self: Arc<Self>,
        addr: String,
        _timeout: Duration,
    ) -> BoxFuture<'static, Result<(), TransportError>> {
        Box::pin(async move {
            self.dials.lock().unwrap().push(addr.clone());
            let fail = self
                .failing_dials
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if fail {
                return Err(TransportError::Dial {
                    addr,
                    reason: "mock failure".into(),
                });
            }
            Ok(())
        })
    }

    fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.sink.lock().unwrap().take();
    }
}

/// Engine that records the transactions it is handed.
///
/// Clones share state, so a test can keep one while the server owns another.
#[derive(Clone, Default)]
pub struct MockEngine {
    added: Arc<Mutex<Vec<Transaction>>>,
    relay: Arc<Mutex<Option<Sender<Message>>>>,
    key: Arc<Mutex<Option<PrivateKey>>>,
}

impl MockEngine {
    pub fn added(&self) -> Vec<Transaction> {
        self.added.lock().unwrap().clone()
    }

    /// Publish channel handed over by `configure`.
    pub fn relay(&self) -> Sender<Message> {
        self.relay
            .lock()
            .unwrap()
            .clone()
            .expect("engine was not configured")
    }

    pub fn key(&self) -> Option<PrivateKey> {
        self.key.lock().unwrap().clone()
    }
}

impl Engine for MockEngine {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn configure(&mut self, relay: Sender<Message>, key: Option<PrivateKey>) {
        *self.relay.lock().unwrap() = Some(relay);
        *self.key.lock().unwrap() = key;
    }

    fn add_transaction(&self, tx: Transaction) {
        self.added.lock().unwrap().push(tx);
    }
}

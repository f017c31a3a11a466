//! Node server orchestrating peers, relay and consensus.
//!
//! All peer-set mutations happen on the event loop inside [`Server::start`].
//! Connection tasks, the consensus engine and the transaction generator only
//! ever talk to it through mailboxes.

use crate::consensus::Engine;
use crate::core::transaction::Transaction;
use crate::crypto::key_pair::PrivateKey;
use crate::network::message::Message;
use crate::network::peer::{Peer, PeerError, PeerId};
use crate::network::transport::{ConnectionSink, Inbound, Mailboxes, PeerDrop, Transport, TransportError};
use crate::storage::mem_store::MemStore;
use crate::storage::storage_trait::{Store, StoreError};
use crate::types::encoding::Encode;
use crate::{debug, error, info, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{Receiver, Sender, channel};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::sleep;

/// Capacity of each event-loop mailbox.
pub const MAILBOX_CAPACITY: usize = 128;

/// Configuration options for the server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address handed to the transport's `listen`.
    pub listen_addr: String,
    /// Seed addresses dialed at startup.
    pub bootstrap_nodes: Vec<String>,
    /// Upper bound for a single dial attempt.
    pub dial_timeout: Duration,
    /// Wait between the failed first dial of a seed and its only retry.
    pub redial_delay: Duration,
    /// If set, this node runs a consensus engine and produces blocks.
    pub authority: bool,
    /// Credential handed to the engine on authority nodes.
    pub private_key: Option<PrivateKey>,
    /// Runs the synthetic transaction generator.
    pub generate_transactions: bool,
    /// The generator sleeps between one and four of these per transaction.
    pub tx_interval_unit: Duration,
    /// Seed for the generator's random stream. OS entropy when unset.
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            bootstrap_nodes: Vec::new(),
            dial_timeout: Duration::from_secs(3),
            redial_delay: Duration::from_secs(5),
            authority: false,
            private_key: None,
            generate_transactions: false,
            tx_interval_unit: Duration::from_secs(1),
            seed: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("server is already running")]
    AlreadyRunning,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A gossip node.
///
/// Owns the relay cache and the engine; borrows connections from the
/// transport. Can be started again after [`stop`](Server::stop) returns it to
/// the stopped state.
pub struct Server {
    config: ServerConfig,
    transport: Arc<dyn Transport>,
    engine: Option<Arc<dyn Engine>>,
    relay_cache: Arc<MemStore>,
    relay_tx: Sender<Message>,
    relay_rx: Mutex<Option<Receiver<Message>>>,
    running: Mutex<bool>,
    quit: watch::Sender<bool>,
    peer_count: watch::Sender<usize>,
}

impl Server {
    /// Creates a server and configures `engine` with the node's publish channel.
    ///
    /// Must be called from within a tokio runtime when an engine is given.
    pub fn new(
        config: ServerConfig,
        transport: Arc<dyn Transport>,
        engine: Option<Box<dyn Engine>>,
    ) -> Self {
        let (relay_tx, relay_rx) = channel(MAILBOX_CAPACITY);
        let engine: Option<Arc<dyn Engine>> = engine.map(|mut engine| {
            engine.configure(relay_tx.clone(), config.private_key.clone());
            Arc::from(engine)
        });

        Self {
            config,
            transport,
            engine,
            relay_cache: Arc::new(MemStore::new()),
            relay_tx,
            relay_rx: Mutex::new(Some(relay_rx)),
            running: Mutex::new(false),
            quit: watch::channel(false).0,
            peer_count: watch::channel(0).0,
        }
    }

    /// Runs the node until [`stop`](Server::stop) is called.
    ///
    /// Binds the transport, launches bootstrap and the optional generator,
    /// then drives the event loop. Returns once every peer has been
    /// disconnected and the transport closed.
    pub async fn start(&self) -> Result<(), ServerError> {
        let mut relay_rx = {
            let mut running = lock(&self.running);
            if *running {
                return Err(ServerError::AlreadyRunning);
            }
            let Some(relay_rx) = lock(&self.relay_rx).take() else {
                return Err(ServerError::AlreadyRunning);
            };
            *running = true;
            relay_rx
        };

        let (sink, mailboxes) = ConnectionSink::channel(MAILBOX_CAPACITY);
        if let Err(e) = self
            .transport
            .clone()
            .listen(self.config.listen_addr.clone(), sink)
            .await
        {
            *lock(&self.relay_rx) = Some(relay_rx);
            self.finish_run();
            return Err(e.into());
        }
        info!(
            "server started";
            "addr" => self.config.listen_addr,
            "authority" => self.config.authority
        );

        let mut background = vec![self.spawn_bootstrap()];
        if self.config.generate_transactions {
            background.push(self.spawn_generator());
        }

        self.event_loop(&mut relay_rx, mailboxes).await;

        for task in background {
            task.abort();
        }
        *lock(&self.relay_rx) = Some(relay_rx);
        self.finish_run();
        info!("server stopped");
        Ok(())
    }

    /// Signals the event loop to shut down.
    ///
    /// Does nothing unless the server is running. A stop issued while `start`
    /// is still binding is honored as soon as the loop starts.
    pub fn stop(&self) {
        let running = lock(&self.running);
        if *running {
            self.quit.send_replace(true);
        }
    }

    fn finish_run(&self) {
        let mut running = lock(&self.running);
        self.quit.send_replace(false);
        *running = false;
    }

    pub fn is_running(&self) -> bool {
        *lock(&self.running)
    }

    /// Number of peers in the active set, as last published by the event loop.
    pub fn peer_count(&self) -> usize {
        *self.peer_count.borrow()
    }

    /// Resolves once at least `count` peers are connected.
    pub async fn wait_for_peers(&self, count: usize) {
        let mut rx = self.peer_count.subscribe();
        let _ = rx.wait_for(|connected| *connected >= count).await;
    }

    /// Returns `true` if a transaction with `fingerprint` has already been relayed.
    pub fn has_seen(&self, fingerprint: &[u8]) -> bool {
        self.relay_cache.has(fingerprint)
    }

    async fn event_loop(&self, relay_rx: &mut Receiver<Message>, mut mailboxes: Mailboxes) {
        let mut quit = self.quit.subscribe();
        let mut peers: HashMap<PeerId, Arc<dyn Peer>> = HashMap::new();

        loop {
            tokio::select! {
                biased;
                _ = wait_quit(&mut quit) => break,
                Some(message) = relay_rx.recv() => broadcast(&peers, message),
                Some(inbound) = mailboxes.inbound.recv() => self.handle_inbound(&peers, inbound),
                Some(peer) = mailboxes.add_peer.recv() => {
                    info!("new peer connected"; "endpoint" => peer.endpoint(), "id" => peer.id());
                    peers.insert(peer.id(), peer);
                    self.peer_count.send_replace(peers.len());
                }
                Some(PeerDrop { peer, reason }) = mailboxes.drop_peer.recv() => {
                    peers.remove(&peer.id());
                    peer.disconnect(reason.clone());
                    warn!("peer disconnected"; "endpoint" => peer.endpoint(), "reason" => reason);
                    self.peer_count.send_replace(peers.len());
                }
            }
        }

        // Connections announced but not yet picked up are shut down too.
        while let Ok(peer) = mailboxes.add_peer.try_recv() {
            peers.insert(peer.id(), peer);
        }
        for peer in peers.values() {
            peer.disconnect(PeerError::ServerShutdown);
        }
        peers.clear();
        self.peer_count.send_replace(0);
        self.transport.close();
    }

    fn handle_inbound(&self, peers: &HashMap<PeerId, Arc<dyn Peer>>, inbound: Inbound) {
        match inbound.message {
            Message::Transaction(tx) => self.process_transaction(peers, tx),
            Message::Block(block) => debug!(
                "block received";
                "from" => inbound.peer.endpoint(),
                "index" => block.index(),
                "transactions" => block.transactions.len()
            ),
        }
    }

    fn process_transaction(&self, peers: &HashMap<PeerId, Arc<dyn Peer>>, tx: Transaction) {
        let fingerprint = tx.fingerprint();
        if self.relay_cache.has(fingerprint.as_slice()) {
            return;
        }
        if let Err(e) = self.relay_cache.put(fingerprint.as_slice(), &tx.to_bytes()) {
            error!("failed to record transaction"; "hash" => fingerprint, "reason" => e);
            return;
        }

        info!("new transaction"; "hash" => fingerprint);
        broadcast(peers, Message::Transaction(tx));
        if let Some(engine) = &self.engine {
            engine.add_transaction(tx);
        }
    }

    fn spawn_bootstrap(&self) -> JoinHandle<()> {
        let transport = self.transport.clone();
        let seeds = self.config.bootstrap_nodes.clone();
        let dial_timeout = self.config.dial_timeout;
        let redial_delay = self.config.redial_delay;

        tokio::spawn(async move {
            let mut dials = JoinSet::new();
            for addr in seeds {
                dials.spawn(dial_seed(transport.clone(), addr, dial_timeout, redial_delay));
            }
            while dials.join_next().await.is_some() {}
        })
    }

    fn spawn_generator(&self) -> JoinHandle<()> {
        let rng = match self.config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        tokio::spawn(generate_transactions(
            self.relay_tx.clone(),
            self.relay_cache.clone(),
            self.engine.clone(),
            self.config.tx_interval_unit,
            rng,
        ))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn wait_quit(quit: &mut watch::Receiver<bool>) {
    let _ = quit.wait_for(|quit| *quit).await;
}

/// Sends `message` to every peer, one independent task per peer.
fn broadcast(peers: &HashMap<PeerId, Arc<dyn Peer>>, message: Message) {
    let message = Arc::new(message);
    for peer in peers.values() {
        let peer = peer.clone();
        let message = message.clone();
        tokio::spawn(async move {
            let endpoint = peer.endpoint();
            let kind = message.kind();
            if let Err(e) = peer.send(message).await {
                warn!("relay failed"; "endpoint" => endpoint, "kind" => kind, "reason" => e);
            }
        });
    }
}

/// Dials a seed, retrying once after `redial_delay`.
async fn dial_seed(
    transport: Arc<dyn Transport>,
    addr: String,
    dial_timeout: Duration,
    redial_delay: Duration,
) {
    let Err(e) = transport.clone().dial(addr.clone(), dial_timeout).await else {
        return;
    };
    warn!(
        "dial failed, retrying";
        "addr" => addr,
        "reason" => e,
        "delay_ms" => redial_delay.as_millis()
    );

    sleep(redial_delay).await;
    if let Err(e) = transport.dial(addr.clone(), dial_timeout).await {
        error!("dial failed"; "addr" => addr, "reason" => e);
    }
}

/// Feeds random transactions into the relay path until the relay channel closes.
async fn generate_transactions(
    relay: Sender<Message>,
    cache: Arc<MemStore>,
    engine: Option<Arc<dyn Engine>>,
    unit: Duration,
    mut rng: ChaCha8Rng,
) {
    loop {
        let tx = Transaction::random(&mut rng);
        let fingerprint = tx.fingerprint();
        if let Err(e) = cache.put(fingerprint.as_slice(), &tx.to_bytes()) {
            warn!("failed to record generated transaction"; "reason" => e);
        }
        if let Some(engine) = &engine {
            engine.add_transaction(tx);
        }
        if relay.send(Message::Transaction(tx)).await.is_err() {
            return;
        }
        debug!("generated transaction"; "hash" => fingerprint);

        sleep(unit * rng.gen_range(1..=4u32)).await;
    }
}

//! Single-producer reference engine.
//!
//! Accumulates transactions and, every block interval, publishes them as the
//! next block. Unpublished transactions are lost when the engine is dropped.

use crate::consensus::Engine;
use crate::core::block::Block;
use crate::core::transaction::Transaction;
use crate::crypto::key_pair::PrivateKey;
use crate::network::message::Message;
use crate::{debug, info, warn};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::mem;
use std::time::Duration;
use tokio::sync::mpsc::{Sender, UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};

pub struct SoloEngine {
    block_time: Duration,
    rng: Option<ChaCha8Rng>,
    inbox: Option<UnboundedSender<Transaction>>,
    task: Option<JoinHandle<()>>,
}

impl SoloEngine {
    pub const NAME: &'static str = "solo";

    /// Creates an engine producing a block every `block_time`, seeded from OS entropy.
    pub fn new(block_time: Duration) -> Self {
        Self::with_rng(block_time, ChaCha8Rng::from_entropy())
    }

    /// Creates an engine drawing block nonces from `rng`.
    pub fn with_rng(block_time: Duration, rng: ChaCha8Rng) -> Self {
        Self {
            block_time,
            rng: Some(rng),
            inbox: None,
            task: None,
        }
    }

    async fn run(
        block_time: Duration,
        mut inbox: UnboundedReceiver<Transaction>,
        relay: Sender<Message>,
        mut rng: ChaCha8Rng,
    ) {
        let mut pending = Vec::new();
        let mut index = 0u32;
        let timer = sleep(block_time);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                biased;
                tx = inbox.recv() => match tx {
                    Some(tx) => pending.push(tx),
                    None => return,
                },
                _ = &mut timer => {
                    let block = Block::next(index, rng.next_u64(), mem::take(&mut pending));
                    index = block.index();
                    info!(
                        "block produced";
                        "index" => index,
                        "transactions" => block.transactions.len()
                    );
                    if relay.send(Message::Block(block)).await.is_err() {
                        debug!("solo engine stopped: relay channel closed");
                        return;
                    }
                    timer.as_mut().reset(Instant::now() + block_time);
                }
            }
        }
    }
}

impl Engine for SoloEngine {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn configure(&mut self, relay: Sender<Message>, key: Option<PrivateKey>) {
        if let Some(key) = &key {
            info!("authority key loaded"; "public_key" => key.public_key());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }

        let (inbox, rx) = unbounded_channel();
        let rng = self.rng.take().unwrap_or_else(ChaCha8Rng::from_entropy);
        self.task = Some(tokio::spawn(Self::run(self.block_time, rx, relay, rng)));
        self.inbox = Some(inbox);
    }

    fn add_transaction(&self, tx: Transaction) {
        match &self.inbox {
            Some(inbox) => {
                let _ = inbox.send(tx);
            }
            None => warn!("solo engine not configured, dropping transaction"),
        }
    }
}

impl Drop for SoloEngine {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

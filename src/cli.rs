//! Command-line interface of the node binary.

use crate::consensus::{ConsensusError, Engine, engine_by_name};
use crate::crypto::key_pair::{KeyError, PrivateKey};
use crate::network::server::{ServerConfig, ServerError};
use crate::utils::log::Level;
use clap::{Args, Parser, Subcommand};
use std::time::Duration;
use thiserror::Error;
use zeroize::Zeroizing;

/// Errors that abort the process before any network activity.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("--consensus requires a private key (--privkey or CONSENTER_PRIVKEY)")]
    MissingPrivateKey,

    #[error("--consensus requires an engine name (--engine)")]
    MissingEngine,

    #[error("invalid private key: {0}")]
    Key(#[from] KeyError),

    #[error(transparent)]
    Consensus(#[from] ConsensusError),

    #[error(transparent)]
    Server(#[from] ServerError),
}

#[derive(Parser, Debug)]
#[command(name = "consenter")]
#[command(about = "Gossip node with pluggable consensus")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a node
    Node(NodeArgs),
}

#[derive(Args, Debug)]
pub struct NodeArgs {
    /// TCP port to listen on
    #[arg(long, default_value_t = 3000)]
    pub tcp: u16,

    /// Seed node addresses (comma-separated, may be empty)
    #[arg(long, value_delimiter = ',')]
    pub seed: Vec<String>,

    /// Run as an authority that produces blocks
    #[arg(long)]
    pub consensus: bool,

    /// Hex-encoded authority private key
    #[arg(long, env = "CONSENTER_PRIVKEY", hide_env_values = true)]
    pub privkey: Option<String>,

    /// Consensus engine name (e.g. "solo")
    #[arg(long)]
    pub engine: Option<String>,

    /// Seconds between blocks produced by the engine
    #[arg(long, default_value_t = 15)]
    pub block_time: u64,

    /// Disable the synthetic transaction generator
    #[arg(long)]
    pub no_generate: bool,

    /// Seed for the transaction generator
    #[arg(long)]
    pub rng_seed: Option<u64>,

    /// Log level (debug, info, warn, error)
    #[arg(long, env = "CONSENTER_LOG", default_value = "info")]
    pub log_level: Level,
}

impl NodeArgs {
    /// Validates the arguments and builds the server configuration and engine.
    pub fn into_server_parts(
        self,
    ) -> Result<(ServerConfig, Option<Box<dyn Engine>>), StartupError> {
        let privkey = self.privkey.map(Zeroizing::new);

        let (private_key, engine) = if self.consensus {
            let privkey = privkey
                .filter(|key| !key.trim().is_empty())
                .ok_or(StartupError::MissingPrivateKey)?;
            let name = self
                .engine
                .filter(|name| !name.trim().is_empty())
                .ok_or(StartupError::MissingEngine)?;

            let key = PrivateKey::from_hex(&privkey)?;
            let engine = engine_by_name(name.trim(), Duration::from_secs(self.block_time))?;
            (Some(key), Some(engine))
        } else {
            (None, None)
        };

        let config = ServerConfig {
            listen_addr: format!("0.0.0.0:{}", self.tcp),
            bootstrap_nodes: self
                .seed
                .iter()
                .map(|addr| addr.trim())
                .filter(|addr| !addr.is_empty())
                .map(str::to_string)
                .collect(),
            authority: self.consensus,
            private_key,
            generate_transactions: !self.no_generate,
            seed: self.rng_seed,
            ..ServerConfig::default()
        };
        Ok((config, engine))
    }
}

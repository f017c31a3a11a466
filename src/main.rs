//! Gossip node with pluggable consensus.
//!
//! # Usage
//! ```text
//! consenter node [--tcp <port>] [--seed <addr,...>] [--consensus --privkey <hex> --engine solo]
//! ```
//!
//! Every node relays transactions to its peers; an authority node also runs a
//! consensus engine that batches them into blocks.

use clap::Parser;
use consenter::cli::{Cli, Command};
use consenter::info;
use consenter::network::server::Server;
use consenter::network::tcp_transport::TcpTransport;
use consenter::utils::log;
use std::process;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let Command::Node(args) = Cli::parse().command;
    log::set_max_level(args.log_level);

    let (config, engine) = match args.into_server_parts() {
        Ok(parts) => parts,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };

    let server = Arc::new(Server::new(config, TcpTransport::new(), engine));

    let interrupt = {
        let server = server.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, shutting down");
                server.stop();
            }
        })
    };

    let result = server.start().await;
    interrupt.abort();

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

// Copyright (c) 2026 Tessera Contributors. MIT License.
// See LICENSE for details.

//! # Tessera Node
//!
//! Entry point for the `tessera-node` binary. Parses CLI arguments,
//! initializes logging and runs one of four subcommands:
//!
//! - `run`     - a single node talking TCP to its peers
//! - `local`   - a validator plus followers in one process, with a load
//!   generator and periodic status reports
//! - `keygen`  - print a fresh key pair as JSON
//! - `version` - print build version information

mod cli;
mod logging;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use rand::seq::SliceRandom;
use rand::RngCore;
use serde::Serialize;
use tokio::signal;
use tokio::task::JoinHandle;

use tessera_protocol::config;
use tessera_protocol::crypto::PrivateKey;
use tessera_protocol::network::{
    LocalTransport, Server, ServerConfig, ServerHandle, TcpTransport, Transport,
};
use tessera_protocol::transaction::Transaction;

use cli::{Commands, LocalArgs, RunArgs, TesseraNodeCli};
use logging::DEFAULT_FILTER;

/// Delay between attempts to reach a peer that is not up yet.
const PEER_RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// Payload size for generated transactions in `local` mode.
const LOAD_PAYLOAD_LEN: usize = 32;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = TesseraNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Local(args) => run_local(args).await,
        Commands::Keygen => keygen(),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

/// Starts one node on TCP and runs it until SIGINT or SIGTERM.
async fn run_node(args: RunArgs) -> Result<()> {
    logging::init_logging(DEFAULT_FILTER, args.log_format);

    if args.block_time_ms == 0 {
        bail!("--block-time-ms must be greater than zero");
    }

    let private_key = args
        .validator_key
        .as_deref()
        .map(PrivateKey::from_hex)
        .transpose()
        .context("failed to parse validator key")?;

    let transport = Arc::new(
        TcpTransport::bind(args.listen)
            .await
            .with_context(|| format!("failed to bind {}", args.listen))?,
    );

    tracing::info!(
        id = %args.id,
        listen = %transport.local_addr(),
        peers = args.peers.len(),
        validator = private_key.is_some(),
        block_time_ms = args.block_time_ms,
        "starting tessera-node"
    );

    let dialers: Vec<JoinHandle<()>> = args
        .peers
        .iter()
        .map(|&peer| {
            let transport = Arc::clone(&transport);
            tokio::spawn(async move {
                loop {
                    match transport.connect(peer).await {
                        Ok(_) => break,
                        Err(err) => {
                            tracing::warn!(peer = %peer, error = %err, "peer unreachable, retrying");
                            tokio::time::sleep(PEER_RETRY_INTERVAL).await;
                        }
                    }
                }
            })
        })
        .collect();

    let server = Server::new(ServerConfig {
        id: args.id,
        block_time: Duration::from_millis(args.block_time_ms),
        private_key,
        transports: vec![transport as Arc<dyn Transport>],
        ..Default::default()
    });
    let handle = server.handle();
    let server_task = tokio::spawn(server.run());

    shutdown_signal().await;
    tracing::info!("shutdown signal received");

    for dialer in dialers {
        dialer.abort();
    }
    handle.shutdown();
    let server = server_task.await.context("server task panicked")?;

    tracing::info!(
        height = server.chain().height(),
        tip = %server.chain().tip_hash(),
        "tessera-node stopped"
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// local
// ---------------------------------------------------------------------------

/// Runs a validator and `args.followers` followers over in-process links,
/// submitting a random signed transaction to a random node every
/// `tx_interval_ms`.
async fn run_local(args: LocalArgs) -> Result<()> {
    logging::init_logging(DEFAULT_FILTER, args.log_format);

    if args.block_time_ms == 0 || args.tx_interval_ms == 0 || args.status_interval_ms == 0 {
        bail!("intervals must be greater than zero");
    }

    let validator_transport = Arc::new(LocalTransport::new("validator"));
    let mut transports = vec![(
        "validator".to_string(),
        Some(PrivateKey::generate()),
        Arc::clone(&validator_transport),
    )];
    for i in 0..args.followers {
        let id = format!("follower-{i}");
        let transport = Arc::new(LocalTransport::new(id.as_str()));
        validator_transport.connect(&transport);
        transport.connect(&validator_transport);
        transports.push((id, None, transport));
    }

    let block_time = Duration::from_millis(args.block_time_ms);
    let mut nodes: Vec<(ServerHandle, JoinHandle<Server>)> = Vec::new();
    for (id, private_key, transport) in transports {
        let server = Server::new(ServerConfig {
            id,
            block_time,
            private_key,
            transports: vec![transport as Arc<dyn Transport>],
            ..Default::default()
        });
        let handle = server.handle();
        nodes.push((handle, tokio::spawn(server.run())));
    }

    tracing::info!(
        followers = args.followers,
        block_time_ms = args.block_time_ms,
        tx_interval_ms = args.tx_interval_ms,
        "local network started"
    );

    let handles: Vec<ServerHandle> = nodes.iter().map(|(handle, _)| handle.clone()).collect();
    let load = tokio::spawn(generate_load(
        handles.clone(),
        Duration::from_millis(args.tx_interval_ms),
    ));
    let reporter = tokio::spawn(report_status(
        handles,
        Duration::from_millis(args.status_interval_ms),
    ));

    shutdown_signal().await;
    tracing::info!("shutdown signal received");

    load.abort();
    reporter.abort();
    for (handle, _) in &nodes {
        handle.shutdown();
    }
    for (_, task) in nodes {
        let server = task.await.context("server task panicked")?;
        tracing::info!(
            id = server.id(),
            height = server.chain().height(),
            "node stopped"
        );
    }
    Ok(())
}

async fn generate_load(handles: Vec<ServerHandle>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    let signer = PrivateKey::generate();

    loop {
        ticker.tick().await;

        let mut payload = vec![0u8; LOAD_PAYLOAD_LEN];
        let target = {
            let mut rng = rand::thread_rng();
            rng.fill_bytes(&mut payload);
            handles.choose(&mut rng)
        };
        let Some(target) = target else {
            return;
        };

        let mut tx = Transaction::new(payload);
        tx.sign(&signer);
        let hash = tx.hash();
        match target.submit_transaction(tx).await {
            Ok(()) => tracing::debug!(hash = %hash.short(), "submitted transaction"),
            Err(err) => tracing::warn!(error = %err, "submission failed"),
        }
    }
}

async fn report_status(handles: Vec<ServerHandle>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        for handle in &handles {
            match handle.status().await {
                Ok(status) => tracing::info!(
                    id = %status.id,
                    height = status.height,
                    tip = %status.tip_hash.short(),
                    mempool = status.mempool_len,
                    validator = status.is_validator,
                    "status"
                ),
                Err(err) => tracing::warn!(error = %err, "status query failed"),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// keygen / version
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct KeyPairOutput {
    private_key: String,
    public_key: String,
    address: String,
}

/// Prints a fresh key pair as JSON on stdout.
fn keygen() -> Result<()> {
    let key = PrivateKey::generate();
    let public_key = key.public_key();
    let output = KeyPairOutput {
        private_key: key.to_hex(),
        public_key: public_key.to_hex(),
        address: public_key.address().to_string(),
    };
    let json = serde_json::to_string_pretty(&output).context("failed to encode key pair")?;
    println!("{json}");
    Ok(())
}

fn version_report() -> String {
    format!(
        "tessera-node {}\nprotocol     {}\nsignatures   {}\nhash         {}",
        env!("CARGO_PKG_VERSION"),
        config::PROTOCOL_VERSION,
        config::SIGNING_ALGORITHM,
        config::PRIMARY_HASH_FUNCTION,
    )
}

fn print_version() {
    println!("{}", version_report());
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

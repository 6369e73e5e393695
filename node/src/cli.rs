//! # CLI Interface
//!
//! Defines the command-line argument structure for `tessera-node` using
//! `clap` derive. Supports four subcommands: `run`, `local`, `keygen`
//! and `version`.

use std::net::SocketAddr;

use clap::{Parser, Subcommand};
use tessera_protocol::config::DEFAULT_BLOCK_TIME_MS;

use crate::logging::LogFormat;

/// Tessera ledger node.
///
/// Runs a validator or follower over TCP, or a whole in-process network for
/// experimentation.
#[derive(Parser, Debug)]
#[command(
    name = "tessera-node",
    about = "Tessera single-validator ledger node",
    version,
    propagate_version = true
)]
pub struct TesseraNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a node that talks to its peers over TCP.
    Run(RunArgs),
    /// Start a validator and several followers in this process and feed
    /// them random transactions.
    Local(LocalArgs),
    /// Generate a fresh key pair and print it as JSON.
    Keygen,
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Name used in log output.
    #[arg(long, env = "TESSERA_ID", default_value = "node")]
    pub id: String,

    /// Address to accept peer connections on.
    #[arg(long, short = 'l', env = "TESSERA_LISTEN", default_value = "127.0.0.1:3000")]
    pub listen: SocketAddr,

    /// Peer to dial on startup. Repeat the flag, or comma-separate in the
    /// environment variable, for several peers.
    #[arg(long = "peer", env = "TESSERA_PEERS", value_delimiter = ',')]
    pub peers: Vec<SocketAddr>,

    /// Hex-encoded Ed25519 private key. Makes this node the validator.
    ///
    /// **Prefer the environment variable** over the flag so the key does not
    /// end up in shell history.
    #[arg(long, env = "TESSERA_VALIDATOR_KEY", hide_env_values = true)]
    pub validator_key: Option<String>,

    /// Block interval in milliseconds. Only used by the validator.
    #[arg(long, env = "TESSERA_BLOCK_TIME_MS", default_value_t = DEFAULT_BLOCK_TIME_MS)]
    pub block_time_ms: u64,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

/// Arguments for the `local` subcommand.
#[derive(Parser, Debug)]
pub struct LocalArgs {
    /// Number of follower nodes next to the validator.
    #[arg(long, default_value_t = 2)]
    pub followers: usize,

    /// Block interval in milliseconds.
    #[arg(long, default_value_t = DEFAULT_BLOCK_TIME_MS)]
    pub block_time_ms: u64,

    /// Interval between generated transactions, in milliseconds.
    #[arg(long, default_value_t = 1_000)]
    pub tx_interval_ms: u64,

    /// Interval between status reports, in milliseconds.
    #[arg(long, default_value_t = 5_000)]
    pub status_interval_ms: u64,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

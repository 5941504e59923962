//! # CLI Interface
//!
//! Command-line arguments for `bcdb-demo`, with environment fallbacks for
//! everything a deployment would normally inject.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::logging::LogFormat;

/// Demo client for a BCDB replica.
#[derive(Parser, Debug)]
#[command(name = "bcdb-demo", version, propagate_version = true)]
pub struct DemoCli {
    /// Log output format.
    #[arg(long, global = true, value_enum, env = "BCDB_LOG_FORMAT", default_value = "pretty")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run two transactions against a replica: write two keys, then combine
    /// them into a third.
    Run(RunArgs),
    /// Generate a user key file and print its certificate.
    Keygen(KeygenArgs),
    /// Print version information and exit.
    Version,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Base URL of the replica's REST endpoint.
    #[arg(long, env = "BCDB_URL", default_value = "http://localhost:6001/")]
    pub url: String,

    /// Replica identifier.
    #[arg(long, env = "BCDB_REPLICA_ID", default_value = "node1")]
    pub replica_id: String,

    /// Hex-encoded public key the replica signs responses with. Responses
    /// are not verified when omitted.
    #[arg(long, env = "BCDB_NODE_CERT")]
    pub node_cert: Option<String>,

    /// Acting user.
    #[arg(long, env = "BCDB_USER", default_value = "testUser")]
    pub user: String,

    /// File holding the user's hex-encoded secret key.
    #[arg(long, env = "BCDB_KEY_FILE")]
    pub key_file: Option<PathBuf>,

    /// Hex-encoded secret key. Prefer `--key-file` outside of tests.
    #[arg(long, env = "BCDB_KEY", conflicts_with = "key_file")]
    pub key: Option<String>,

    /// Database to operate on.
    #[arg(long, env = "BCDB_DB", default_value = "bdb")]
    pub db: String,

    /// Per-request timeout in milliseconds.
    #[arg(long, env = "BCDB_TIMEOUT_MS", default_value_t = 10_000)]
    pub timeout_ms: u64,

    /// Print the SDK's Prometheus metrics to stdout when done.
    #[arg(long)]
    pub print_metrics: bool,
}

#[derive(Parser, Debug)]
pub struct KeygenArgs {
    /// Where to write the secret key.
    #[arg(long, short = 'o')]
    pub out: PathBuf,

    /// Overwrite an existing file.
    #[arg(long)]
    pub force: bool,
}

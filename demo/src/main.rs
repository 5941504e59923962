// Copyright (c) 2026 BCDB SDK Contributors. Apache-2.0 License.
// See LICENSE for details.

//! # BCDB Demo Client
//!
//! Entry point for the `bcdb-demo` binary.
//!
//! - `run`     : two transactions against a running replica
//! - `keygen`  : write a fresh user key and print its certificate
//! - `version` : print build version information

mod cli;
mod logging;

use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;

use bcdb_sdk::config::{ConnectionOption, Options, SignerOptions, TxOptions};
use bcdb_sdk::crypto::UserKeypair;
use bcdb_sdk::Connector;

use cli::{Commands, DemoCli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DemoCli::parse();
    logging::init_logging("bcdb_demo=info,bcdb_sdk=info", cli.log_format);

    match cli.command {
        Commands::Run(args) => run_demo(args).await,
        Commands::Keygen(args) => keygen(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn build_options(args: &cli::RunArgs) -> Result<Options> {
    if args.key.is_none() && args.key_file.is_none() {
        bail!("a signing key is required: pass --key-file or --key");
    }
    let signer = SignerOptions {
        key_file: args.key_file.clone(),
        key_hex: args.key.clone(),
    };

    let mut connection = ConnectionOption::new(args.replica_id.clone(), args.url.clone());
    if let Some(cert) = &args.node_cert {
        connection = connection.with_certificate(cert.clone());
    }

    Ok(Options::new(args.user.clone(), signer)
        .with_connection(connection)
        .with_tx_options(TxOptions::default().with_request_timeout(Duration::from_millis(args.timeout_ms))))
}

/// Writes `key1`/`key2`, reads them back in a second transaction and
/// stores their concatenation under `key3`.
async fn run_demo(args: cli::RunArgs) -> Result<()> {
    let options = build_options(&args)?;
    let tx_options = options.tx_options.clone();
    let connector = Connector::new(options).context("failed to create connector")?;
    let session = connector
        .open_db_session(args.db.clone(), tx_options)
        .with_context(|| format!("failed to open session on database {}", args.db))?;

    tracing::info!(url = %args.url, db = %args.db, user = %args.user, "starting demo");

    // --- First transaction: two writes ---
    let mut tx = session.begin();
    tx.put("key1", b"val1".to_vec(), None)?;
    tx.put("key2", b"val2".to_vec(), None)?;
    let tx_id = tx.commit().await.context("first transaction failed")?;
    println!("committed tx {}", tx_id);

    let envelope = tx.tx_envelope()?;
    println!(
        "envelope: {}",
        serde_json::to_string_pretty(envelope).context("failed to render envelope")?
    );

    let value = session
        .get("key1")
        .await
        .context("failed to read key1")?;
    println!("key1 = {}", render(value.as_deref()));

    // --- Second transaction: read both, write the combination ---
    let mut tx = session.begin();
    let val1 = tx
        .get("key1")
        .await?
        .context("key1 missing after first commit")?;
    let val2 = tx
        .get("key2")
        .await?
        .context("key2 missing after first commit")?;
    tx.put("key3", [val1, val2].concat(), None)?;
    let tx_id = tx.commit().await.context("second transaction failed")?;
    println!("committed tx {}", tx_id);

    let value = session.get("key3").await.context("failed to read key3")?;
    println!("key3 = {}", render(value.as_deref()));

    if args.print_metrics {
        print!("{}", connector.metrics().encode().context("failed to encode metrics")?);
    }
    Ok(())
}

fn render(value: Option<&[u8]>) -> String {
    match value {
        None => "<absent>".to_string(),
        Some(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => text.to_string(),
            Err(_) => format!("0x{}", hex::encode(bytes)),
        },
    }
}

fn keygen(args: cli::KeygenArgs) -> Result<()> {
    if args.out.exists() && !args.force {
        bail!("{} already exists, pass --force to overwrite", args.out.display());
    }
    let keypair = UserKeypair::generate();
    std::fs::write(&args.out, keypair.secret_key_hex())
        .with_context(|| format!("failed to write key file {}", args.out.display()))?;

    tracing::info!(path = %args.out.display(), "key written");
    println!("{}", keypair.certificate_hex());
    Ok(())
}

fn print_version() {
    println!("bcdb-demo {}", env!("CARGO_PKG_VERSION"));
    println!("  arch: {}", std::env::consts::ARCH);
    println!("  os: {}", std::env::consts::OS);
}

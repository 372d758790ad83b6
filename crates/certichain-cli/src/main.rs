//! # certichain CLI Entry Point
//!
//! Assembles subcommands and dispatches to handler modules.

use anyhow::Context;
use certichain_client::{EvmLedger, LedgerConfig};
use clap::Parser;
use serde::Serialize;

/// CertiChain operator toolchain.
///
/// Hashes credential bundles, reads ledger records, and verifies
/// credentials end to end.
#[derive(Parser, Debug)]
#[command(name = "certichain", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Canonical hash of a bundle file or QR payload.
    Hash(certichain_cli::hash::HashArgs),
    /// Ledger record of a certificate.
    Status(certichain_cli::status::StatusArgs),
    /// Verify a credential against the ledger, content store and signature.
    Verify(certichain_cli::verify::VerifyArgs),
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Hash(args) => print_json(&certichain_cli::hash::run(&args)?),
        Commands::Status(args) => {
            let ledger = EvmLedger::new(LedgerConfig::from_env()?)
                .context("configuring ledger client")?;
            print_json(&certichain_cli::status::run(&args, &ledger).await?)
        }
        Commands::Verify(args) => {
            let state = certichain_cli::verify::state_from_env()?;
            print_json(&certichain_cli::verify::run(&args, &state).await?)
        }
    }
}

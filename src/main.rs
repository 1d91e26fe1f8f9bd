//! Main entry point for the replicated bank.
//!
//! Reads a topology file, starts one branch server per branch, runs every
//! customer's script against them and prints the customers' reports as JSON.

use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bank_replica::config::{Timing, Topology};
use bank_replica::launcher;

#[derive(Parser, Debug)]
#[command(version, about = "Replicated bank branches ordered by write-set tokens")]
struct Cli {
    /// JSON array of branch and customer descriptors
    input: PathBuf,
    /// Write the reports here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Host the branch servers bind on
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    bind_host: IpAddr,
    /// Wait between accepting a write and forwarding it to peers; never zero
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    propagation_delay_ms: u64,
    #[arg(long, default_value_t = 300)]
    retry_interval_ms: u64,
    /// Wait between starting branches and starting customers
    #[arg(long, default_value_t = 1000)]
    settle_ms: u64,
    /// Call branches directly instead of over WebSocket
    #[arg(long)]
    in_process: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let topology = Topology::load(&cli.input)?;
    let timing = Timing {
        propagation_delay: Duration::from_millis(cli.propagation_delay_ms),
        retry_interval: Duration::from_millis(cli.retry_interval_ms),
        settle: Duration::from_millis(cli.settle_ms),
    };

    info!(
        "Starting {} branches and {} customers",
        topology.branches.len(),
        topology.customers.len()
    );

    let result = if cli.in_process {
        launcher::run_in_process(&topology, timing).await?
    } else {
        launcher::run_over_network(&topology, timing, cli.bind_host).await?
    };

    let json = serde_json::to_string_pretty(&result.reports)?;
    match cli.output {
        Some(path) => {
            fs::write(&path, json + "\n")
                .with_context(|| format!("cannot write {}", path.display()))?;
            info!("Reports written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

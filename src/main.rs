mod billing;
mod cli;
mod config;
mod domain;
mod interval;
mod models;
mod reporting;
mod sla;
mod status;
mod storage;
mod uptime;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::config::load_settings;
use crate::reporting::{run_billing_once, run_watch};

#[tokio::main]
async fn main() -> Result<()> {
    initialize_tracing();

    let cli = Cli::parse();
    let settings = load_settings()?;

    if cli.watch {
        return run_watch(&settings, &cli).await;
    }

    let now = cli.now.unwrap_or_else(Utc::now);
    run_billing_once(&settings, &cli, now).await?;
    Ok(())
}

fn initialize_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

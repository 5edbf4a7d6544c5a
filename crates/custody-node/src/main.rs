//! # Custody Node
//!
//! Entry point: see the library docs for the startup sequence and line
//! protocol.

use anyhow::{Context, Result};
use custody_ledger::ports::SystemTimeSource;
use custody_node::{NodeConfig, NodeRuntime};
use custody_telemetry::init_telemetry;
use tokio::io::BufReader;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = NodeConfig::from_env().context("loading configuration")?;
    let _telemetry = init_telemetry(&config.telemetry).context("initializing telemetry")?;

    config
        .validate_for_production()
        .context("configuration is not fit for production")?;

    info!(
        version = custody_ledger::VERSION,
        owner = %config.ledger.owner,
        snapshot = ?config.snapshot_path,
        "Starting custody node"
    );

    let runtime = NodeRuntime::new(&config, SystemTimeSource).await?;
    let mut stdout = tokio::io::stdout();
    let summary = runtime
        .run(BufReader::new(tokio::io::stdin()), &mut stdout)
        .await?;

    let stats = runtime.service().stats().await;
    info!(
        lines = summary.lines,
        accepted = stats.transitions_accepted,
        rejected = stats.requests_rejected,
        "Custody node stopped"
    );
    Ok(())
}

//! Exposure engine CLI
//!
//! Usage:
//!   exposure-engine --ticker SPY --spot 450.25 --chain chain.json
//!   exposure-engine --ticker SPY --spot 450.25 --chain chain.json --tape tape.csv --as-of 2026-10-19T15:30:00Z

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use exposure_engine::{read_chain_file, read_tape_file, EngineConfig, ExposureEngine};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "exposure-engine")]
#[command(about = "Dealer exposure, stability index and max pain for an option chain")]
struct Cli {
    /// Underlying ticker
    #[arg(long)]
    ticker: String,
    /// Spot price of the underlying
    #[arg(long)]
    spot: f64,
    /// Option chain JSON file
    #[arg(long)]
    chain: PathBuf,
    /// Trade tape (.json or .csv) for live open interest
    #[arg(long)]
    tape: Option<PathBuf>,
    /// Evaluation instant (RFC 3339), defaults to now
    #[arg(long)]
    as_of: Option<DateTime<Utc>>,
    /// Configuration file
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "exposure_engine=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {path}"))?,
        None => EngineConfig::default(),
    };
    let engine = ExposureEngine::new(config).context("Invalid engine configuration")?;

    let chain = read_chain_file(&cli.ticker, &cli.chain)
        .with_context(|| format!("Failed to read option chain {}", cli.chain.display()))?;
    let as_of = cli.as_of.unwrap_or_else(Utc::now);
    info!(ticker = %cli.ticker, contracts = chain.len(), %as_of, "Loaded option chain");

    let report = match &cli.tape {
        Some(path) => {
            let tape = read_tape_file(path)
                .with_context(|| format!("Failed to read trade tape {}", path.display()))?;
            let cancel = Arc::new(AtomicBool::new(false));
            let refresh = engine
                .refresh_with_tape(&chain, cli.spot, as_of, tokio_stream::iter(tape), &cancel)
                .await
                .context("Live open interest refresh failed")?;
            refresh.analysis.report(Some(&refresh.live))
        }
        None => engine
            .analyze(&chain, cli.spot, as_of, None)
            .context("Chain analysis failed")?
            .report(None),
    };

    if report.max_pain.is_empty() {
        warn!(ticker = %cli.ticker, "No expirations inside the window");
    }

    let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
    println!("{json}");
    Ok(())
}

//! Batch valuation runner - values every parcel in a CSV and writes the estimates

use anyhow::{bail, Result};
use parcel_valuation::valuation::batch::{read_requests, run_batch, write_rows};
use parcel_valuation::valuation::{AppConfig, Valuator};
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_target(false)
        .init();

    info!("Starting batch valuation");

    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    info!("Configuration loaded");

    // Input path is required; output defaults next to the input
    let mut args = env::args().skip(1);
    let Some(input) = args.next().map(PathBuf::from) else {
        bail!("usage: batch-valuation <input.csv> [output.csv]");
    };
    let output = match args.next() {
        Some(path) => PathBuf::from(path),
        None => input.with_file_name(format!(
            "{}_valuations.csv",
            input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "batch".to_string())
        )),
    };

    // Step 1: Read parcels
    info!("Step 1/3: Reading parcels...");
    let requests = read_requests(&input)?;
    if requests.is_empty() {
        warn!("No parcels to value in {:?}", input);
    }
    info!("✓ Read {} parcels", requests.len());

    // Step 2: Value each parcel
    info!("Step 2/3: Valuing parcels...");
    let valuator = Valuator::from_config(&config)?;
    let (rows, stats) = run_batch(&valuator, &requests).await;
    info!("✓ Valuation complete: {}", stats);

    // Step 3: Write results
    info!("Step 3/3: Writing results...");
    write_rows(&output, &rows)?;
    info!("✓ Results written to {:?}", output);

    Ok(())
}

//! Dipper - Buy-the-dip / Take-profit Trading Bot
//!
//! Buys SOL after a configured 24h drawdown and sells at a fixed profit
//! target via the Jupiter aggregator.

use anyhow::Result;

use dipper::adapters::cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (secrets go here, not in config files)
    dotenvy::dotenv().ok();

    let app = cli::init();
    cli::execute(app).await
}

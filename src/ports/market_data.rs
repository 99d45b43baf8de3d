use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Market data error type
#[derive(Error, Debug, Clone)]
pub enum MarketDataError {
    #[error("Market data source unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Malformed market data response: {0}")]
    MalformedResponse(String),

    #[error("Market data response contained no entries")]
    EmptyResult,
}

/// A single observation of the SOL market
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Spot price in USDC per SOL
    pub price: Decimal,
    /// 24-hour price change in percent, zero when the source omits it
    pub change_24h_pct: Decimal,
    /// When the snapshot was taken
    pub observed_at: DateTime<Utc>,
}

impl MarketSnapshot {
    pub fn new(price: Decimal, change_24h_pct: Decimal) -> Self {
        Self {
            price,
            change_24h_pct,
            observed_at: Utc::now(),
        }
    }
}

/// Market data port trait
///
/// One call, one snapshot. Implementations make a single upstream attempt;
/// retry policy belongs to the polling loop that owns the cadence.
#[async_trait]
pub trait MarketDataPort: Send + Sync {
    async fn fetch_snapshot(&self) -> Result<MarketSnapshot, MarketDataError>;
}

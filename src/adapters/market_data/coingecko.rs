//! CoinGecko Market Data Client
//!
//! Polls the `/coins/markets` endpoint for the SOL spot price and 24h
//! change. One upstream attempt per call; a missing 24h change field is
//! treated as zero rather than an error.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::ports::market_data::{MarketDataError, MarketDataPort, MarketSnapshot};

const DEFAULT_COINGECKO_API: &str = "https://api.coingecko.com/api/v3";

/// CoinGecko client configuration
#[derive(Debug, Clone)]
pub struct CoinGeckoConfig {
    /// Base URL for the CoinGecko API
    pub api_base_url: String,
    /// Coin id to query
    pub coin_id: String,
    /// Quote currency
    pub vs_currency: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for CoinGeckoConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_COINGECKO_API.to_string(),
            coin_id: "solana".to_string(),
            vs_currency: "usd".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// CoinGecko market data client
#[derive(Debug, Clone)]
pub struct CoinGeckoClient {
    config: CoinGeckoConfig,
    http: Client,
}

impl CoinGeckoClient {
    pub fn new() -> Result<Self, MarketDataError> {
        Self::with_config(CoinGeckoConfig::default())
    }

    pub fn with_config(config: CoinGeckoConfig) -> Result<Self, MarketDataError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                MarketDataError::UpstreamUnavailable(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self { config, http })
    }

    async fn fetch_markets(&self) -> Result<Vec<MarketsRow>, MarketDataError> {
        let url = format!("{}/coins/markets", self.config.api_base_url);

        let response = self
            .http
            .get(&url)
            .query(&[
                ("vs_currency", self.config.vs_currency.as_str()),
                ("ids", self.config.coin_id.as_str()),
                ("order", "market_cap_desc"),
                ("per_page", "1"),
                ("page", "1"),
                ("sparkline", "false"),
                ("price_change_percentage", "24h"),
            ])
            .send()
            .await
            .map_err(|e| MarketDataError::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MarketDataError::UpstreamUnavailable(format!(
                "HTTP {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| MarketDataError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl MarketDataPort for CoinGeckoClient {
    async fn fetch_snapshot(&self) -> Result<MarketSnapshot, MarketDataError> {
        let rows = self.fetch_markets().await?;
        snapshot_from_rows(rows)
    }
}

/// One row of the `/coins/markets` response.
///
/// `current_price` arrives as a JSON number or string depending on the
/// deployment; `Decimal`'s deserializer accepts both. The 24h change is
/// nullable and sometimes absent entirely.
#[derive(Debug, Deserialize)]
struct MarketsRow {
    current_price: Decimal,
    #[serde(default)]
    price_change_percentage_24h: Option<Decimal>,
}

fn snapshot_from_rows(rows: Vec<MarketsRow>) -> Result<MarketSnapshot, MarketDataError> {
    let row = rows.into_iter().next().ok_or(MarketDataError::EmptyResult)?;
    Ok(MarketSnapshot::new(
        row.current_price,
        row.price_change_percentage_24h.unwrap_or(Decimal::ZERO),
    ))
}

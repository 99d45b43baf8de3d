//! Configuration Loader
//!
//! Loads and validates configuration from TOML files matching the
//! config/bot.toml structure. Every field has a default so a partial
//! file works; signing credentials are resolved separately because the
//! read-only commands run without them.

use std::fmt;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use thiserror::Error;

use crate::adapters::solana::CredentialSource;
use crate::strategy::StrategyParams;

/// Main configuration structure matching config/bot.toml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub solana: SolanaSection,
    pub trading: TradingSection,
    pub market_data: MarketDataSection,
    pub jupiter: JupiterSection,
    pub engine: EngineSection,
}

/// Solana RPC and signing configuration section
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct SolanaSection {
    /// RPC endpoint (use a private RPC for production)
    pub rpc_url: String,
    /// Path to a JSON keypair file in solana-keygen format
    pub keypair_path: Option<String>,
    /// Base58-encoded secret key, as exported by wallet apps.
    /// Mutually exclusive with keypair_path.
    pub secret_base58: Option<String>,
}

impl Default for SolanaSection {
    fn default() -> Self {
        Self {
            rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
            keypair_path: None,
            secret_base58: None,
        }
    }
}

// Manual Debug: the base58 secret must never appear in logs
impl fmt::Debug for SolanaSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SolanaSection")
            .field("rpc_url", &self.rpc_url)
            .field("keypair_path", &self.keypair_path)
            .field(
                "secret_base58",
                &self.secret_base58.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl SolanaSection {
    /// Get RPC URL with environment variable override
    /// Checks SOLANA_RPC_URL env var first, falls back to config value
    pub fn get_rpc_url(&self) -> String {
        std::env::var("SOLANA_RPC_URL").unwrap_or_else(|_| self.rpc_url.clone())
    }

    /// Resolve the signing credential from config and environment.
    ///
    /// DIPPER_KEYPAIR_PATH and PRIVATE_KEY_B58 env vars override the
    /// config fields. Exactly one source must be set; none or both is
    /// a hard error so a live run never starts on ambiguous keys.
    pub fn credential_source(&self) -> Result<CredentialSource, ConfigError> {
        self.credential_source_opt()?.ok_or_else(|| {
            ConfigError::ValidationError(
                "no signing credentials: set solana.keypair_path or solana.secret_base58 \
                 (or the DIPPER_KEYPAIR_PATH / PRIVATE_KEY_B58 env vars)"
                    .to_string(),
            )
        })
    }

    /// Like [`credential_source`](Self::credential_source) but treats a
    /// fully absent credential as `None` instead of an error. Ambiguity
    /// is still an error.
    pub fn credential_source_opt(&self) -> Result<Option<CredentialSource>, ConfigError> {
        let keypair_path = std::env::var("DIPPER_KEYPAIR_PATH")
            .ok()
            .or_else(|| self.keypair_path.clone());
        let secret = std::env::var("PRIVATE_KEY_B58")
            .ok()
            .or_else(|| self.secret_base58.clone());

        resolve_credentials(keypair_path, secret)
    }
}

fn resolve_credentials(
    keypair_path: Option<String>,
    secret: Option<String>,
) -> Result<Option<CredentialSource>, ConfigError> {
    let keypair_path = keypair_path.filter(|p| !p.trim().is_empty());
    let secret = secret.filter(|s| !s.trim().is_empty());

    match (keypair_path, secret) {
        (Some(path), None) => {
            let expanded = shellexpand::tilde(&path).into_owned();
            Ok(Some(CredentialSource::KeypairFile(PathBuf::from(expanded))))
        }
        (None, Some(secret)) => Ok(Some(CredentialSource::Base58Secret(secret))),
        (Some(_), Some(_)) => Err(ConfigError::ValidationError(
            "both keypair_path and secret_base58 are set; keep exactly one credential source"
                .to_string(),
        )),
        (None, None) => Ok(None),
    }
}

/// Trading strategy configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TradingSection {
    /// 24h drop that triggers a buy, in percent
    pub buy_drop_pct: Decimal,
    /// Gain over entry that triggers a sell, in percent
    pub take_profit_pct: Decimal,
    /// USDC spent per buy
    pub trade_size: Decimal,
    /// Slippage tolerance in basis points (1% = 100 bps)
    pub max_slippage_bps: u16,
    /// Reject quotes whose price impact exceeds this, in percent
    pub max_price_impact_pct: f64,
}

impl Default for TradingSection {
    fn default() -> Self {
        Self {
            buy_drop_pct: dec!(5.0),
            take_profit_pct: dec!(2.0),
            trade_size: dec!(5.0),
            max_slippage_bps: 100,
            max_price_impact_pct: 2.0,
        }
    }
}

/// Market data polling configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarketDataSection {
    /// CoinGecko-compatible API base URL
    pub api_base_url: String,
    /// Seconds between market polls
    pub poll_interval_secs: u64,
}

impl Default for MarketDataSection {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.coingecko.com/api/v3".to_string(),
            poll_interval_secs: 60,
        }
    }
}

/// Jupiter API configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JupiterSection {
    /// Jupiter V6 API base URL
    pub api_base_url: String,
    /// Optional API key for higher rate limits (get from jup.ag)
    pub api_key: Option<String>,
}

impl Default for JupiterSection {
    fn default() -> Self {
        Self {
            api_base_url: "https://quote-api.jup.ag/v6".to_string(),
            api_key: None,
        }
    }
}

impl JupiterSection {
    /// Get API key with environment variable fallback
    /// Checks JUPITER_API_KEY env var if config value is empty/None
    pub fn get_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            if !key.is_empty() {
                return Some(key.clone());
            }
        }
        std::env::var("JUPITER_API_KEY").ok()
    }
}

/// Engine runtime configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Directory for the position and in-flight trade records
    pub data_dir: String,
    /// Seconds to wait for a broadcast transaction to confirm
    pub confirm_timeout_secs: u64,
    /// Simulate executions instead of trading; live trading is opt-in
    pub dry_run: bool,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            confirm_timeout_secs: 60,
            dry_run: true,
        }
    }
}

impl EngineSection {
    /// Data directory with tilde expansion applied
    pub fn expanded_data_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.data_dir).into_owned())
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trading.buy_drop_pct <= Decimal::ZERO {
            return Err(ConfigError::ValidationError(format!(
                "buy_drop_pct must be > 0, got {}",
                self.trading.buy_drop_pct
            )));
        }

        if self.trading.take_profit_pct <= Decimal::ZERO {
            return Err(ConfigError::ValidationError(format!(
                "take_profit_pct must be > 0, got {}",
                self.trading.take_profit_pct
            )));
        }

        if self.trading.trade_size <= Decimal::ZERO {
            return Err(ConfigError::ValidationError(format!(
                "trade_size must be > 0, got {}",
                self.trading.trade_size
            )));
        }

        if self.trading.max_slippage_bps == 0 || self.trading.max_slippage_bps > 10_000 {
            return Err(ConfigError::ValidationError(format!(
                "max_slippage_bps must be 1-10000, got {}",
                self.trading.max_slippage_bps
            )));
        }

        if self.trading.max_price_impact_pct <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "max_price_impact_pct must be > 0, got {}",
                self.trading.max_price_impact_pct
            )));
        }

        if self.market_data.api_base_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "market_data.api_base_url cannot be empty".to_string(),
            ));
        }

        if self.market_data.poll_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "poll_interval_secs must be > 0".to_string(),
            ));
        }

        if self.jupiter.api_base_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "jupiter.api_base_url cannot be empty".to_string(),
            ));
        }

        if self.solana.rpc_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "rpc_url cannot be empty".to_string(),
            ));
        }

        if self.engine.data_dir.is_empty() {
            return Err(ConfigError::ValidationError(
                "data_dir cannot be empty".to_string(),
            ));
        }

        if self.engine.confirm_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "confirm_timeout_secs must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

// Conversion from Config to the strategy parameter set
impl From<&Config> for StrategyParams {
    fn from(config: &Config) -> Self {
        StrategyParams {
            buy_drop_pct: config.trading.buy_drop_pct,
            take_profit_pct: config.trading.take_profit_pct,
            trade_size: config.trading.trade_size,
        }
    }
}

//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - Market Data: CoinGecko spot price polling
//! - Jupiter: DEX aggregator API client
//! - Solana: RPC client and wallet management
//! - CLI: Command-line interface handlers

pub mod cli;
pub mod jupiter;
pub mod market_data;
pub mod solana;

pub use cli::CliApp;
pub use jupiter::JupiterClient;
pub use market_data::CoinGeckoClient;
pub use solana::{SolanaClient, WalletManager};

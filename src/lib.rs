//! Dipper - Buy-the-dip / Take-profit Trading Bot Library
//!
//! Buys SOL with USDC after a configured 24h drawdown and sells the
//! position back at a fixed profit target, swapping through the Jupiter
//! aggregator.
//!
//! # Modules
//!
//! - `domain`: Core business logic (assets, position, persistence, quote guard, tx codec)
//! - `ports`: Trait abstractions (MarketDataPort, SwapApi, Broadcaster, SwapExecutor)
//! - `strategy`: Threshold rules and parameters
//! - `adapters`: External implementations (CoinGecko, Jupiter, Solana, CLI)
//! - `config`: Configuration loading and validation
//! - `application`: Swap pipeline and trading engine

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod strategy;

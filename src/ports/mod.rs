//! Ports Layer - Trait definitions for external dependencies
//!
//! This module defines the interfaces (ports) that adapters must implement.
//! Following hexagonal architecture, these traits abstract:
//! - Market data polling (SOL spot price and 24h change)
//! - Swap execution (quote, build, sign, broadcast, confirm)

pub mod execution;
pub mod market_data;
pub mod mocks;

pub use execution::{
    Broadcaster, ConfirmOutcome, ExecutionError, Quote, SignatureStatus, SwapApi, SwapExecutor,
    SwapOutcome, SwapPayload, SwapRequest, SwapResult,
};
pub use market_data::{MarketDataError, MarketDataPort, MarketSnapshot};

//! Jupiter Adapter
//!
//! Implementation of the quote/swap-build port for the Jupiter DEX
//! aggregator: quote fetching and unsigned-transaction building.

mod client;
mod quote;
mod swap;

pub use client::{JupiterClient, JupiterConfig};
pub use quote::{QuoteRequest, QuoteResponse};
pub use swap::{SwapBuildRequest, SwapBuildResponse};

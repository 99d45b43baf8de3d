//! Market Data Adapters
//!
//! External price sources feeding the strategy loop:
//! - `CoinGeckoClient`: SOL spot price and 24h change from `/coins/markets`

mod coingecko;

pub use coingecko::{CoinGeckoClient, CoinGeckoConfig};

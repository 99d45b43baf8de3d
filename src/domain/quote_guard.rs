//! Quote Guard
//!
//! Sanity checks applied to a routed-swap quote before any transaction is
//! built from it: amounts must be non-empty and price impact must stay
//! inside the configured bound. A quote that fails here aborts the trade
//! attempt without touching the position.

use rust_decimal::Decimal;
use thiserror::Error;

use super::assets::{from_base_units, Asset, TradeDirection};

/// Default maximum price impact percentage
pub const DEFAULT_MAX_PRICE_IMPACT_PCT: f64 = 2.0;

#[derive(Error, Debug, Clone)]
pub enum QuoteGuardError {
    #[error("Quote carries zero input or output amount")]
    EmptyQuote,

    #[error("Price impact {0:.2}% exceeds maximum {1:.2}%")]
    PriceImpactTooHigh(f64, f64),
}

/// The fields of a provider quote the guard and the pipeline care about;
/// everything else in the quote stays opaque route payload.
#[derive(Debug, Clone)]
pub struct QuoteSummary {
    pub direction: TradeDirection,
    /// Input amount in the input asset's base units
    pub in_amount: u64,
    /// Expected output amount in the output asset's base units
    pub out_amount: u64,
    /// Price impact reported by the router, in percent
    pub price_impact_pct: f64,
}

impl QuoteSummary {
    /// Quote-implied SOL price in USDC, regardless of direction.
    ///
    /// Returns zero when either amount is zero; callers validate first.
    pub fn sol_price(&self) -> Decimal {
        let (usdc_units, sol_units) = match self.direction {
            TradeDirection::Buy => (self.in_amount, self.out_amount),
            TradeDirection::Sell => (self.out_amount, self.in_amount),
        };
        if sol_units == 0 {
            return Decimal::ZERO;
        }

        let usdc = from_base_units(usdc_units, Asset::Usdc);
        let sol = from_base_units(sol_units, Asset::Sol);
        usdc / sol
    }
}

/// Pre-trade quote validation thresholds
#[derive(Debug, Clone)]
pub struct QuoteGuard {
    /// Maximum allowed price impact percentage
    pub max_price_impact_pct: f64,
}

impl Default for QuoteGuard {
    fn default() -> Self {
        Self {
            max_price_impact_pct: DEFAULT_MAX_PRICE_IMPACT_PCT,
        }
    }
}

impl QuoteGuard {
    pub fn new(max_price_impact_pct: f64) -> Self {
        Self {
            max_price_impact_pct,
        }
    }

    /// Validate a quote before building a transaction from it
    pub fn check(&self, quote: &QuoteSummary) -> Result<(), QuoteGuardError> {
        if quote.in_amount == 0 || quote.out_amount == 0 {
            return Err(QuoteGuardError::EmptyQuote);
        }

        if quote.price_impact_pct > self.max_price_impact_pct {
            return Err(QuoteGuardError::PriceImpactTooHigh(
                quote.price_impact_pct,
                self.max_price_impact_pct,
            ));
        }

        Ok(())
    }
}

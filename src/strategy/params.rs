//! Strategy Parameters
//!
//! Mutable configuration for the buy-the-dip strategy. Mutated only through
//! the engine's command interface; read by the evaluation tick.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Tunable strategy thresholds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrategyParams {
    /// Buy when the 24h change has dropped by at least this many percent
    pub buy_drop_pct: Decimal,
    /// Sell when price has gained this many percent over the entry
    pub take_profit_pct: Decimal,
    /// USDC spent per buy
    pub trade_size: Decimal,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            buy_drop_pct: dec!(5.0),
            take_profit_pct: dec!(2.0),
            trade_size: dec!(5.0),
        }
    }
}

impl StrategyParams {
    pub fn with_buy_drop_pct(mut self, pct: Decimal) -> Self {
        self.buy_drop_pct = pct;
        self
    }

    pub fn with_take_profit_pct(mut self, pct: Decimal) -> Self {
        self.take_profit_pct = pct;
        self
    }

    pub fn with_trade_size(mut self, size: Decimal) -> Self {
        self.trade_size = size;
        self
    }

    /// Validate parameter ranges
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.buy_drop_pct <= Decimal::ZERO || self.buy_drop_pct > dec!(100) {
            return Err(ParamsError::InvalidBuyDrop(self.buy_drop_pct));
        }
        if self.take_profit_pct <= Decimal::ZERO || self.take_profit_pct > dec!(100) {
            return Err(ParamsError::InvalidTakeProfit(self.take_profit_pct));
        }
        if self.trade_size <= Decimal::ZERO {
            return Err(ParamsError::InvalidTradeSize(self.trade_size));
        }
        Ok(())
    }
}

/// Parameter validation errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParamsError {
    #[error("Invalid buy drop threshold: {0}% (must be 0 < pct <= 100)")]
    InvalidBuyDrop(Decimal),
    #[error("Invalid take profit: {0}% (must be 0 < pct <= 100)")]
    InvalidTakeProfit(Decimal),
    #[error("Invalid trade size: {0} (must be positive)")]
    InvalidTradeSize(Decimal),
}

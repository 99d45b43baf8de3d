//! Strategy Layer - Buy-the-Dip with Take-Profit Exit
//!
//! Implements the threshold strategy driving the engine:
//! - Enter when the 24h change drops past the configured threshold
//! - Exit when price reaches entry * (1 + take_profit_pct/100)
//! - Exactly one position at a time, evaluated once per poll tick
//!
//! The rules are pure functions over `Position` and `StrategyParams`; all
//! side effects live in the application layer.

pub mod params;
pub mod rules;

pub use params::{ParamsError, StrategyParams};
pub use rules::{evaluate, sell_target_price, should_buy, should_sell, TradeSignal};

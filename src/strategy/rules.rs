//! Trigger Rules
//!
//! Pure threshold rules for the buy-the-dip / take-profit strategy. No
//! I/O, no state: one evaluation maps (position, snapshot, params) to at
//! most one trade signal, so every boundary can be pinned down in a unit
//! test.

use rust_decimal::Decimal;

use crate::domain::position::Position;

use super::params::StrategyParams;

/// The trade the current tick calls for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeSignal {
    /// Spend `size` USDC on SOL
    Buy { size: Decimal },
    /// Sell `quantity` SOL for USDC
    Sell { quantity: Decimal },
}

/// Buy when the 24h change is at or below the negative drop threshold
pub fn should_buy(change_24h_pct: Decimal, buy_drop_pct: Decimal) -> bool {
    change_24h_pct <= -buy_drop_pct
}

/// Price at which the take-profit rule fires
pub fn sell_target_price(entry_price: Decimal, take_profit_pct: Decimal) -> Decimal {
    entry_price * (Decimal::ONE + take_profit_pct / Decimal::ONE_HUNDRED)
}

/// Sell when price has reached the target, the boundary included
pub fn should_sell(price: Decimal, entry_price: Decimal, take_profit_pct: Decimal) -> bool {
    price >= sell_target_price(entry_price, take_profit_pct)
}

/// Evaluate one tick of the state machine.
///
/// Flat looks only at the dip trigger, Holding only at the take-profit
/// target. A Holding position with no recorded entry price cannot fire.
pub fn evaluate(
    position: &Position,
    price: Decimal,
    change_24h_pct: Decimal,
    params: &StrategyParams,
) -> Option<TradeSignal> {
    if !position.is_open {
        if should_buy(change_24h_pct, params.buy_drop_pct) {
            return Some(TradeSignal::Buy {
                size: params.trade_size,
            });
        }
        return None;
    }

    match position.entry_price {
        Some(entry) if should_sell(price, entry, params.take_profit_pct) => {
            Some(TradeSignal::Sell {
                quantity: position.entry_quantity,
            })
        }
        _ => None,
    }
}

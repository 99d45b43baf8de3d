use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The engine's belief about current holdings.
///
/// Invariant: `entry_price` and `opened_at` are `Some` exactly when
/// `is_open` is true. The struct is created closed at startup and only ever
/// reset to closed, never destroyed; all mutation goes through the trading
/// engine after a terminal execution result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub is_open: bool,
    pub entry_price: Option<Decimal>,
    pub entry_quantity: Decimal,
    pub opened_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Error)]
pub enum PositionError {
    #[error("Position is already open")]
    AlreadyOpen,
    #[error("Position is not open")]
    NotOpen,
    #[error("Invalid entry quantity: {0}")]
    InvalidQuantity(Decimal),
    #[error("Invalid entry price: {0}")]
    InvalidEntryPrice(Decimal),
}

impl Position {
    /// A closed position with no entry data
    pub fn closed() -> Self {
        Self {
            is_open: false,
            entry_price: None,
            entry_quantity: Decimal::ZERO,
            opened_at: None,
        }
    }

    /// Open the position after a successful buy
    pub fn open(
        &mut self,
        entry_price: Decimal,
        entry_quantity: Decimal,
        opened_at: DateTime<Utc>,
    ) -> Result<(), PositionError> {
        if self.is_open {
            return Err(PositionError::AlreadyOpen);
        }
        if entry_price <= Decimal::ZERO {
            return Err(PositionError::InvalidEntryPrice(entry_price));
        }
        if entry_quantity <= Decimal::ZERO {
            return Err(PositionError::InvalidQuantity(entry_quantity));
        }

        self.is_open = true;
        self.entry_price = Some(entry_price);
        self.entry_quantity = entry_quantity;
        self.opened_at = Some(opened_at);
        Ok(())
    }

    /// Reset to the closed state after a successful sell
    pub fn close(&mut self) -> Result<(), PositionError> {
        if !self.is_open {
            return Err(PositionError::NotOpen);
        }
        self.is_open = false;
        self.entry_price = None;
        self.entry_quantity = Decimal::ZERO;
        self.opened_at = None;
        Ok(())
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_closed_position_has_no_entry_fields() {
        let position = Position::closed();
        assert!(!position.is_open);
        assert!(position.entry_price.is_none());
        assert!(position.opened_at.is_none());
        assert_eq!(position.entry_quantity, Decimal::ZERO);
    }

    #[test]
    fn test_open_sets_entry_fields() {
        let mut position = Position::closed();
        let now = Utc::now();
        position.open(dec!(150.00), dec!(0.033), now).unwrap();

        assert!(position.is_open);
        assert_eq!(position.entry_price, Some(dec!(150.00)));
        assert_eq!(position.entry_quantity, dec!(0.033));
        assert_eq!(position.opened_at, Some(now));
    }

    #[test]
    fn test_open_already_open() {
        let mut position = Position::closed();
        position.open(dec!(100), dec!(1), Utc::now()).unwrap();

        let result = position.open(dec!(101), dec!(1), Utc::now());
        assert!(matches!(result, Err(PositionError::AlreadyOpen)));
    }

    #[test]
    fn test_open_invalid_price() {
        let mut position = Position::closed();
        let result = position.open(Decimal::ZERO, dec!(1), Utc::now());
        assert!(matches!(result, Err(PositionError::InvalidEntryPrice(_))));
        assert!(!position.is_open);
    }

    #[test]
    fn test_open_invalid_quantity() {
        let mut position = Position::closed();
        let result = position.open(dec!(100), dec!(-0.5), Utc::now());
        assert!(matches!(result, Err(PositionError::InvalidQuantity(_))));
        assert!(!position.is_open);
    }

    #[test]
    fn test_close_clears_entry_fields() {
        let mut position = Position::closed();
        position.open(dec!(100), dec!(1), Utc::now()).unwrap();
        position.close().unwrap();

        assert!(!position.is_open);
        assert!(position.entry_price.is_none());
        assert!(position.opened_at.is_none());
        assert_eq!(position.entry_quantity, Decimal::ZERO);
    }

    #[test]
    fn test_close_not_open() {
        let mut position = Position::closed();
        let result = position.close();
        assert!(matches!(result, Err(PositionError::NotOpen)));
    }

    #[test]
    fn test_reopen_after_close() {
        let mut position = Position::closed();
        position.open(dec!(100), dec!(1), Utc::now()).unwrap();
        position.close().unwrap();
        position.open(dec!(90), dec!(2), Utc::now()).unwrap();

        assert!(position.is_open);
        assert_eq!(position.entry_price, Some(dec!(90)));
    }
}

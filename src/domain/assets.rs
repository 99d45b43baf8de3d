//! Traded Asset Pair
//!
//! The bot trades exactly one pair: SOL against USDC. Mints and decimal
//! precision are a hard-coded table, never inferred from provider responses,
//! so amount conversion cannot drift with upstream metadata.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

/// USDC mint on mainnet
pub const USDC_MINT: Pubkey = solana_sdk::pubkey!("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v");

/// Errors from decimal-to-base-unit conversion
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount must be positive, got {0}")]
    NotPositive(Decimal),

    #[error("amount {amount} {symbol} does not fit in u64 base units")]
    Overflow { amount: Decimal, symbol: &'static str },
}

/// One side of the traded pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Asset {
    Sol,
    Usdc,
}

impl Asset {
    /// Mint address of this asset
    pub fn mint(&self) -> Pubkey {
        match self {
            Asset::Sol => spl_token::native_mint::ID,
            Asset::Usdc => USDC_MINT,
        }
    }

    /// Decimal precision of the smallest unit (lamports for SOL, micro-USDC)
    pub fn decimals(&self) -> u32 {
        match self {
            Asset::Sol => 9,
            Asset::Usdc => 6,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Asset::Sol => "SOL",
            Asset::Usdc => "USDC",
        }
    }
}

/// Trade direction for the pair
///
/// A buy spends USDC and receives SOL; a sell is the reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TradeDirection {
    Buy,
    Sell,
}

impl TradeDirection {
    /// Asset spent by this trade
    pub fn input_asset(&self) -> Asset {
        match self {
            TradeDirection::Buy => Asset::Usdc,
            TradeDirection::Sell => Asset::Sol,
        }
    }

    /// Asset received by this trade
    pub fn output_asset(&self) -> Asset {
        match self {
            TradeDirection::Buy => Asset::Sol,
            TradeDirection::Sell => Asset::Usdc,
        }
    }
}

impl std::fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeDirection::Buy => write!(f, "BUY"),
            TradeDirection::Sell => write!(f, "SELL"),
        }
    }
}

/// Convert a decimal amount to the asset's smallest-unit integer.
///
/// Truncates toward zero, so a value carrying more precision than the asset
/// supports loses at most one base unit.
pub fn to_base_units(amount: Decimal, asset: Asset) -> Result<u64, AmountError> {
    if amount <= Decimal::ZERO {
        return Err(AmountError::NotPositive(amount));
    }

    let scale = Decimal::from(10u64.pow(asset.decimals()));
    let scaled = (amount * scale).trunc();

    scaled.to_u64().ok_or(AmountError::Overflow {
        amount,
        symbol: asset.symbol(),
    })
}

/// Convert a smallest-unit integer back to a decimal amount
pub fn from_base_units(units: u64, asset: Asset) -> Decimal {
    Decimal::from_i128_with_scale(units as i128, asset.decimals())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_mint_table_matches_chain_constants() {
        assert_eq!(Asset::Sol.mint(), spl_token::native_mint::ID);
        assert_eq!(
            Asset::Sol.mint().to_string(),
            "So11111111111111111111111111111111111111112"
        );
        assert_eq!(
            Asset::Usdc.mint().to_string(),
            "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"
        );
    }

    #[test]
    fn test_decimals_table() {
        assert_eq!(Asset::Sol.decimals(), 9);
        assert_eq!(Asset::Usdc.decimals(), 6);
    }

    #[test]
    fn test_direction_assets() {
        assert_eq!(TradeDirection::Buy.input_asset(), Asset::Usdc);
        assert_eq!(TradeDirection::Buy.output_asset(), Asset::Sol);
        assert_eq!(TradeDirection::Sell.input_asset(), Asset::Sol);
        assert_eq!(TradeDirection::Sell.output_asset(), Asset::Usdc);
    }

    #[test]
    fn test_to_base_units_sol() {
        assert_eq!(to_base_units(dec!(1), Asset::Sol).unwrap(), 1_000_000_000);
        assert_eq!(to_base_units(dec!(0.5), Asset::Sol).unwrap(), 500_000_000);
        assert_eq!(to_base_units(dec!(0.000000001), Asset::Sol).unwrap(), 1);
    }

    #[test]
    fn test_to_base_units_usdc() {
        assert_eq!(to_base_units(dec!(5), Asset::Usdc).unwrap(), 5_000_000);
        assert_eq!(to_base_units(dec!(12.34), Asset::Usdc).unwrap(), 12_340_000);
    }

    #[test]
    fn test_to_base_units_truncates_excess_precision() {
        // 9 decimal places on a 6-decimal asset: sub-unit tail dropped
        assert_eq!(
            to_base_units(dec!(1.000000999), Asset::Usdc).unwrap(),
            1_000_000
        );
    }

    #[test]
    fn test_to_base_units_rejects_zero_and_negative() {
        assert!(matches!(
            to_base_units(Decimal::ZERO, Asset::Sol),
            Err(AmountError::NotPositive(_))
        ));
        assert!(matches!(
            to_base_units(dec!(-1), Asset::Usdc),
            Err(AmountError::NotPositive(_))
        ));
    }

    #[test]
    fn test_to_base_units_overflow() {
        let huge = Decimal::MAX;
        assert!(matches!(
            to_base_units(huge, Asset::Sol),
            Err(AmountError::Overflow { .. })
        ));
    }

    #[test]
    fn test_from_base_units() {
        assert_eq!(from_base_units(1_000_000_000, Asset::Sol), dec!(1));
        assert_eq!(from_base_units(12_340_000, Asset::Usdc), dec!(12.34));
        assert_eq!(from_base_units(0, Asset::Sol), Decimal::ZERO);
    }

    #[test]
    fn test_round_trip_exact_at_native_precision() {
        for amount in [dec!(0.000001), dec!(1), dec!(5.123456), dec!(150.25)] {
            let units = to_base_units(amount, Asset::Usdc).unwrap();
            assert_eq!(from_base_units(units, Asset::Usdc), amount.normalize());
        }
    }

    #[test]
    fn test_round_trip_within_one_unit() {
        // More precision than the asset carries: round trip loses < 1 base unit
        let amount = dec!(1.0000004567);
        let units = to_base_units(amount, Asset::Sol).unwrap();
        let back = from_base_units(units, Asset::Sol);
        let one_unit = from_base_units(1, Asset::Sol);
        assert!(amount - back < one_unit);
        assert!(back <= amount);
    }
}

//! Domain Layer - Core business logic for the dipper bot
//!
//! This module contains pure domain types and logic with no external
//! service dependencies. All network interactions happen through the
//! ports layer.
//!
//! - `assets`: the SOL/USDC pair, trade direction, base-unit conversion
//! - `position`: the one open position the bot may hold
//! - `quote_guard`: sanity checks applied to every quote before execution
//! - `tx_codec`: legacy/versioned transaction wire decoding
//! - `persistence`: crash recovery for position and in-flight trades

pub mod assets;
pub mod persistence;
pub mod position;
pub mod quote_guard;
pub mod tx_codec;

pub use assets::{from_base_units, to_base_units, AmountError, Asset, TradeDirection, USDC_MINT};
pub use persistence::{
    PendingRecovery, PendingTrade, PersistError, PersistedPosition, PositionRecovery, StateStore,
};
pub use position::{Position, PositionError};
pub use quote_guard::{QuoteGuard, QuoteGuardError, QuoteSummary};
pub use tx_codec::{decode_swap_payload, decode_transaction, TxCodecError};

//! State Persistence
//!
//! Crash recovery module that persists the open position and any in-flight
//! trade to disk, enabling startup reconciliation after unexpected
//! shutdowns. Two files live under the data directory: `position.json`
//! holds the open position (absent when flat), `pending_trade.json` holds a
//! trade that was broadcast but whose outcome was never recorded.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::assets::TradeDirection;

/// File name for the open position
pub const POSITION_FILE: &str = "position.json";

/// File name for an in-flight trade awaiting an outcome
pub const PENDING_TRADE_FILE: &str = "pending_trade.json";

#[derive(Error, Debug, Clone)]
pub enum PersistError {
    #[error("Failed to serialize state: {0}")]
    SerializationError(String),

    #[error("Failed to deserialize state: {0}")]
    DeserializationError(String),

    #[error("Failed to write state file: {0}")]
    WriteError(String),

    #[error("Failed to read state file: {0}")]
    ReadError(String),

    #[error("Failed to delete state file: {0}")]
    DeleteError(String),

    #[error("Failed to create data directory: {0}")]
    DirectoryError(String),
}

/// Persisted open position for crash recovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedPosition {
    /// Price paid per SOL, in USDC
    pub entry_price: Decimal,
    /// SOL quantity held
    pub entry_quantity: Decimal,
    /// When the position was opened
    pub opened_at: DateTime<Utc>,
    /// Signature of the entry trade, when one exists on chain
    pub entry_tx_signature: Option<String>,
    /// True when the position was opened in dry-run mode
    pub simulated: bool,
}

/// A trade that was broadcast but whose terminal outcome was never recorded.
///
/// Written after signing and before broadcast, deleted once the trade is
/// known to have confirmed or failed. Its presence at startup means the
/// process died mid-trade and the chain must be consulted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingTrade {
    /// Transaction signature, base58
    pub signature: String,
    /// Which way the trade goes
    pub direction: TradeDirection,
    /// Input amount in the input asset's display units
    pub input_amount: Decimal,
    /// Output the quote promised, in the output asset's display units
    pub expected_output_amount: Decimal,
    /// SOL price observed when the trade was decided, in USDC
    pub price: Decimal,
    /// When the transaction was submitted
    pub submitted_at: DateTime<Utc>,
}

/// Outcome of loading the position file at startup
#[derive(Debug, Clone)]
pub enum PositionRecovery {
    /// No position on disk
    NoPosition,
    /// Position recovered successfully
    Recovered(PersistedPosition),
    /// Position file unreadable or invalid, manual intervention needed
    Corrupted(String),
}

/// Outcome of loading the pending-trade file at startup
#[derive(Debug, Clone)]
pub enum PendingRecovery {
    /// No trade was in flight
    NoPending,
    /// An in-flight trade record was found
    Found(PendingTrade),
    /// Pending file unreadable or invalid, manual intervention needed
    Corrupted(String),
}

/// Disk-backed store for position and pending-trade state
#[derive(Debug, Clone)]
pub struct StateStore {
    data_dir: PathBuf,
}

impl StateStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn position_path(&self) -> PathBuf {
        self.data_dir.join(POSITION_FILE)
    }

    pub fn pending_path(&self) -> PathBuf {
        self.data_dir.join(PENDING_TRADE_FILE)
    }

    /// Save the open position
    pub fn save_position(&self, position: &PersistedPosition) -> Result<(), PersistError> {
        write_json(&self.position_path(), position)?;
        tracing::info!(
            entry_price = %position.entry_price,
            quantity = %position.entry_quantity,
            simulated = position.simulated,
            "Position saved"
        );
        Ok(())
    }

    /// Load the open position, `None` when flat
    pub fn load_position(&self) -> Result<Option<PersistedPosition>, PersistError> {
        read_json(&self.position_path())
    }

    /// Delete the position file, a no-op when it does not exist
    pub fn clear_position(&self) -> Result<(), PersistError> {
        delete_file(&self.position_path())
    }

    pub fn has_position(&self) -> bool {
        self.position_path().exists()
    }

    /// Load and validate the position file for startup reconciliation
    pub fn recover_position(&self) -> PositionRecovery {
        let path = self.position_path();
        if !path.exists() {
            return PositionRecovery::NoPosition;
        }
        match self.load_position() {
            Ok(Some(position)) => {
                if position.entry_price <= Decimal::ZERO {
                    return PositionRecovery::Corrupted(format!(
                        "non-positive entry price {}",
                        position.entry_price
                    ));
                }
                if position.entry_quantity <= Decimal::ZERO {
                    return PositionRecovery::Corrupted(format!(
                        "non-positive entry quantity {}",
                        position.entry_quantity
                    ));
                }
                PositionRecovery::Recovered(position)
            }
            Ok(None) => PositionRecovery::NoPosition,
            Err(e) => PositionRecovery::Corrupted(e.to_string()),
        }
    }

    /// Record a trade that is about to be broadcast
    pub fn save_pending(&self, trade: &PendingTrade) -> Result<(), PersistError> {
        write_json(&self.pending_path(), trade)?;
        tracing::info!(
            signature = %trade.signature,
            direction = %trade.direction,
            "Pending trade recorded"
        );
        Ok(())
    }

    /// Load the in-flight trade record, `None` when nothing was in flight
    pub fn load_pending(&self) -> Result<Option<PendingTrade>, PersistError> {
        read_json(&self.pending_path())
    }

    /// Delete the pending-trade file, a no-op when it does not exist
    pub fn clear_pending(&self) -> Result<(), PersistError> {
        delete_file(&self.pending_path())
    }

    pub fn has_pending(&self) -> bool {
        self.pending_path().exists()
    }

    /// Load and validate the pending-trade file for startup reconciliation
    pub fn recover_pending(&self) -> PendingRecovery {
        let path = self.pending_path();
        if !path.exists() {
            return PendingRecovery::NoPending;
        }
        match self.load_pending() {
            Ok(Some(trade)) => {
                if trade.signature.is_empty() {
                    return PendingRecovery::Corrupted("empty signature".to_string());
                }
                PendingRecovery::Found(trade)
            }
            Ok(None) => PendingRecovery::NoPending,
            Err(e) => PendingRecovery::Corrupted(e.to_string()),
        }
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| PersistError::DirectoryError(e.to_string()))?;
    }

    let content = serde_json::to_string_pretty(value)
        .map_err(|e| PersistError::SerializationError(e.to_string()))?;

    fs::write(path, content).map_err(|e| PersistError::WriteError(e.to_string()))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, PersistError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path).map_err(|e| PersistError::ReadError(e.to_string()))?;

    if content.trim().is_empty() {
        return Ok(None);
    }

    let value = serde_json::from_str(&content)
        .map_err(|e| PersistError::DeserializationError(e.to_string()))?;

    Ok(Some(value))
}

fn delete_file(path: &Path) -> Result<(), PersistError> {
    if path.exists() {
        fs::remove_file(path).map_err(|e| PersistError::DeleteError(e.to_string()))?;
        tracing::debug!("State file deleted: {}", path.display());
    }
    Ok(())
}

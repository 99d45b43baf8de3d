use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use solana_sdk::transaction::VersionedTransaction;
use thiserror::Error;

use crate::domain::assets::{Asset, TradeDirection};
use crate::domain::quote_guard::QuoteSummary;

/// Execution error taxonomy.
///
/// `Clone` because a failure travels inside the [`SwapResult`] handed back
/// to the strategy loop, which may log it and keep a copy for status
/// reporting.
#[derive(Error, Debug, Clone)]
pub enum ExecutionError {
    #[error("Swap service unavailable: {0}")]
    Upstream(String),

    #[error("No route found for the requested swap")]
    NoRouteFound,

    #[error("Quote rejected: {0}")]
    QuoteRejected(String),

    #[error("Malformed swap service response: {0}")]
    MalformedResponse(String),

    #[error("Malformed transaction payload: {0}")]
    MalformedPayload(String),

    #[error("Unsupported transaction version {0}")]
    UnsupportedTransactionVersion(u8),

    #[error("Transaction signing failed: {0}")]
    SigningFailed(String),

    #[error("Transaction broadcast failed: {0}")]
    BroadcastFailed(String),

    #[error("Transaction failed on chain: {0}")]
    FailedOnChain(String),

    #[error("Confirmation timed out for transaction {signature}")]
    TimedOut { signature: String },

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
}

impl ExecutionError {
    /// Whether a fresh attempt at the same request could plausibly succeed.
    ///
    /// Only pre-commitment upstream hiccups qualify. Anything after a
    /// transaction exists (signing, broadcast, confirmation) is never
    /// retried at this level: resubmitting risks a double fill.
    pub fn is_transient(&self) -> bool {
        matches!(self, ExecutionError::Upstream(_))
    }
}

/// Immutable swap order, constructed once by the execution pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRequest {
    pub direction: TradeDirection,
    pub input_asset: Asset,
    pub output_asset: Asset,
    /// Amount in the input asset's smallest denomination
    pub input_amount: u64,
    pub max_slippage_bps: u16,
}

impl SwapRequest {
    pub fn new(direction: TradeDirection, input_amount: u64, max_slippage_bps: u16) -> Self {
        Self {
            direction,
            input_asset: direction.input_asset(),
            output_asset: direction.output_asset(),
            input_amount,
            max_slippage_bps,
        }
    }
}

/// Provider-agnostic view of a swap quote.
///
/// Only the amount fields are interpreted; the raw provider object is
/// carried untouched so the swap builder receives exactly what the quote
/// endpoint produced.
#[derive(Debug, Clone)]
pub struct Quote {
    pub direction: TradeDirection,
    pub in_amount: u64,
    pub out_amount: u64,
    /// Worst acceptable output after slippage
    pub min_out_amount: u64,
    pub price_impact_pct: f64,
    /// Raw quote object, opaque to everything but the swap builder
    pub raw: serde_json::Value,
}

impl Quote {
    pub fn summary(&self) -> QuoteSummary {
        QuoteSummary {
            direction: self.direction,
            in_amount: self.in_amount,
            out_amount: self.out_amount,
            price_impact_pct: self.price_impact_pct,
        }
    }
}

/// Unsigned swap transaction payload returned by the swap builder
#[derive(Debug, Clone)]
pub struct SwapPayload {
    /// Base64-encoded serialized transaction, legacy or versioned
    pub swap_transaction: String,
    /// Block height after which the transaction can no longer land
    pub last_valid_block_height: u64,
}

/// Quote and swap-build API port.
///
/// One upstream attempt per call; the pipeline owns retry policy.
#[async_trait]
pub trait SwapApi: Send + Sync {
    async fn get_quote(&self, request: &SwapRequest) -> Result<Quote, ExecutionError>;

    async fn build_swap(
        &self,
        quote: &Quote,
        user_public_key: &str,
    ) -> Result<SwapPayload, ExecutionError>;
}

/// Terminal outcome of confirmation polling for one submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Confirmed,
    /// The transaction landed and the runtime rejected it
    FailedOnChain(String),
    /// The deadline passed without a definitive status
    TimedOut,
}

/// Status of a signature when queried outside the confirmation loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureStatus {
    /// The network has no record of the signature
    NotFound,
    /// Seen but not yet at the required commitment
    Pending,
    Confirmed,
    Failed(String),
}

/// Transaction broadcast and confirmation port.
///
/// `submit` sends exactly once and never resubmits. `await_confirmation`
/// polls until a terminal state or the deadline. `signature_status` is the
/// reconciliation query used at startup, optionally searching the full
/// transaction history.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn submit(&self, transaction: &VersionedTransaction) -> Result<String, ExecutionError>;

    async fn await_confirmation(
        &self,
        signature: &str,
        timeout: Duration,
    ) -> Result<ConfirmOutcome, ExecutionError>;

    async fn signature_status(
        &self,
        signature: &str,
        search_history: bool,
    ) -> Result<SignatureStatus, ExecutionError>;
}

/// Terminal classification of one swap attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapOutcome {
    /// Dry-run: the trade was priced but never signed or sent
    Simulated,
    /// The transaction landed and the ledger confirmed it
    Confirmed,
    /// The attempt ended without a confirmed fill
    Failed,
}

/// Result of one pass through the execution pipeline
#[derive(Debug, Clone)]
pub struct SwapResult {
    pub outcome: SwapOutcome,
    /// On-chain signature, present once a transaction was broadcast
    pub transaction_id: Option<String>,
    /// Output received (Confirmed) or promised by the quote (Simulated),
    /// in the output asset's display units
    pub filled_output_amount: Option<Decimal>,
    pub error: Option<ExecutionError>,
}

impl SwapResult {
    pub fn simulated(expected_output: Decimal) -> Self {
        Self {
            outcome: SwapOutcome::Simulated,
            transaction_id: None,
            filled_output_amount: Some(expected_output),
            error: None,
        }
    }

    pub fn confirmed(signature: String, filled_output: Decimal) -> Self {
        Self {
            outcome: SwapOutcome::Confirmed,
            transaction_id: Some(signature),
            filled_output_amount: Some(filled_output),
            error: None,
        }
    }

    pub fn failed(error: ExecutionError) -> Self {
        let transaction_id = match &error {
            ExecutionError::TimedOut { signature } => Some(signature.clone()),
            _ => None,
        };
        Self {
            outcome: SwapOutcome::Failed,
            transaction_id,
            filled_output_amount: None,
            error: Some(error),
        }
    }

    /// Failure for a transaction that reached the chain, keeping its id
    pub fn failed_on_chain(signature: String, error: ExecutionError) -> Self {
        Self {
            outcome: SwapOutcome::Failed,
            transaction_id: Some(signature),
            filled_output_amount: None,
            error: Some(error),
        }
    }

    pub fn is_filled(&self) -> bool {
        matches!(self.outcome, SwapOutcome::Confirmed | SwapOutcome::Simulated)
    }
}

/// Swap execution port trait.
///
/// Takes a direction and an input amount in the input asset's display
/// units, drives the attempt to a terminal state, and reports what
/// happened. Never resubmits a transaction on its own.
#[async_trait]
pub trait SwapExecutor: Send + Sync {
    async fn execute(&self, direction: TradeDirection, input_amount: Decimal) -> SwapResult;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_swap_request_derives_assets() {
        let buy = SwapRequest::new(TradeDirection::Buy, 5_000_000, 100);
        assert_eq!(buy.input_asset, Asset::Usdc);
        assert_eq!(buy.output_asset, Asset::Sol);

        let sell = SwapRequest::new(TradeDirection::Sell, 35_000_000, 100);
        assert_eq!(sell.input_asset, Asset::Sol);
        assert_eq!(sell.output_asset, Asset::Usdc);
    }

    #[test]
    fn test_quote_summary_bridges_fields() {
        let quote = Quote {
            direction: TradeDirection::Buy,
            in_amount: 5_000_000,
            out_amount: 35_000_000,
            min_out_amount: 34_650_000,
            price_impact_pct: 0.4,
            raw: serde_json::json!({}),
        };
        let summary = quote.summary();
        assert_eq!(summary.in_amount, 5_000_000);
        assert_eq!(summary.out_amount, 35_000_000);
        assert_eq!(summary.price_impact_pct, 0.4);
    }

    #[test]
    fn test_simulated_result_carries_expected_output() {
        let result = SwapResult::simulated(dec!(0.35));
        assert_eq!(result.outcome, SwapOutcome::Simulated);
        assert_eq!(result.filled_output_amount, Some(dec!(0.35)));
        assert!(result.transaction_id.is_none());
        assert!(result.error.is_none());
        assert!(result.is_filled());
    }

    #[test]
    fn test_timed_out_failure_keeps_signature() {
        let result = SwapResult::failed(ExecutionError::TimedOut {
            signature: "abc123".to_string(),
        });
        assert_eq!(result.outcome, SwapOutcome::Failed);
        assert_eq!(result.transaction_id.as_deref(), Some("abc123"));
        assert!(!result.is_filled());
    }

    #[test]
    fn test_plain_failure_has_no_signature() {
        let result = SwapResult::failed(ExecutionError::NoRouteFound);
        assert!(result.transaction_id.is_none());
        assert!(matches!(result.error, Some(ExecutionError::NoRouteFound)));
    }

    #[test]
    fn test_transient_classification() {
        assert!(ExecutionError::Upstream("503".to_string()).is_transient());
        assert!(!ExecutionError::NoRouteFound.is_transient());
        assert!(!ExecutionError::SigningFailed("bad key".to_string()).is_transient());
        assert!(!ExecutionError::BroadcastFailed("node down".to_string()).is_transient());
        assert!(!ExecutionError::TimedOut {
            signature: "sig".to_string()
        }
        .is_transient());
    }
}

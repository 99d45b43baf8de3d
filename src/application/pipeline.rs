//! Swap Execution Pipeline
//!
//! Drives a single swap attempt to a terminal state: quote, guard check,
//! transaction build, signing, broadcast, confirmation. Dry-run mode stops
//! the pipeline right after the quote, before anything that could touch
//! the signer. At most one quote retry on a transient upstream failure;
//! nothing after signing is ever retried, since a resubmitted transaction
//! could fill twice.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::adapters::solana::WalletManager;
use crate::domain::quote_guard::DEFAULT_MAX_PRICE_IMPACT_PCT;
use crate::domain::{
    decode_swap_payload, from_base_units, to_base_units, PendingTrade, QuoteGuard, StateStore,
    TradeDirection, TxCodecError,
};
use crate::ports::{
    Broadcaster, ConfirmOutcome, ExecutionError, Quote, SwapApi, SwapExecutor, SwapRequest,
    SwapResult,
};

/// Pipeline knobs, all sourced from configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// When set, stop after the quote: nothing is built, signed, or sent
    pub dry_run: bool,
    /// Slippage tolerance requested from the quote endpoint
    pub max_slippage_bps: u16,
    /// Maximum price impact accepted before a quote is rejected
    pub max_price_impact_pct: f64,
    /// How long to poll for confirmation before the outcome is unknown
    pub confirm_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dry_run: true,
            max_slippage_bps: 100,
            max_price_impact_pct: DEFAULT_MAX_PRICE_IMPACT_PCT,
            confirm_timeout: Duration::from_secs(60),
        }
    }
}

/// End-to-end swap pipeline wired from a quote/build API, a broadcaster,
/// the wallet, and the on-disk state store
pub struct SwapPipeline<A: SwapApi, B: Broadcaster> {
    swap_api: A,
    broadcaster: B,
    wallet: Arc<WalletManager>,
    store: StateStore,
    guard: QuoteGuard,
    config: PipelineConfig,
}

impl<A: SwapApi, B: Broadcaster> SwapPipeline<A, B> {
    pub fn new(
        swap_api: A,
        broadcaster: B,
        wallet: Arc<WalletManager>,
        store: StateStore,
        config: PipelineConfig,
    ) -> Self {
        let guard = QuoteGuard::new(config.max_price_impact_pct);
        Self {
            swap_api,
            broadcaster,
            wallet,
            store,
            guard,
            config,
        }
    }

    /// Fetch a quote, allowing exactly one retry on a transient upstream
    /// failure. All other errors propagate on the first attempt.
    async fn fetch_quote(&self, request: &SwapRequest) -> Result<Quote, ExecutionError> {
        match self.swap_api.get_quote(request).await {
            Ok(quote) => Ok(quote),
            Err(e) if e.is_transient() => {
                warn!(error = %e, "Quote attempt failed, retrying once");
                self.swap_api.get_quote(request).await
            }
            Err(e) => Err(e),
        }
    }

    async fn run_attempt(
        &self,
        direction: TradeDirection,
        input_amount: Decimal,
    ) -> Result<SwapResult, ExecutionError> {
        let input_asset = direction.input_asset();
        let output_asset = direction.output_asset();

        let amount_base = to_base_units(input_amount, input_asset)
            .map_err(|e| ExecutionError::InvalidParameters(e.to_string()))?;

        let request = SwapRequest::new(direction, amount_base, self.config.max_slippage_bps);
        let quote = self.fetch_quote(&request).await?;

        let summary = quote.summary();
        self.guard
            .check(&summary)
            .map_err(|e| ExecutionError::QuoteRejected(e.to_string()))?;

        let expected_output = from_base_units(quote.out_amount, output_asset);

        if self.config.dry_run {
            info!(
                %direction,
                %input_amount,
                %expected_output,
                "Dry run: stopping after quote, no transaction built"
            );
            return Ok(SwapResult::simulated(expected_output));
        }

        let payload = self
            .swap_api
            .build_swap(&quote, &self.wallet.public_key())
            .await?;

        let transaction =
            decode_swap_payload(&payload.swap_transaction).map_err(map_codec_error)?;

        let signed = self
            .wallet
            .sign_transaction(transaction)
            .map_err(|e| ExecutionError::SigningFailed(e.to_string()))?;

        let signature = signed
            .signatures
            .first()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                ExecutionError::SigningFailed("signed transaction has no signature slot".to_string())
            })?;

        // The in-flight record must exist before the network can know
        // about the transaction, or a crash in between loses the trade.
        let pending = PendingTrade {
            signature: signature.clone(),
            direction,
            input_amount,
            expected_output_amount: expected_output,
            price: summary.sol_price(),
            submitted_at: Utc::now(),
        };
        self.store.save_pending(&pending).map_err(|e| {
            ExecutionError::BroadcastFailed(format!(
                "aborting before submit, could not record in-flight trade: {e}"
            ))
        })?;

        if let Err(e) = self.broadcaster.submit(&signed).await {
            // The submit error may be ambiguous (the node can have accepted
            // the transaction before the connection dropped), so the
            // in-flight record stays for startup reconciliation.
            warn!(
                signature = %signature,
                error = %e,
                "Broadcast failed, keeping in-flight record"
            );
            return Ok(SwapResult::failed(e));
        }

        info!(
            signature = %signature,
            %direction,
            last_valid_block_height = payload.last_valid_block_height,
            "Transaction submitted, awaiting confirmation"
        );

        match self
            .broadcaster
            .await_confirmation(&signature, self.config.confirm_timeout)
            .await
        {
            Ok(ConfirmOutcome::Confirmed) => {
                self.clear_pending(&signature);
                info!(
                    signature = %signature,
                    %expected_output,
                    "Swap confirmed"
                );
                Ok(SwapResult::confirmed(signature, expected_output))
            }
            Ok(ConfirmOutcome::FailedOnChain(reason)) => {
                self.clear_pending(&signature);
                warn!(signature = %signature, reason = %reason, "Swap failed on chain");
                Ok(SwapResult::failed_on_chain(
                    signature,
                    ExecutionError::FailedOnChain(reason),
                ))
            }
            Ok(ConfirmOutcome::TimedOut) => {
                // Outcome unknown: the record stays so the next startup can
                // reconcile against the chain.
                warn!(signature = %signature, "Confirmation timed out, outcome unknown");
                Ok(SwapResult::failed(ExecutionError::TimedOut { signature }))
            }
            Err(e) => {
                warn!(
                    signature = %signature,
                    error = %e,
                    "Confirmation polling failed, outcome unknown"
                );
                Ok(SwapResult::failed_on_chain(signature, e))
            }
        }
    }

    fn clear_pending(&self, signature: &str) {
        if let Err(e) = self.store.clear_pending() {
            warn!(signature = %signature, error = %e, "Failed to clear in-flight record");
        }
    }
}

fn map_codec_error(error: TxCodecError) -> ExecutionError {
    match error {
        TxCodecError::UnsupportedVersion(v) => ExecutionError::UnsupportedTransactionVersion(v),
        other => ExecutionError::MalformedPayload(other.to_string()),
    }
}

#[async_trait]
impl<A: SwapApi, B: Broadcaster> SwapExecutor for SwapPipeline<A, B> {
    async fn execute(&self, direction: TradeDirection, input_amount: Decimal) -> SwapResult {
        match self.run_attempt(direction, input_amount).await {
            Ok(result) => result,
            Err(e) => SwapResult::failed(e),
        }
    }
}

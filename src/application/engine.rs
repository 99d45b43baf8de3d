//! Trading Engine
//!
//! The poll-evaluate-execute loop plus the manual command surface. A
//! single async lock guards strategy state and stays held across an
//! execution, so at most one trade is ever in flight and manual commands
//! serialize behind a running tick. Before the first tick the engine
//! reconciles its on-disk state against the chain, resolving any trade
//! that was in flight when the previous process died.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, Notify};
use tracing::{error, info, warn};

use crate::domain::{
    PendingRecovery, PendingTrade, PersistError, PersistedPosition, Position, PositionError,
    PositionRecovery, StateStore, TradeDirection,
};
use crate::ports::{
    Broadcaster, ConfirmOutcome, MarketDataError, MarketDataPort, SignatureStatus, SwapExecutor,
    SwapOutcome, SwapResult,
};
use crate::strategy::{rules, ParamsError, StrategyParams, TradeSignal};

/// Wall-clock bound after which an unfound transaction can no longer
/// land: blockhash validity is roughly 60-90 seconds, well inside this.
const PENDING_EXPIRY_SECS: i64 = 150;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Market data error: {0}")]
    MarketData(#[from] MarketDataError),

    #[error("Invalid strategy parameters: {0}")]
    InvalidParams(#[from] ParamsError),

    #[error("Position state error: {0}")]
    Position(#[from] PositionError),

    #[error("State persistence error: {0}")]
    Persistence(#[from] PersistError),

    #[error("A position is already open")]
    PositionAlreadyOpen,

    #[error("No position is open")]
    NoPositionOpen,

    #[error("Startup reconciliation failed: {0}")]
    Reconciliation(String),
}

/// Engine-level knobs, sourced from configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Time between market polls
    pub poll_interval: Duration,
    /// Confirmation window granted to a recovered in-flight trade
    pub confirm_timeout: Duration,
    /// Whether executions are simulated; must match the pipeline's setting
    pub dry_run: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            confirm_timeout: Duration::from_secs(60),
            dry_run: true,
        }
    }
}

/// Mutable strategy state, all behind one lock
#[derive(Debug)]
struct EngineState {
    position: Position,
    params: StrategyParams,
    last_price: Option<Decimal>,
    last_error: Option<String>,
}

/// Point-in-time view of the engine for status reporting
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub is_running: bool,
    pub dry_run: bool,
    pub position_open: bool,
    pub entry_price: Option<Decimal>,
    pub entry_quantity: Option<Decimal>,
    pub sell_target_price: Option<Decimal>,
    pub last_price: Option<Decimal>,
    pub buy_drop_pct: Decimal,
    pub take_profit_pct: Decimal,
    pub trade_size: Decimal,
    pub last_error: Option<String>,
}

/// Buy-low/sell-high trading engine over abstract market data and
/// execution ports
pub struct TradingEngine {
    market: Arc<dyn MarketDataPort>,
    executor: Arc<dyn SwapExecutor>,
    broadcaster: Arc<dyn Broadcaster>,
    store: StateStore,
    config: EngineConfig,
    state: Mutex<EngineState>,
    is_running: AtomicBool,
    shutdown: Notify,
}

impl TradingEngine {
    pub fn new(
        market: Arc<dyn MarketDataPort>,
        executor: Arc<dyn SwapExecutor>,
        broadcaster: Arc<dyn Broadcaster>,
        store: StateStore,
        params: StrategyParams,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        params.validate()?;

        Ok(Self {
            market,
            executor,
            broadcaster,
            store,
            config,
            state: Mutex::new(EngineState {
                position: Position::closed(),
                params,
                last_price: None,
                last_error: None,
            }),
            is_running: AtomicBool::new(false),
            shutdown: Notify::new(),
        })
    }

    /// Run the poll loop until [`stop`](Self::stop) is called.
    ///
    /// Reconciles disk and chain state first; a tick failure is logged
    /// and the loop keeps going.
    pub async fn run(&self) -> Result<(), EngineError> {
        self.reconcile().await?;

        self.is_running.store(true, Ordering::SeqCst);
        info!(
            dry_run = self.config.dry_run,
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "Trading engine started"
        );

        while self.is_running.load(Ordering::SeqCst) {
            if let Err(e) = self.tick().await {
                error!(error = %e, "Tick failed, continuing");
                self.state.lock().await.last_error = Some(e.to_string());
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = self.shutdown.notified() => {}
            }
        }

        info!("Trading engine stopped");
        Ok(())
    }

    /// Request a stop. An execution already in flight completes first;
    /// only the inter-poll sleep is interrupted.
    pub fn stop(&self) {
        self.is_running.store(false, Ordering::SeqCst);
        self.shutdown.notify_one();
        info!("Stop requested");
    }

    /// One pass of the strategy: fetch a snapshot, evaluate the rules,
    /// execute at most one trade.
    pub async fn tick(&self) -> Result<(), EngineError> {
        let snapshot = self.market.fetch_snapshot().await?;

        let mut state = self.state.lock().await;
        state.last_price = Some(snapshot.price);

        match rules::evaluate(
            &state.position,
            snapshot.price,
            snapshot.change_24h_pct,
            &state.params,
        ) {
            Some(TradeSignal::Buy { size }) => {
                self.execute_buy(&mut state, size, snapshot.price).await?;
            }
            Some(TradeSignal::Sell { quantity }) => {
                self.execute_sell(&mut state, quantity, snapshot.price)
                    .await?;
            }
            None => {
                if state.position.is_open {
                    let target = state
                        .position
                        .entry_price
                        .map(|entry| rules::sell_target_price(entry, state.params.take_profit_pct));
                    info!(
                        price = %snapshot.price,
                        change_24h_pct = %snapshot.change_24h_pct,
                        target = ?target,
                        "Holding, take-profit target not reached"
                    );
                } else {
                    let threshold = -state.params.buy_drop_pct;
                    info!(
                        price = %snapshot.price,
                        change_24h_pct = %snapshot.change_24h_pct,
                        %threshold,
                        "Flat, dip threshold not reached"
                    );
                }
            }
        }

        Ok(())
    }

    async fn execute_buy(
        &self,
        state: &mut EngineState,
        size: Decimal,
        price: Decimal,
    ) -> Result<SwapResult, EngineError> {
        info!(%size, %price, "Buying");
        let result = self.executor.execute(TradeDirection::Buy, size).await;

        match result.outcome {
            SwapOutcome::Simulated | SwapOutcome::Confirmed => {
                let quantity = result.filled_output_amount.unwrap_or(Decimal::ZERO);
                let opened_at = Utc::now();
                state.position.open(price, quantity, opened_at)?;

                let persisted = PersistedPosition {
                    entry_price: price,
                    entry_quantity: quantity,
                    opened_at,
                    entry_tx_signature: result.transaction_id.clone(),
                    simulated: result.outcome == SwapOutcome::Simulated,
                };
                self.store.save_position(&persisted)?;
                state.last_error = None;

                info!(
                    entry_price = %price,
                    quantity = %quantity,
                    simulated = persisted.simulated,
                    "Position opened"
                );
            }
            SwapOutcome::Failed => {
                let reason = result
                    .error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown execution failure".to_string());
                warn!(reason = %reason, "Buy failed, staying flat");
                state.last_error = Some(reason);
            }
        }

        Ok(result)
    }

    async fn execute_sell(
        &self,
        state: &mut EngineState,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<SwapResult, EngineError> {
        info!(%quantity, %price, "Selling");
        let result = self.executor.execute(TradeDirection::Sell, quantity).await;

        match result.outcome {
            SwapOutcome::Simulated | SwapOutcome::Confirmed => {
                state.position.close()?;
                self.store.clear_position()?;
                state.last_error = None;

                let proceeds = result.filled_output_amount.unwrap_or(Decimal::ZERO);
                info!(%proceeds, exit_price = %price, "Position closed");
            }
            SwapOutcome::Failed => {
                // The position stays open; the next tick retries the sell
                // if the target still holds.
                let reason = result
                    .error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown execution failure".to_string());
                warn!(reason = %reason, "Sell failed, still holding");
                state.last_error = Some(reason);
            }
        }

        Ok(result)
    }

    /// Buy now at the current market price, outside the dip rule.
    /// `size` falls back to the configured trade size.
    pub async fn manual_buy(&self, size: Option<Decimal>) -> Result<SwapResult, EngineError> {
        let mut state = self.state.lock().await;
        if state.position.is_open {
            return Err(EngineError::PositionAlreadyOpen);
        }

        let size = size.unwrap_or(state.params.trade_size);
        if size <= Decimal::ZERO {
            return Err(EngineError::InvalidParams(ParamsError::InvalidTradeSize(
                size,
            )));
        }

        let snapshot = self.market.fetch_snapshot().await?;
        state.last_price = Some(snapshot.price);
        self.execute_buy(&mut state, size, snapshot.price).await
    }

    /// Sell the whole open position now, outside the take-profit rule
    pub async fn manual_sell(&self) -> Result<SwapResult, EngineError> {
        let mut state = self.state.lock().await;
        if !state.position.is_open {
            return Err(EngineError::NoPositionOpen);
        }

        let quantity = state.position.entry_quantity;
        let snapshot = self.market.fetch_snapshot().await?;
        state.last_price = Some(snapshot.price);
        self.execute_sell(&mut state, quantity, snapshot.price).await
    }

    pub async fn set_buy_drop_pct(&self, pct: Decimal) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        let updated = state.params.clone().with_buy_drop_pct(pct);
        updated.validate()?;
        state.params = updated;
        info!(%pct, "Buy drop threshold updated");
        Ok(())
    }

    pub async fn set_take_profit_pct(&self, pct: Decimal) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        let updated = state.params.clone().with_take_profit_pct(pct);
        updated.validate()?;
        state.params = updated;
        info!(%pct, "Take profit threshold updated");
        Ok(())
    }

    pub async fn set_trade_size(&self, size: Decimal) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        let updated = state.params.clone().with_trade_size(size);
        updated.validate()?;
        state.params = updated;
        info!(%size, "Trade size updated");
        Ok(())
    }

    pub async fn status(&self) -> EngineStatus {
        let state = self.state.lock().await;
        EngineStatus {
            is_running: self.is_running.load(Ordering::SeqCst),
            dry_run: self.config.dry_run,
            position_open: state.position.is_open,
            entry_price: state.position.entry_price,
            entry_quantity: state
                .position
                .is_open
                .then_some(state.position.entry_quantity),
            sell_target_price: state
                .position
                .entry_price
                .map(|entry| rules::sell_target_price(entry, state.params.take_profit_pct)),
            last_price: state.last_price,
            buy_drop_pct: state.params.buy_drop_pct,
            take_profit_pct: state.params.take_profit_pct,
            trade_size: state.params.trade_size,
            last_error: state.last_error.clone(),
        }
    }

    /// Bring in-memory state in line with disk and chain before trading
    pub async fn reconcile(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        let restored = self.restore_position(&mut state)?;
        self.resolve_pending(&mut state, restored.as_ref()).await
    }

    fn restore_position(
        &self,
        state: &mut EngineState,
    ) -> Result<Option<PersistedPosition>, EngineError> {
        match self.store.recover_position() {
            PositionRecovery::NoPosition => Ok(None),
            PositionRecovery::Corrupted(reason) => Err(EngineError::Reconciliation(format!(
                "position file corrupted: {reason}; inspect or remove it before restarting"
            ))),
            PositionRecovery::Recovered(saved) => {
                if saved.simulated && !self.config.dry_run {
                    warn!(
                        entry_price = %saved.entry_price,
                        "Discarding simulated position in live mode"
                    );
                    self.store.clear_position()?;
                    return Ok(None);
                }
                if !saved.simulated && self.config.dry_run {
                    // A real position must not be shadow-traded: the sell
                    // that closes it would never reach the chain.
                    return Err(EngineError::Reconciliation(
                        "live position on disk but dry-run mode requested; \
                         start live or clear the data directory"
                            .to_string(),
                    ));
                }

                state
                    .position
                    .open(saved.entry_price, saved.entry_quantity, saved.opened_at)?;
                info!(
                    entry_price = %saved.entry_price,
                    quantity = %saved.entry_quantity,
                    simulated = saved.simulated,
                    "Position restored from disk"
                );
                Ok(Some(saved))
            }
        }
    }

    async fn resolve_pending(
        &self,
        state: &mut EngineState,
        restored: Option<&PersistedPosition>,
    ) -> Result<(), EngineError> {
        let trade = match self.store.recover_pending() {
            PendingRecovery::NoPending => return Ok(()),
            PendingRecovery::Corrupted(reason) => {
                return Err(EngineError::Reconciliation(format!(
                    "pending-trade file corrupted: {reason}; resolve manually before restarting"
                )))
            }
            PendingRecovery::Found(trade) => trade,
        };

        info!(
            signature = %trade.signature,
            direction = %trade.direction,
            "Found in-flight trade from a previous run, querying the chain"
        );

        let status = self
            .broadcaster
            .signature_status(&trade.signature, true)
            .await
            .map_err(|e| {
                EngineError::Reconciliation(format!(
                    "cannot query in-flight trade {}: {e}",
                    trade.signature
                ))
            })?;

        match status {
            SignatureStatus::Confirmed => {
                self.apply_recovered_trade(state, &trade, restored)?;
                self.store.clear_pending()?;
                Ok(())
            }
            SignatureStatus::Failed(reason) => {
                warn!(
                    signature = %trade.signature,
                    reason = %reason,
                    "In-flight trade failed on chain, discarding record"
                );
                self.store.clear_pending()?;
                Ok(())
            }
            SignatureStatus::NotFound if past_landing_horizon(&trade) => {
                warn!(
                    signature = %trade.signature,
                    "In-flight trade never landed and can no longer land, discarding record"
                );
                self.store.clear_pending()?;
                Ok(())
            }
            SignatureStatus::NotFound | SignatureStatus::Pending => {
                // Recent enough that it could still land: give it the
                // normal confirmation window.
                info!(signature = %trade.signature, "In-flight trade may still land, polling");
                match self
                    .broadcaster
                    .await_confirmation(&trade.signature, self.config.confirm_timeout)
                    .await
                {
                    Ok(ConfirmOutcome::Confirmed) => {
                        self.apply_recovered_trade(state, &trade, restored)?;
                        self.store.clear_pending()?;
                        Ok(())
                    }
                    Ok(ConfirmOutcome::FailedOnChain(reason)) => {
                        warn!(
                            signature = %trade.signature,
                            reason = %reason,
                            "In-flight trade failed on chain, discarding record"
                        );
                        self.store.clear_pending()?;
                        Ok(())
                    }
                    Ok(ConfirmOutcome::TimedOut) if past_landing_horizon(&trade) => {
                        warn!(
                            signature = %trade.signature,
                            "In-flight trade expired while polling, discarding record"
                        );
                        self.store.clear_pending()?;
                        Ok(())
                    }
                    Ok(ConfirmOutcome::TimedOut) => Err(EngineError::Reconciliation(format!(
                        "in-flight trade {} is still unresolved; retry startup shortly",
                        trade.signature
                    ))),
                    Err(e) => Err(EngineError::Reconciliation(format!(
                        "cannot resolve in-flight trade {}: {e}",
                        trade.signature
                    ))),
                }
            }
        }
    }

    /// Fold a confirmed-but-unrecorded trade into the position state
    fn apply_recovered_trade(
        &self,
        state: &mut EngineState,
        trade: &PendingTrade,
        restored: Option<&PersistedPosition>,
    ) -> Result<(), EngineError> {
        match trade.direction {
            TradeDirection::Buy => {
                if self.config.dry_run {
                    // Applying it would put a real position into a
                    // session that can never sell it.
                    return Err(EngineError::Reconciliation(format!(
                        "in-flight buy {} confirmed on chain but dry-run mode requested; \
                         start live or clear the data directory",
                        trade.signature
                    )));
                }

                // The crash may have come after the position file was
                // written; the same signature means the same trade.
                if let Some(saved) = restored {
                    if saved.entry_tx_signature.as_deref() == Some(trade.signature.as_str()) {
                        info!(
                            signature = %trade.signature,
                            "Confirmed in-flight buy already recorded in the position file"
                        );
                        return Ok(());
                    }
                }
                if state.position.is_open {
                    return Err(EngineError::Reconciliation(format!(
                        "confirmed in-flight buy {} conflicts with an existing position; \
                         resolve manually",
                        trade.signature
                    )));
                }

                state
                    .position
                    .open(trade.price, trade.expected_output_amount, trade.submitted_at)?;
                let persisted = PersistedPosition {
                    entry_price: trade.price,
                    entry_quantity: trade.expected_output_amount,
                    opened_at: trade.submitted_at,
                    entry_tx_signature: Some(trade.signature.clone()),
                    simulated: false,
                };
                self.store.save_position(&persisted)?;
                info!(
                    signature = %trade.signature,
                    entry_price = %trade.price,
                    quantity = %trade.expected_output_amount,
                    "Recovered confirmed buy into the position"
                );
                Ok(())
            }
            TradeDirection::Sell => {
                if state.position.is_open {
                    state.position.close()?;
                }
                self.store.clear_position()?;
                info!(
                    signature = %trade.signature,
                    proceeds = %trade.expected_output_amount,
                    "Recovered confirmed sell, position closed"
                );
                Ok(())
            }
        }
    }
}

fn past_landing_horizon(trade: &PendingTrade) -> bool {
    Utc::now() - trade.submitted_at > ChronoDuration::seconds(PENDING_EXPIRY_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::mocks::{MockBroadcaster, MockMarketData, MockSwapExecutor};
    use crate::ports::ExecutionError;
    use rust_decimal_macros::dec;
    use tempfile::{tempdir, TempDir};

    fn dry_config() -> EngineConfig {
        EngineConfig {
            poll_interval: Duration::from_millis(10),
            confirm_timeout: Duration::from_millis(50),
            dry_run: true,
        }
    }

    fn live_config() -> EngineConfig {
        EngineConfig {
            dry_run: false,
            ..dry_config()
        }
    }

    fn new_store() -> (TempDir, StateStore) {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path());
        (dir, store)
    }

    fn engine(
        market: MockMarketData,
        executor: MockSwapExecutor,
        broadcaster: MockBroadcaster,
        store: StateStore,
        config: EngineConfig,
    ) -> TradingEngine {
        TradingEngine::new(
            Arc::new(market),
            Arc::new(executor),
            Arc::new(broadcaster),
            store,
            StrategyParams::default(),
            config,
        )
        .unwrap()
    }

    fn live_position(signature: &str) -> PersistedPosition {
        PersistedPosition {
            entry_price: dec!(150.00),
            entry_quantity: dec!(0.033),
            opened_at: Utc::now(),
            entry_tx_signature: Some(signature.to_string()),
            simulated: false,
        }
    }

    fn pending_buy(signature: &str, age_secs: i64) -> PendingTrade {
        PendingTrade {
            signature: signature.to_string(),
            direction: TradeDirection::Buy,
            input_amount: dec!(5),
            expected_output_amount: dec!(0.033),
            price: dec!(150.00),
            submitted_at: Utc::now() - ChronoDuration::seconds(age_secs),
        }
    }

    #[tokio::test]
    async fn test_new_engine_starts_flat() {
        let (_dir, store) = new_store();
        let e = engine(
            MockMarketData::new(),
            MockSwapExecutor::new(),
            MockBroadcaster::new(),
            store,
            dry_config(),
        );

        let status = e.status().await;
        assert!(!status.is_running);
        assert!(!status.position_open);
        assert!(status.entry_price.is_none());
        assert_eq!(status.buy_drop_pct, dec!(5.0));
        assert_eq!(status.take_profit_pct, dec!(2.0));
        assert_eq!(status.trade_size, dec!(5.0));
    }

    #[tokio::test]
    async fn test_invalid_params_rejected_at_construction() {
        let (_dir, store) = new_store();
        let result = TradingEngine::new(
            Arc::new(MockMarketData::new()),
            Arc::new(MockSwapExecutor::new()),
            Arc::new(MockBroadcaster::new()),
            store,
            StrategyParams::default().with_buy_drop_pct(dec!(0)),
            dry_config(),
        );
        assert!(matches!(result, Err(EngineError::InvalidParams(_))));
    }

    #[tokio::test]
    async fn test_tick_dip_buys_and_opens_position() {
        let (_dir, store) = new_store();
        let market = MockMarketData::new().with_snapshot(dec!(150.00), dec!(-6.0));
        let executor = MockSwapExecutor::new().with_result(SwapResult::simulated(dec!(0.033)));

        let e = engine(
            market,
            executor.clone(),
            MockBroadcaster::new(),
            store.clone(),
            dry_config(),
        );
        e.tick().await.unwrap();

        let status = e.status().await;
        assert!(status.position_open);
        assert_eq!(status.entry_price, Some(dec!(150.00)));
        assert_eq!(status.entry_quantity, Some(dec!(0.033)));
        assert_eq!(status.last_price, Some(dec!(150.00)));
        assert_eq!(executor.get_calls(), vec![(TradeDirection::Buy, dec!(5.0))]);

        let saved = store.load_position().unwrap().unwrap();
        assert_eq!(saved.entry_price, dec!(150.00));
        assert!(saved.simulated);
    }

    #[tokio::test]
    async fn test_tick_above_threshold_stays_flat() {
        let (_dir, store) = new_store();
        let market = MockMarketData::new().with_snapshot(dec!(150.00), dec!(-4.99));
        let executor = MockSwapExecutor::new();

        let e = engine(
            market,
            executor.clone(),
            MockBroadcaster::new(),
            store.clone(),
            dry_config(),
        );
        e.tick().await.unwrap();

        assert!(!e.status().await.position_open);
        assert_eq!(executor.call_count(), 0);
        assert!(!store.has_position());
    }

    #[tokio::test]
    async fn test_sell_fires_at_target_boundary_not_below() {
        let (_dir, store) = new_store();
        // Buy at 100, then see 101.99 (hold) and 102.00 (sell)
        let market = MockMarketData::new()
            .with_snapshot(dec!(100.00), dec!(-6.0))
            .with_snapshot(dec!(101.99), dec!(0.5))
            .with_snapshot(dec!(102.00), dec!(0.5));
        let executor = MockSwapExecutor::new()
            .with_result(SwapResult::simulated(dec!(0.05)))
            .with_result(SwapResult::simulated(dec!(5.1)));

        let e = engine(
            market,
            executor.clone(),
            MockBroadcaster::new(),
            store.clone(),
            dry_config(),
        );

        e.tick().await.unwrap();
        assert!(e.status().await.position_open);
        assert_eq!(e.status().await.sell_target_price, Some(dec!(102.0000)));

        e.tick().await.unwrap();
        assert!(e.status().await.position_open);
        assert_eq!(executor.call_count(), 1);

        e.tick().await.unwrap();
        assert!(!e.status().await.position_open);
        assert_eq!(
            executor.get_calls()[1],
            (TradeDirection::Sell, dec!(0.05))
        );
        assert!(!store.has_position());
    }

    #[tokio::test]
    async fn test_failed_buy_is_side_effect_free() {
        let (_dir, store) = new_store();
        let market = MockMarketData::new().with_snapshot(dec!(150.00), dec!(-6.0));
        let executor =
            MockSwapExecutor::new().with_result(SwapResult::failed(ExecutionError::NoRouteFound));

        let e = engine(
            market,
            executor,
            MockBroadcaster::new(),
            store.clone(),
            dry_config(),
        );
        e.tick().await.unwrap();

        let status = e.status().await;
        assert!(!status.position_open);
        assert!(status.last_error.is_some());
        assert!(!store.has_position());
    }

    #[tokio::test]
    async fn test_failed_sell_keeps_holding() {
        let (_dir, store) = new_store();
        let market = MockMarketData::new()
            .with_snapshot(dec!(100.00), dec!(-6.0))
            .with_snapshot(dec!(103.00), dec!(1.0));
        let executor = MockSwapExecutor::new()
            .with_result(SwapResult::simulated(dec!(0.05)))
            .with_result(SwapResult::failed(ExecutionError::Upstream(
                "503".to_string(),
            )));

        let e = engine(
            market,
            executor,
            MockBroadcaster::new(),
            store.clone(),
            dry_config(),
        );
        e.tick().await.unwrap();
        e.tick().await.unwrap();

        let status = e.status().await;
        assert!(status.position_open);
        assert_eq!(status.entry_price, Some(dec!(100.00)));
        assert!(status.last_error.is_some());
        assert!(store.has_position());
    }

    #[tokio::test]
    async fn test_market_error_propagates_without_state_change() {
        let (_dir, store) = new_store();
        let market = MockMarketData::new().with_error(MarketDataError::EmptyResult);

        let e = engine(
            market,
            MockSwapExecutor::new(),
            MockBroadcaster::new(),
            store,
            dry_config(),
        );
        let result = e.tick().await;

        assert!(matches!(result, Err(EngineError::MarketData(_))));
        assert!(!e.status().await.position_open);
    }

    #[tokio::test]
    async fn test_param_updates_validated() {
        let (_dir, store) = new_store();
        let e = engine(
            MockMarketData::new(),
            MockSwapExecutor::new(),
            MockBroadcaster::new(),
            store,
            dry_config(),
        );

        assert!(matches!(
            e.set_buy_drop_pct(dec!(0)).await,
            Err(EngineError::InvalidParams(_))
        ));
        assert!(matches!(
            e.set_take_profit_pct(dec!(150)).await,
            Err(EngineError::InvalidParams(_))
        ));

        e.set_buy_drop_pct(dec!(3.5)).await.unwrap();
        e.set_take_profit_pct(dec!(1.0)).await.unwrap();
        e.set_trade_size(dec!(25)).await.unwrap();

        let status = e.status().await;
        assert_eq!(status.buy_drop_pct, dec!(3.5));
        assert_eq!(status.take_profit_pct, dec!(1.0));
        assert_eq!(status.trade_size, dec!(25));
    }

    #[tokio::test]
    async fn test_manual_buy_rejected_while_holding() {
        let (_dir, store) = new_store();
        let market = MockMarketData::new().with_snapshot(dec!(100.00), dec!(-6.0));
        let executor = MockSwapExecutor::new().with_result(SwapResult::simulated(dec!(0.05)));

        let e = engine(market, executor, MockBroadcaster::new(), store, dry_config());
        e.tick().await.unwrap();

        let result = e.manual_buy(None).await;
        assert!(matches!(result, Err(EngineError::PositionAlreadyOpen)));
    }

    #[tokio::test]
    async fn test_manual_sell_rejected_while_flat() {
        let (_dir, store) = new_store();
        let e = engine(
            MockMarketData::new(),
            MockSwapExecutor::new(),
            MockBroadcaster::new(),
            store,
            dry_config(),
        );

        let result = e.manual_sell().await;
        assert!(matches!(result, Err(EngineError::NoPositionOpen)));
    }

    #[tokio::test]
    async fn test_manual_buy_uses_configured_size_by_default() {
        let (_dir, store) = new_store();
        let market = MockMarketData::new().with_snapshot(dec!(140.00), dec!(1.0));
        let executor = MockSwapExecutor::new().with_result(SwapResult::simulated(dec!(0.035)));

        let e = engine(
            market,
            executor.clone(),
            MockBroadcaster::new(),
            store,
            dry_config(),
        );
        let result = e.manual_buy(None).await.unwrap();

        assert_eq!(result.outcome, SwapOutcome::Simulated);
        assert_eq!(executor.get_calls(), vec![(TradeDirection::Buy, dec!(5.0))]);
        assert!(e.status().await.position_open);
    }

    #[tokio::test]
    async fn test_manual_buy_with_size_override() {
        let (_dir, store) = new_store();
        let market = MockMarketData::new().with_snapshot(dec!(140.00), dec!(1.0));
        let executor = MockSwapExecutor::new().with_result(SwapResult::simulated(dec!(0.07)));

        let e = engine(
            market,
            executor.clone(),
            MockBroadcaster::new(),
            store,
            dry_config(),
        );
        e.manual_buy(Some(dec!(10))).await.unwrap();

        assert_eq!(executor.get_calls(), vec![(TradeDirection::Buy, dec!(10))]);
    }

    #[tokio::test]
    async fn test_reconcile_restores_matching_position() {
        let (_dir, store) = new_store();
        let mut saved = live_position("sig1");
        saved.simulated = true;
        store.save_position(&saved).unwrap();

        let e = engine(
            MockMarketData::new(),
            MockSwapExecutor::new(),
            MockBroadcaster::new(),
            store,
            dry_config(),
        );
        e.reconcile().await.unwrap();

        let status = e.status().await;
        assert!(status.position_open);
        assert_eq!(status.entry_price, Some(dec!(150.00)));
    }

    #[tokio::test]
    async fn test_reconcile_discards_simulated_position_in_live_mode() {
        let (_dir, store) = new_store();
        let mut saved = live_position("sig1");
        saved.simulated = true;
        store.save_position(&saved).unwrap();

        let e = engine(
            MockMarketData::new(),
            MockSwapExecutor::new(),
            MockBroadcaster::new(),
            store.clone(),
            live_config(),
        );
        e.reconcile().await.unwrap();

        assert!(!e.status().await.position_open);
        assert!(!store.has_position());
    }

    #[tokio::test]
    async fn test_reconcile_live_position_under_dry_run_is_fatal() {
        let (_dir, store) = new_store();
        store.save_position(&live_position("sig1")).unwrap();

        let e = engine(
            MockMarketData::new(),
            MockSwapExecutor::new(),
            MockBroadcaster::new(),
            store.clone(),
            dry_config(),
        );
        let result = e.reconcile().await;

        assert!(matches!(result, Err(EngineError::Reconciliation(_))));
        // The file is untouched for the operator to act on
        assert!(store.has_position());
    }

    #[tokio::test]
    async fn test_reconcile_corrupted_position_is_fatal() {
        let (_dir, store) = new_store();
        std::fs::write(store.position_path(), "{ not valid json").unwrap();

        let e = engine(
            MockMarketData::new(),
            MockSwapExecutor::new(),
            MockBroadcaster::new(),
            store,
            dry_config(),
        );
        assert!(matches!(
            e.reconcile().await,
            Err(EngineError::Reconciliation(_))
        ));
    }

    #[tokio::test]
    async fn test_reconcile_applies_confirmed_pending_buy() {
        let (_dir, store) = new_store();
        store.save_pending(&pending_buy("sig9", 0)).unwrap();
        let broadcaster = MockBroadcaster::new().with_status(SignatureStatus::Confirmed);

        let e = engine(
            MockMarketData::new(),
            MockSwapExecutor::new(),
            broadcaster.clone(),
            store.clone(),
            live_config(),
        );
        e.reconcile().await.unwrap();

        let status = e.status().await;
        assert!(status.position_open);
        assert_eq!(status.entry_price, Some(dec!(150.00)));
        assert_eq!(status.entry_quantity, Some(dec!(0.033)));
        assert!(!store.has_pending());
        assert!(store.has_position());
        // The chain query searched full history
        assert_eq!(broadcaster.status_calls(), vec![("sig9".to_string(), true)]);
    }

    #[tokio::test]
    async fn test_reconcile_confirmed_buy_under_dry_run_is_fatal() {
        let (_dir, store) = new_store();
        store.save_pending(&pending_buy("sig9", 0)).unwrap();
        let broadcaster = MockBroadcaster::new().with_status(SignatureStatus::Confirmed);

        let e = engine(
            MockMarketData::new(),
            MockSwapExecutor::new(),
            broadcaster,
            store.clone(),
            dry_config(),
        );
        let result = e.reconcile().await;

        assert!(matches!(result, Err(EngineError::Reconciliation(_))));
        // Record survives so a live restart can still apply it
        assert!(store.has_pending());
    }

    #[tokio::test]
    async fn test_reconcile_discards_failed_pending() {
        let (_dir, store) = new_store();
        store.save_pending(&pending_buy("sig9", 0)).unwrap();
        let broadcaster = MockBroadcaster::new()
            .with_status(SignatureStatus::Failed("slippage exceeded".to_string()));

        let e = engine(
            MockMarketData::new(),
            MockSwapExecutor::new(),
            broadcaster,
            store.clone(),
            live_config(),
        );
        e.reconcile().await.unwrap();

        assert!(!e.status().await.position_open);
        assert!(!store.has_pending());
    }

    #[tokio::test]
    async fn test_reconcile_discards_expired_unfound_pending() {
        let (_dir, store) = new_store();
        store.save_pending(&pending_buy("sig9", 300)).unwrap();
        let broadcaster = MockBroadcaster::new().with_status(SignatureStatus::NotFound);

        let e = engine(
            MockMarketData::new(),
            MockSwapExecutor::new(),
            broadcaster,
            store.clone(),
            live_config(),
        );
        e.reconcile().await.unwrap();

        assert!(!e.status().await.position_open);
        assert!(!store.has_pending());
    }

    #[tokio::test]
    async fn test_reconcile_polls_recent_unfound_pending_to_confirmation() {
        let (_dir, store) = new_store();
        store.save_pending(&pending_buy("sig9", 5)).unwrap();
        let broadcaster = MockBroadcaster::new()
            .with_status(SignatureStatus::NotFound)
            .with_confirmation(ConfirmOutcome::Confirmed);

        let e = engine(
            MockMarketData::new(),
            MockSwapExecutor::new(),
            broadcaster,
            store.clone(),
            live_config(),
        );
        e.reconcile().await.unwrap();

        assert!(e.status().await.position_open);
        assert!(!store.has_pending());
    }

    #[tokio::test]
    async fn test_reconcile_recent_unresolved_pending_is_fatal() {
        let (_dir, store) = new_store();
        store.save_pending(&pending_buy("sig9", 5)).unwrap();
        let broadcaster = MockBroadcaster::new()
            .with_status(SignatureStatus::NotFound)
            .with_confirmation(ConfirmOutcome::TimedOut);

        let e = engine(
            MockMarketData::new(),
            MockSwapExecutor::new(),
            broadcaster,
            store.clone(),
            live_config(),
        );
        let result = e.reconcile().await;

        assert!(matches!(result, Err(EngineError::Reconciliation(_))));
        // Unresolved record survives for the next attempt
        assert!(store.has_pending());
    }

    #[tokio::test]
    async fn test_reconcile_pending_sell_closes_restored_position() {
        let (_dir, store) = new_store();
        store.save_position(&live_position("buysig")).unwrap();
        let mut sell = pending_buy("sellsig", 0);
        sell.direction = TradeDirection::Sell;
        sell.input_amount = dec!(0.033);
        sell.expected_output_amount = dec!(5.2);
        store.save_pending(&sell).unwrap();

        let broadcaster = MockBroadcaster::new().with_status(SignatureStatus::Confirmed);
        let e = engine(
            MockMarketData::new(),
            MockSwapExecutor::new(),
            broadcaster,
            store.clone(),
            live_config(),
        );
        e.reconcile().await.unwrap();

        assert!(!e.status().await.position_open);
        assert!(!store.has_position());
        assert!(!store.has_pending());
    }

    #[tokio::test]
    async fn test_reconcile_pending_buy_matching_position_file_is_idempotent() {
        let (_dir, store) = new_store();
        store.save_position(&live_position("samesig")).unwrap();
        store.save_pending(&pending_buy("samesig", 0)).unwrap();

        let broadcaster = MockBroadcaster::new().with_status(SignatureStatus::Confirmed);
        let e = engine(
            MockMarketData::new(),
            MockSwapExecutor::new(),
            broadcaster,
            store.clone(),
            live_config(),
        );
        e.reconcile().await.unwrap();

        let status = e.status().await;
        assert!(status.position_open);
        assert_eq!(status.entry_price, Some(dec!(150.00)));
        assert!(!store.has_pending());
    }

    #[tokio::test]
    async fn test_reconcile_query_error_is_fatal() {
        let (_dir, store) = new_store();
        store.save_pending(&pending_buy("sig9", 0)).unwrap();
        let broadcaster = MockBroadcaster::new()
            .with_status_error(ExecutionError::Upstream("rpc down".to_string()));

        let e = engine(
            MockMarketData::new(),
            MockSwapExecutor::new(),
            broadcaster,
            store.clone(),
            live_config(),
        );
        let result = e.reconcile().await;

        assert!(matches!(result, Err(EngineError::Reconciliation(_))));
        assert!(store.has_pending());
    }

    #[tokio::test]
    async fn test_run_loop_stops_on_request() {
        let (_dir, store) = new_store();
        let market = MockMarketData::new()
            .with_snapshot(dec!(150.00), dec!(1.0))
            .with_snapshot(dec!(151.00), dec!(1.0));

        let e = Arc::new(engine(
            market,
            MockSwapExecutor::new(),
            MockBroadcaster::new(),
            store,
            dry_config(),
        ));

        let runner = {
            let e = Arc::clone(&e);
            tokio::spawn(async move { e.run().await })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(e.status().await.is_running);

        e.stop();
        let result = tokio::time::timeout(Duration::from_secs(2), runner)
            .await
            .expect("run loop did not stop")
            .unwrap();
        assert!(result.is_ok());
        assert!(!e.status().await.is_running);
    }
}

//! Scripted port doubles for pipeline and engine tests.
//!
//! Each mock records the calls it receives and replays a queue of
//! pre-scripted responses, one per call, in order.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use solana_sdk::transaction::VersionedTransaction;

use crate::domain::assets::TradeDirection;
use crate::ports::execution::{
    Broadcaster, ConfirmOutcome, ExecutionError, Quote, SignatureStatus, SwapApi, SwapExecutor,
    SwapPayload, SwapRequest, SwapResult,
};
use crate::ports::market_data::{MarketDataError, MarketDataPort, MarketSnapshot};

/// Mock market data port that replays scripted snapshots
#[derive(Debug, Default, Clone)]
pub struct MockMarketData {
    calls: Arc<Mutex<usize>>,
    responses: Arc<Mutex<VecDeque<Result<MarketSnapshot, MarketDataError>>>>,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to queue a successful snapshot
    pub fn with_snapshot(self, price: Decimal, change_24h_pct: Decimal) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(MarketSnapshot::new(price, change_24h_pct)));
        self
    }

    /// Builder method to queue a failure
    pub fn with_error(self, error: MarketDataError) -> Self {
        self.responses.lock().unwrap().push_back(Err(error));
        self
    }

    /// Number of fetches made so far
    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl MarketDataPort for MockMarketData {
    async fn fetch_snapshot(&self) -> Result<MarketSnapshot, MarketDataError> {
        *self.calls.lock().unwrap() += 1;
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(MarketDataError::UpstreamUnavailable(
                    "no response scripted".to_string(),
                ))
            })
    }
}

/// Mock swap executor that records requests and replays scripted results
#[derive(Debug, Default, Clone)]
pub struct MockSwapExecutor {
    calls: Arc<Mutex<Vec<(TradeDirection, Decimal)>>>,
    results: Arc<Mutex<VecDeque<SwapResult>>>,
}

impl MockSwapExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to queue a result
    pub fn with_result(self, result: SwapResult) -> Self {
        self.results.lock().unwrap().push_back(result);
        self
    }

    /// Get all recorded (direction, input amount) requests
    pub fn get_calls(&self) -> Vec<(TradeDirection, Decimal)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl SwapExecutor for MockSwapExecutor {
    async fn execute(&self, direction: TradeDirection, input_amount: Decimal) -> SwapResult {
        self.calls.lock().unwrap().push((direction, input_amount));
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                SwapResult::failed(ExecutionError::InvalidParameters(
                    "no result scripted".to_string(),
                ))
            })
    }
}

/// A well-formed quote for scripting mock responses
pub fn test_quote(direction: TradeDirection, in_amount: u64, out_amount: u64) -> Quote {
    Quote {
        direction,
        in_amount,
        out_amount,
        min_out_amount: out_amount - out_amount / 100,
        price_impact_pct: 0.1,
        raw: serde_json::json!({
            "inAmount": in_amount.to_string(),
            "outAmount": out_amount.to_string(),
        }),
    }
}

/// Mock quote/swap-build API with separate scripted queues per endpoint
#[derive(Debug, Default, Clone)]
pub struct MockSwapApi {
    quote_calls: Arc<Mutex<Vec<SwapRequest>>>,
    build_calls: Arc<Mutex<Vec<String>>>,
    quotes: Arc<Mutex<VecDeque<Result<Quote, ExecutionError>>>>,
    payloads: Arc<Mutex<VecDeque<Result<SwapPayload, ExecutionError>>>>,
}

impl MockSwapApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quote(self, quote: Quote) -> Self {
        self.quotes.lock().unwrap().push_back(Ok(quote));
        self
    }

    pub fn with_quote_error(self, error: ExecutionError) -> Self {
        self.quotes.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn with_payload(self, payload: SwapPayload) -> Self {
        self.payloads.lock().unwrap().push_back(Ok(payload));
        self
    }

    pub fn with_payload_error(self, error: ExecutionError) -> Self {
        self.payloads.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn quote_calls(&self) -> Vec<SwapRequest> {
        self.quote_calls.lock().unwrap().clone()
    }

    pub fn quote_call_count(&self) -> usize {
        self.quote_calls.lock().unwrap().len()
    }

    /// How many times the swap builder was reached
    pub fn build_call_count(&self) -> usize {
        self.build_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl SwapApi for MockSwapApi {
    async fn get_quote(&self, request: &SwapRequest) -> Result<Quote, ExecutionError> {
        self.quote_calls.lock().unwrap().push(request.clone());
        self.quotes.lock().unwrap().pop_front().unwrap_or_else(|| {
            Err(ExecutionError::Upstream("no quote scripted".to_string()))
        })
    }

    async fn build_swap(
        &self,
        _quote: &Quote,
        user_public_key: &str,
    ) -> Result<SwapPayload, ExecutionError> {
        self.build_calls
            .lock()
            .unwrap()
            .push(user_public_key.to_string());
        self.payloads
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(ExecutionError::Upstream("no payload scripted".to_string()))
            })
    }
}

/// Mock broadcaster with scripted submit and confirmation outcomes
#[derive(Debug, Default, Clone)]
pub struct MockBroadcaster {
    submit_calls: Arc<Mutex<usize>>,
    status_calls: Arc<Mutex<Vec<(String, bool)>>>,
    submits: Arc<Mutex<VecDeque<Result<String, ExecutionError>>>>,
    confirmations: Arc<Mutex<VecDeque<Result<ConfirmOutcome, ExecutionError>>>>,
    statuses: Arc<Mutex<VecDeque<Result<SignatureStatus, ExecutionError>>>>,
}

impl MockBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_submit_ok(self, signature: &str) -> Self {
        self.submits
            .lock()
            .unwrap()
            .push_back(Ok(signature.to_string()));
        self
    }

    pub fn with_submit_error(self, error: ExecutionError) -> Self {
        self.submits.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn with_confirmation(self, outcome: ConfirmOutcome) -> Self {
        self.confirmations.lock().unwrap().push_back(Ok(outcome));
        self
    }

    pub fn with_confirmation_error(self, error: ExecutionError) -> Self {
        self.confirmations.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn with_status(self, status: SignatureStatus) -> Self {
        self.statuses.lock().unwrap().push_back(Ok(status));
        self
    }

    pub fn with_status_error(self, error: ExecutionError) -> Self {
        self.statuses.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn submit_count(&self) -> usize {
        *self.submit_calls.lock().unwrap()
    }

    pub fn status_calls(&self) -> Vec<(String, bool)> {
        self.status_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Broadcaster for MockBroadcaster {
    async fn submit(&self, _transaction: &VersionedTransaction) -> Result<String, ExecutionError> {
        *self.submit_calls.lock().unwrap() += 1;
        self.submits.lock().unwrap().pop_front().unwrap_or_else(|| {
            Err(ExecutionError::BroadcastFailed(
                "no submit scripted".to_string(),
            ))
        })
    }

    async fn await_confirmation(
        &self,
        _signature: &str,
        _timeout: Duration,
    ) -> Result<ConfirmOutcome, ExecutionError> {
        self.confirmations
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(ConfirmOutcome::TimedOut))
    }

    async fn signature_status(
        &self,
        signature: &str,
        search_history: bool,
    ) -> Result<SignatureStatus, ExecutionError> {
        self.status_calls
            .lock()
            .unwrap()
            .push((signature.to_string(), search_history));
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(SignatureStatus::NotFound))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::execution::SwapOutcome;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_mock_market_data_replays_in_order() {
        let mock = MockMarketData::new()
            .with_snapshot(dec!(150), dec!(-3.2))
            .with_error(MarketDataError::EmptyResult);

        let first = mock.fetch_snapshot().await.unwrap();
        assert_eq!(first.price, dec!(150));
        assert_eq!(first.change_24h_pct, dec!(-3.2));

        let second = mock.fetch_snapshot().await;
        assert!(matches!(second, Err(MarketDataError::EmptyResult)));
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_market_data_exhausted_queue_errors() {
        let mock = MockMarketData::new();
        let result = mock.fetch_snapshot().await;
        assert!(matches!(
            result,
            Err(MarketDataError::UpstreamUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_mock_swap_executor_records_calls() {
        let mock = MockSwapExecutor::new()
            .with_result(SwapResult::confirmed("sig1".to_string(), dec!(0.35)));

        let result = mock.execute(TradeDirection::Buy, dec!(50)).await;
        assert_eq!(result.outcome, SwapOutcome::Confirmed);
        assert_eq!(mock.get_calls(), vec![(TradeDirection::Buy, dec!(50))]);
    }

    #[tokio::test]
    async fn test_mock_swap_api_tracks_endpoints_separately() {
        let mock = MockSwapApi::new()
            .with_quote(test_quote(TradeDirection::Buy, 5_000_000, 35_000_000))
            .with_payload_error(ExecutionError::Upstream("down".to_string()));

        let request = SwapRequest::new(TradeDirection::Buy, 5_000_000, 100);
        let quote = mock.get_quote(&request).await.unwrap();
        assert_eq!(quote.out_amount, 35_000_000);
        assert_eq!(mock.quote_call_count(), 1);
        assert_eq!(mock.build_call_count(), 0);

        let payload = mock.build_swap(&quote, "wallet").await;
        assert!(payload.is_err());
        assert_eq!(mock.build_call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_broadcaster_status_records_history_flag() {
        let mock = MockBroadcaster::new().with_status(SignatureStatus::Confirmed);

        let status = mock.signature_status("sig", true).await.unwrap();
        assert_eq!(status, SignatureStatus::Confirmed);
        assert_eq!(mock.status_calls(), vec![("sig".to_string(), true)]);
    }
}

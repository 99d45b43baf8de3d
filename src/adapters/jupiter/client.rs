//! Jupiter API Client
//!
//! HTTP client for the Jupiter DEX aggregator V6 API: quote fetching and
//! swap-transaction building. Each call makes exactly one upstream attempt;
//! the execution pipeline owns any retry decision.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::ports::execution::{ExecutionError, Quote, SwapApi, SwapPayload, SwapRequest};

use super::quote::{QuoteRequest, QuoteResponse};
use super::swap::{SwapBuildRequest, SwapBuildResponse};

/// Jupiter API client configuration
#[derive(Debug, Clone)]
pub struct JupiterConfig {
    /// Base URL for the Jupiter API
    pub api_base_url: String,
    /// Optional API key for higher rate limits
    pub api_key: Option<String>,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for JupiterConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://quote-api.jup.ag/v6".to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Jupiter DEX aggregator client
#[derive(Debug, Clone)]
pub struct JupiterClient {
    config: JupiterConfig,
    http: Client,
}

impl JupiterClient {
    /// Create a new Jupiter client with default configuration
    pub fn new() -> Result<Self, ExecutionError> {
        Self::with_config(JupiterConfig::default())
    }

    /// Create a new Jupiter client with custom configuration
    pub fn with_config(config: JupiterConfig) -> Result<Self, ExecutionError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ExecutionError::Upstream(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, http })
    }

    /// Fetch a quote for a token swap
    pub async fn fetch_quote(&self, request: &QuoteRequest) -> Result<QuoteResponse, ExecutionError> {
        let url = format!("{}/quote", self.config.api_base_url);
        let amount = request.amount.to_string();
        let slippage = request.slippage_bps.to_string();

        let mut req = self.http.get(&url).query(&[
            ("inputMint", request.input_mint.as_str()),
            ("outputMint", request.output_mint.as_str()),
            ("amount", amount.as_str()),
            ("slippageBps", slippage.as_str()),
        ]);

        if let Some(ref api_key) = self.config.api_key {
            req = req.header("x-api-key", api_key);
        }

        let response = req
            .send()
            .await
            .map_err(|e| ExecutionError::Upstream(e.to_string()))?;

        self.handle_response(response).await
    }

    /// Build an unsigned swap transaction from a quote
    pub async fn build_swap_transaction(
        &self,
        request: &SwapBuildRequest,
    ) -> Result<SwapBuildResponse, ExecutionError> {
        let url = format!("{}/swap", self.config.api_base_url);

        let mut req = self.http.post(&url).json(request);

        if let Some(ref api_key) = self.config.api_key {
            req = req.header("x-api-key", api_key);
        }

        let response = req
            .send()
            .await
            .map_err(|e| ExecutionError::Upstream(e.to_string()))?;

        self.handle_response(response).await
    }

    /// Handle API response and deserialize
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ExecutionError> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(classify_error_body(status, &error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ExecutionError::MalformedResponse(format!("Failed to parse response: {e}")))
    }

    /// Get the configured API base URL
    pub fn api_base_url(&self) -> &str {
        &self.config.api_base_url
    }
}

/// Map a non-success response onto the execution error taxonomy.
///
/// Rate limits and server errors are transient upstream conditions; a
/// missing route and a blown slippage bound are terminal for the attempt;
/// any other client error means the request itself was wrong.
fn classify_error_body(status: StatusCode, body: &str) -> ExecutionError {
    if body.contains("COULD_NOT_FIND_ANY_ROUTE") || body.to_ascii_lowercase().contains("no route") {
        return ExecutionError::NoRouteFound;
    }

    if body.contains("SlippageToleranceExceeded") || body.contains("\"6001\"") {
        return ExecutionError::QuoteRejected("slippage tolerance exceeded".to_string());
    }

    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return ExecutionError::Upstream(format!("HTTP {status}: {body}"));
    }

    ExecutionError::InvalidParameters(format!("HTTP {status}: {body}"))
}

#[async_trait]
impl SwapApi for JupiterClient {
    async fn get_quote(&self, request: &SwapRequest) -> Result<Quote, ExecutionError> {
        let quote_request = QuoteRequest::for_direction(
            request.direction,
            request.input_amount,
            request.max_slippage_bps,
        );

        let response = self.fetch_quote(&quote_request).await?;

        let out_amount = response.output_amount();
        if out_amount == 0 {
            return Err(ExecutionError::MalformedResponse(
                "quote output amount missing or zero".to_string(),
            ));
        }

        let raw = serde_json::to_value(&response)
            .map_err(|e| ExecutionError::MalformedResponse(e.to_string()))?;

        Ok(Quote {
            direction: request.direction,
            in_amount: response.input_amount(),
            out_amount,
            min_out_amount: response.min_output_amount(),
            price_impact_pct: response.price_impact(),
            raw,
        })
    }

    async fn build_swap(
        &self,
        quote: &Quote,
        user_public_key: &str,
    ) -> Result<SwapPayload, ExecutionError> {
        let request = SwapBuildRequest::new(user_public_key.to_string(), quote.raw.clone());

        let response = self.build_swap_transaction(&request).await?;

        if response.swap_transaction.is_empty() {
            return Err(ExecutionError::MalformedResponse(
                "swap response missing transaction payload".to_string(),
            ));
        }

        Ok(SwapPayload {
            swap_transaction: response.swap_transaction,
            last_valid_block_height: response.last_valid_block_height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jupiter_config_default() {
        let config = JupiterConfig::default();
        assert_eq!(config.api_base_url, "https://quote-api.jup.ag/v6");
        assert!(config.api_key.is_none());
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_jupiter_client_creation() {
        assert!(JupiterClient::new().is_ok());
    }

    #[test]
    fn test_classify_no_route() {
        let err = classify_error_body(
            StatusCode::BAD_REQUEST,
            r#"{"errorCode":"COULD_NOT_FIND_ANY_ROUTE","error":"Could not find any route"}"#,
        );
        assert!(matches!(err, ExecutionError::NoRouteFound));

        let err = classify_error_body(StatusCode::BAD_REQUEST, "No route found for this trade");
        assert!(matches!(err, ExecutionError::NoRouteFound));
    }

    #[test]
    fn test_classify_slippage() {
        let err = classify_error_body(
            StatusCode::BAD_REQUEST,
            r#"{"error":"SlippageToleranceExceeded"}"#,
        );
        assert!(matches!(err, ExecutionError::QuoteRejected(_)));
    }

    #[test]
    fn test_classify_rate_limit_and_server_errors_transient() {
        let err = classify_error_body(StatusCode::TOO_MANY_REQUESTS, "rate limited");
        assert!(err.is_transient());

        let err = classify_error_body(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(err.is_transient());
    }

    #[test]
    fn test_classify_other_client_error_not_transient() {
        let err = classify_error_body(StatusCode::BAD_REQUEST, "invalid amount");
        assert!(matches!(err, ExecutionError::InvalidParameters(_)));
        assert!(!err.is_transient());
    }
}

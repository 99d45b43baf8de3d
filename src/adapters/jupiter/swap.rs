//! Jupiter Swap-Build Types
//!
//! Request and response structures for the Jupiter V6 swap endpoint, which
//! turns a quote into an unsigned serialized transaction.

use serde::{Deserialize, Serialize};

/// Request parameters for building a swap transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapBuildRequest {
    /// User's public key (wallet address)
    pub user_public_key: String,
    /// The full quote response from the quote endpoint, passed through
    /// untouched
    pub quote_response: serde_json::Value,
    /// Optional prioritization fee in lamports for faster inclusion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prioritization_fee_lamports: Option<u64>,
    /// Whether to use dynamic compute unit limit calculation
    #[serde(default = "default_dynamic_compute_unit_limit")]
    pub dynamic_compute_unit_limit: bool,
}

fn default_dynamic_compute_unit_limit() -> bool {
    true
}

impl SwapBuildRequest {
    pub fn new(user_public_key: String, quote_response: serde_json::Value) -> Self {
        Self {
            user_public_key,
            quote_response,
            prioritization_fee_lamports: None,
            dynamic_compute_unit_limit: true,
        }
    }

    /// Set prioritization fee for faster transaction inclusion
    pub fn with_priority_fee(mut self, lamports: u64) -> Self {
        self.prioritization_fee_lamports = Some(lamports);
        self
    }
}

/// Response from the Jupiter swap endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapBuildResponse {
    /// Base64 encoded serialized transaction ready to sign and send
    pub swap_transaction: String,
    /// Last valid block height for this transaction
    pub last_valid_block_height: u64,
    /// Prioritization fee applied (in lamports)
    #[serde(default)]
    pub prioritization_fee_lamports: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_build_request_new() {
        let quote_json = serde_json::json!({
            "inputMint": "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
            "outputMint": "So11111111111111111111111111111111111111112",
            "inAmount": "5000000",
            "outAmount": "35000000"
        });

        let req = SwapBuildRequest::new(
            "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM".to_string(),
            quote_json,
        );

        assert!(req.prioritization_fee_lamports.is_none());
        assert!(req.dynamic_compute_unit_limit);
    }

    #[test]
    fn test_swap_build_request_serialization() {
        let quote = serde_json::json!({"test": "data"});
        let req = SwapBuildRequest::new("wallet123".to_string(), quote).with_priority_fee(5000);

        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["userPublicKey"], "wallet123");
        assert_eq!(json["quoteResponse"]["test"], "data");
        assert_eq!(json["prioritizationFeeLamports"], 5000);
        assert_eq!(json["dynamicComputeUnitLimit"], true);
    }

    #[test]
    fn test_swap_build_response_parsing() {
        let json = r#"{
            "swapTransaction": "AQAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=",
            "lastValidBlockHeight": 123456789,
            "prioritizationFeeLamports": 5000
        }"#;

        let response: SwapBuildResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.last_valid_block_height, 123456789);
        assert_eq!(response.prioritization_fee_lamports, 5000);
        assert!(!response.swap_transaction.is_empty());
    }

    #[test]
    fn test_swap_build_response_missing_fee_defaults() {
        let json = r#"{
            "swapTransaction": "AQ==",
            "lastValidBlockHeight": 99
        }"#;

        let response: SwapBuildResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.prioritization_fee_lamports, 0);
    }
}

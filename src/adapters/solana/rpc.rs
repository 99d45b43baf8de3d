//! Solana RPC Broadcast
//!
//! Thin async wrapper around the blocking Solana RPC client. Submits
//! signed transactions exactly once and polls signature statuses for
//! confirmation; resubmission policy lives upstream, never here.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use solana_client::rpc_client::RpcClient;
use solana_sdk::{
    commitment_config::CommitmentConfig, signature::Signature,
    transaction::VersionedTransaction,
};
use solana_transaction_status::TransactionStatus;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::ports::{Broadcaster, ConfirmOutcome, ExecutionError, SignatureStatus};

/// How often confirmation polling re-checks the signature status
const CONFIRM_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum SolanaClientError {
    #[error("RPC request failed: {0}")]
    RpcError(String),
    #[error("Transaction failed: {0}")]
    TransactionError(String),
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),
}

/// Wrapper around Solana RPC client with async-compatible methods
#[derive(Clone)]
pub struct SolanaClient {
    client: Arc<RpcClient>,
}

impl SolanaClient {
    /// Create a new Solana RPC client at confirmed commitment
    pub fn new(rpc_url: String) -> Self {
        let client = Arc::new(RpcClient::new_with_commitment(
            rpc_url,
            CommitmentConfig::confirmed(),
        ));
        Self { client }
    }

    /// Get SOL balance for a public key
    pub async fn get_balance(&self, pubkey: &str) -> Result<u64, SolanaClientError> {
        let pubkey = solana_sdk::pubkey::Pubkey::from_str(pubkey)
            .map_err(|e| SolanaClientError::InvalidPublicKey(e.to_string()))?;

        // Spawn blocking to make sync RPC call async-compatible
        let client = Arc::clone(&self.client);
        tokio::task::spawn_blocking(move || {
            client
                .get_balance(&pubkey)
                .map_err(|e| SolanaClientError::RpcError(e.to_string()))
        })
        .await
        .map_err(|e| SolanaClientError::RpcError(format!("Task join error: {}", e)))?
    }

    /// Submit a signed transaction. One attempt, no preflight retries.
    pub async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<String, SolanaClientError> {
        let client = Arc::clone(&self.client);
        let transaction = transaction.clone();

        let signature = tokio::task::spawn_blocking(move || {
            client
                .send_transaction(&transaction)
                .map_err(|e| SolanaClientError::TransactionError(e.to_string()))
        })
        .await
        .map_err(|e| SolanaClientError::RpcError(format!("Task join error: {}", e)))??;

        debug!(signature = %signature, "Transaction submitted");
        Ok(signature.to_string())
    }

    /// Poll a signature until it confirms, fails on chain, or the
    /// timeout elapses. Transport errors abort the poll.
    pub async fn wait_for_confirmation(
        &self,
        signature: &str,
        timeout: Duration,
    ) -> Result<ConfirmOutcome, SolanaClientError> {
        let sig = Signature::from_str(signature)
            .map_err(|e| SolanaClientError::InvalidSignature(e.to_string()))?;
        let deadline = Instant::now() + timeout;

        loop {
            let client = Arc::clone(&self.client);
            let statuses = tokio::task::spawn_blocking(move || {
                client
                    .get_signature_statuses(&[sig])
                    .map_err(|e| SolanaClientError::RpcError(e.to_string()))
            })
            .await
            .map_err(|e| SolanaClientError::RpcError(format!("Task join error: {}", e)))??;

            if let Some(Some(status)) = statuses.value.into_iter().next() {
                if let Some(err) = status.err {
                    return Ok(ConfirmOutcome::FailedOnChain(err.to_string()));
                }
                if status.satisfies_commitment(CommitmentConfig::confirmed()) {
                    info!(signature = %signature, "Transaction confirmed");
                    return Ok(ConfirmOutcome::Confirmed);
                }
            }

            if Instant::now() >= deadline {
                return Ok(ConfirmOutcome::TimedOut);
            }
            tokio::time::sleep(CONFIRM_POLL_INTERVAL).await;
        }
    }

    /// Look up a signature's current status. With `search_history` the
    /// query reaches past the recent-status cache into the ledger.
    pub async fn lookup_signature_status(
        &self,
        signature: &str,
        search_history: bool,
    ) -> Result<Option<TransactionStatus>, SolanaClientError> {
        let sig = Signature::from_str(signature)
            .map_err(|e| SolanaClientError::InvalidSignature(e.to_string()))?;

        let client = Arc::clone(&self.client);
        let statuses = tokio::task::spawn_blocking(move || {
            let result = if search_history {
                client.get_signature_statuses_with_history(&[sig])
            } else {
                client.get_signature_statuses(&[sig])
            };
            result.map_err(|e| SolanaClientError::RpcError(e.to_string()))
        })
        .await
        .map_err(|e| SolanaClientError::RpcError(format!("Task join error: {}", e)))??;

        Ok(statuses.value.into_iter().next().flatten())
    }
}

fn map_status(status: Option<TransactionStatus>) -> SignatureStatus {
    match status {
        None => SignatureStatus::NotFound,
        Some(status) => {
            if let Some(err) = status.err {
                SignatureStatus::Failed(err.to_string())
            } else if status.satisfies_commitment(CommitmentConfig::confirmed()) {
                SignatureStatus::Confirmed
            } else {
                SignatureStatus::Pending
            }
        }
    }
}

#[async_trait]
impl Broadcaster for SolanaClient {
    async fn submit(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<String, ExecutionError> {
        self.send_transaction(transaction)
            .await
            .map_err(|e| ExecutionError::BroadcastFailed(e.to_string()))
    }

    async fn await_confirmation(
        &self,
        signature: &str,
        timeout: Duration,
    ) -> Result<ConfirmOutcome, ExecutionError> {
        self.wait_for_confirmation(signature, timeout)
            .await
            .map_err(|e| ExecutionError::Upstream(e.to_string()))
    }

    async fn signature_status(
        &self,
        signature: &str,
        search_history: bool,
    ) -> Result<SignatureStatus, ExecutionError> {
        let status = self
            .lookup_signature_status(signature, search_history)
            .await
            .map_err(|e| ExecutionError::Upstream(e.to_string()))?;
        Ok(map_status(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::transaction::TransactionError;
    use solana_transaction_status::TransactionConfirmationStatus;

    fn status(
        err: Option<TransactionError>,
        confirmation: Option<TransactionConfirmationStatus>,
    ) -> TransactionStatus {
        TransactionStatus {
            slot: 100,
            confirmations: Some(1),
            status: Ok(()),
            err,
            confirmation_status: confirmation,
        }
    }

    #[test]
    fn test_client_creation() {
        let _client = SolanaClient::new("https://api.mainnet-beta.solana.com".to_string());
    }

    #[test]
    fn test_map_status_not_found() {
        assert!(matches!(map_status(None), SignatureStatus::NotFound));
    }

    #[test]
    fn test_map_status_confirmed() {
        let s = status(None, Some(TransactionConfirmationStatus::Confirmed));
        assert!(matches!(map_status(Some(s)), SignatureStatus::Confirmed));

        let s = status(None, Some(TransactionConfirmationStatus::Finalized));
        assert!(matches!(map_status(Some(s)), SignatureStatus::Confirmed));
    }

    #[test]
    fn test_map_status_pending_below_commitment() {
        let s = status(None, Some(TransactionConfirmationStatus::Processed));
        assert!(matches!(map_status(Some(s)), SignatureStatus::Pending));
    }

    #[test]
    fn test_map_status_failed_on_chain() {
        let s = status(
            Some(TransactionError::AccountNotFound),
            Some(TransactionConfirmationStatus::Confirmed),
        );
        assert!(matches!(map_status(Some(s)), SignatureStatus::Failed(_)));
    }

    #[test]
    fn test_error_display() {
        let err = SolanaClientError::RpcError("connection refused".to_string());
        assert!(err.to_string().contains("connection refused"));

        let err = SolanaClientError::InvalidSignature("bad length".to_string());
        assert!(err.to_string().contains("bad length"));
    }
}

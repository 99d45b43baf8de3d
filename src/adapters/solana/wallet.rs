//! Wallet Custody
//!
//! Loads the signing keypair from one of the two supported credential
//! sources and signs swap transactions. Secret bytes stay inside this
//! module: there is no export path, the `Debug` impl prints only the
//! public key, and errors never echo key material.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::VersionedTransaction,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("Failed to load keypair: {0}")]
    LoadError(String),
    #[error("Invalid keypair bytes: {0}")]
    InvalidKeypair(String),
    #[error("Failed to sign transaction: {0}")]
    SigningError(String),
}

/// Where the signing key comes from. Exactly one source is configured;
/// enforcing that is the config loader's job.
pub enum CredentialSource {
    /// Path to a JSON keypair file (array of 64 byte values)
    KeypairFile(PathBuf),
    /// Base58-encoded secret key string
    Base58Secret(String),
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::KeypairFile(path) => {
                f.debug_tuple("KeypairFile").field(path).finish()
            }
            CredentialSource::Base58Secret(_) => {
                f.debug_tuple("Base58Secret").field(&"<redacted>").finish()
            }
        }
    }
}

/// Holds the signing keypair for the bot's wallet
pub struct WalletManager {
    keypair: Keypair,
}

impl WalletManager {
    /// Load the keypair from the configured credential source
    pub fn from_source(source: &CredentialSource) -> Result<Self, WalletError> {
        match source {
            CredentialSource::KeypairFile(path) => Self::from_file(path),
            CredentialSource::Base58Secret(secret) => Self::from_base58(secret),
        }
    }

    /// Load keypair from a file path (JSON array format)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, WalletError> {
        let contents = fs::read_to_string(path.as_ref())
            .map_err(|e| WalletError::LoadError(format!("Failed to read file: {e}")))?;

        let bytes: Vec<u8> = serde_json::from_str(&contents)
            .map_err(|e| WalletError::LoadError(format!("Invalid JSON format: {e}")))?;

        Self::from_bytes(&bytes)
    }

    /// Load keypair from a base58-encoded secret string
    pub fn from_base58(secret: &str) -> Result<Self, WalletError> {
        let bytes = bs58::decode(secret.trim())
            .into_vec()
            .map_err(|e| WalletError::InvalidKeypair(format!("invalid base58: {e}")))?;

        Self::from_bytes(&bytes)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, WalletError> {
        let keypair =
            Keypair::try_from(bytes).map_err(|e| WalletError::InvalidKeypair(e.to_string()))?;

        Ok(Self { keypair })
    }

    /// Create a wallet with a fresh random keypair. Used by dry-run
    /// sessions started without credentials, and by tests.
    pub fn new_random() -> Self {
        Self {
            keypair: Keypair::new(),
        }
    }

    /// Get the public key as a string
    pub fn public_key(&self) -> String {
        self.keypair.pubkey().to_string()
    }

    /// Get the public key as Pubkey
    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    /// Sign a transaction, legacy or versioned encoding alike.
    ///
    /// Places this wallet's signature at its required-signer slot and
    /// leaves any other signature slots untouched. Fails when the wallet
    /// is not among the message's required signers.
    pub fn sign_transaction(
        &self,
        transaction: VersionedTransaction,
    ) -> Result<VersionedTransaction, WalletError> {
        let VersionedTransaction {
            mut signatures,
            message,
        } = transaction;

        let num_required = message.header().num_required_signatures as usize;
        let signer_index = message
            .static_account_keys()
            .iter()
            .take(num_required)
            .position(|key| *key == self.keypair.pubkey())
            .ok_or_else(|| {
                WalletError::SigningError(format!(
                    "wallet {} is not a required signer for this transaction",
                    self.keypair.pubkey()
                ))
            })?;

        if signatures.len() != num_required {
            signatures.resize(num_required, Signature::default());
        }

        signatures[signer_index] = self.keypair.sign_message(&message.serialize());

        Ok(VersionedTransaction {
            signatures,
            message,
        })
    }
}

impl fmt::Debug for WalletManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletManager")
            .field("pubkey", &self.keypair.pubkey())
            .finish_non_exhaustive()
    }
}

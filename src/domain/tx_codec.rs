//! Transaction Wire Codec
//!
//! Decodes the base64 swap payload returned by the swap-build provider into
//! a `VersionedTransaction`. Both wire encodings are supported: the legacy
//! format (message starts with the signature-count header byte) and the
//! versioned format (message starts with a prefix byte whose top bit is set
//! and whose low bits carry the version number). A prefix naming a version
//! this codec does not know is rejected explicitly rather than surfaced as a
//! generic parse failure.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use solana_sdk::transaction::VersionedTransaction;
use thiserror::Error;

/// Byte length of an ed25519 signature on the wire
const SIGNATURE_BYTES: usize = 64;

#[derive(Error, Debug, Clone)]
pub enum TxCodecError {
    #[error("Transaction payload is not valid base64: {0}")]
    InvalidBase64(String),

    #[error("Failed to deserialize transaction payload: {0}")]
    Malformed(String),

    #[error("Unsupported transaction version {0}")]
    UnsupportedVersion(u8),
}

/// Decode a base64 swap payload into a transaction
pub fn decode_swap_payload(encoded: &str) -> Result<VersionedTransaction, TxCodecError> {
    let bytes = BASE64_STANDARD
        .decode(encoded.trim())
        .map_err(|e| TxCodecError::InvalidBase64(e.to_string()))?;
    decode_transaction(&bytes)
}

/// Decode raw transaction bytes, distinguishing an unknown version prefix
/// from a plainly corrupt payload.
pub fn decode_transaction(bytes: &[u8]) -> Result<VersionedTransaction, TxCodecError> {
    match bincode::deserialize::<VersionedTransaction>(bytes) {
        Ok(tx) => Ok(tx),
        Err(err) => {
            if let Some(version) = version_prefix(bytes).filter(|v| *v != 0) {
                return Err(TxCodecError::UnsupportedVersion(version));
            }
            Err(TxCodecError::Malformed(err.to_string()))
        }
    }
}

/// Peek the message version prefix without deserializing.
///
/// Returns `None` for the legacy encoding (no prefix byte) and for byte
/// streams too short to carry a message at all.
fn version_prefix(bytes: &[u8]) -> Option<u8> {
    let (num_signatures, prefix_len) = read_shortvec_len(bytes)?;
    let message_offset = prefix_len + num_signatures.checked_mul(SIGNATURE_BYTES)?;
    let first = *bytes.get(message_offset)?;
    if first & 0x80 != 0 {
        Some(first & 0x7f)
    } else {
        None
    }
}

/// Decode a shortvec (compact-u16) length, returning (value, bytes consumed)
fn read_shortvec_len(bytes: &[u8]) -> Option<(usize, usize)> {
    let mut len: usize = 0;
    for (i, &b) in bytes.iter().take(3).enumerate() {
        len |= ((b & 0x7f) as usize) << (7 * i);
        if b & 0x80 == 0 {
            return Some((len, i + 1));
        }
    }
    None
}

//! Encryption Service Interface
//!
//! The encryption service seals plaintext values for a target contract and,
//! on request, produces a disclosure: the clear values of a set of handles
//! together with a proof the ledger can check.
//!
//! Disclosure is a two-step protocol owned by the caller:
//!
//! ```text
//!   1. request_disclosure(handles, target) ──▶ DisclosureProof
//!   2. ledger.submit_verification_proof(id, proof.encoded_clear_values, proof.proof)
//! ```
//!
//! Clear values are encoded as 32-byte big-endian words, in handle order.

pub mod local;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::record::{Address, CiphertextHandle};

pub use local::LocalEncryptionService;

/// Width of one encoded clear value
pub const WORD_SIZE: usize = 32;

/// Encryption service errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncryptionError {
    #[error("encryption session not initialized")]
    NotInitialized,

    #[error("session initialization failed: {0}")]
    InitFailed(String),

    #[error("unknown ciphertext handle: {0}")]
    UnknownHandle(String),

    #[error("handle {0} is not decryptable by this contract")]
    AccessDenied(String),

    #[error("cipher failure")]
    Crypto,

    #[error("gateway error: {0}")]
    Gateway(String),
}

/// A sealed input ready to be submitted to the ledger
#[derive(Debug, Clone)]
pub struct EncryptedInput {
    pub handle: CiphertextHandle,
    /// Proof that `handle` was produced for (target, caller)
    pub proof: Vec<u8>,
}

/// Output of the first disclosure step
#[derive(Debug, Clone)]
pub struct DisclosureProof {
    pub clear_values: HashMap<CiphertextHandle, u64>,
    /// Clear values in handle order, as the ledger expects them
    pub encoded_clear_values: Vec<u8>,
    pub proof: Vec<u8>,
}

impl DisclosureProof {
    pub fn clear_value(&self, handle: &CiphertextHandle) -> Option<u64> {
        self.clear_values.get(handle).copied()
    }
}

#[async_trait]
pub trait EncryptionService: Send + Sync {
    /// Prepare the service for this session. Must succeed before any
    /// `encrypt` or `request_disclosure` call.
    async fn initialize_session(&self) -> Result<(), EncryptionError>;

    /// Seal `value` for `target`, bound to `caller`
    async fn encrypt(
        &self,
        target: Address,
        caller: Address,
        value: u64,
    ) -> Result<EncryptedInput, EncryptionError>;

    /// Decrypt `handles` and prove the result
    async fn request_disclosure(
        &self,
        handles: &[CiphertextHandle],
        target: Address,
    ) -> Result<DisclosureProof, EncryptionError>;
}

/// Encode clear values as concatenated 32-byte big-endian words
pub fn encode_clear_values(values: &[u64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * WORD_SIZE);
    for value in values {
        out.extend_from_slice(&[0u8; WORD_SIZE - 8]);
        out.extend_from_slice(&value.to_be_bytes());
    }
    out
}

/// Decode clear values. `None` if the length is not a multiple of the word
/// size or a word does not fit in a `u64`.
pub fn decode_clear_values(bytes: &[u8]) -> Option<Vec<u64>> {
    if bytes.len() % WORD_SIZE != 0 {
        return None;
    }

    bytes
        .chunks_exact(WORD_SIZE)
        .map(|word| {
            let (high, low) = word.split_at(WORD_SIZE - 8);
            if high.iter().any(|b| *b != 0) {
                return None;
            }
            let low: [u8; 8] = low.try_into().ok()?;
            Some(u64::from_be_bytes(low))
        })
        .collect()
}

//! Ledger Interface
//!
//! The ledger is the authoritative, append-only store for records.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Ledger Calls                             │
//! │                                                                  │
//! │  read:   list_record_ids ─▶ get_record ─▶ get_ciphertext_handle │
//! │                                                                  │
//! │  write:  create_record              (ciphertext + input proof)  │
//! │          submit_verification_proof  (clear values + proof)      │
//! │                                                                  │
//! │  Every write is atomic. A confirmed write is visible to the     │
//! │  next read made through the same handle.                        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::record::{Address, CiphertextHandle, Record, RecordId};

pub use memory::MemoryLedger;

/// Ledger errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("record not found: {0}")]
    NotFound(RecordId),

    #[error("record already exists: {0}")]
    AlreadyExists(RecordId),

    /// Another actor's verification was accepted first
    #[error("Data already verified: {0}")]
    AlreadyVerified(RecordId),

    /// The signer declined the transaction prompt
    #[error("user rejected transaction")]
    UserRejected,

    #[error("invalid proof")]
    InvalidProof,

    #[error("ledger rejected call: {0}")]
    Rejected(String),

    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Confirmation of an accepted write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    /// Transaction identifier
    pub tx_id: String,
    /// Block the write was included in
    pub block: u64,
}

/// Arguments of a record creation call
#[derive(Debug, Clone)]
pub struct CreateRecord {
    pub id: RecordId,
    pub label: String,
    pub ciphertext: CiphertextHandle,
    /// Proof that the ciphertext was produced for this contract and sender
    pub input_proof: Vec<u8>,
    pub public_attribute1: u32,
    pub public_attribute2: u32,
    pub metadata: String,
}

/// The ledger operations consumed by the orchestrator
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Address of the record contract (the encryption target)
    fn address(&self) -> Address;

    async fn list_record_ids(&self) -> Result<Vec<RecordId>, LedgerError>;

    /// Fetch a record including its disclosure state
    async fn get_record(&self, id: &str) -> Result<Record, LedgerError>;

    /// Create a record owned by `sender`. Returns once confirmed.
    async fn create_record(
        &self,
        sender: Address,
        request: CreateRecord,
    ) -> Result<Confirmation, LedgerError>;

    async fn get_ciphertext_handle(&self, id: &str) -> Result<CiphertextHandle, LedgerError>;

    /// Accept a verified decryption for `id`.
    ///
    /// Fails with [`LedgerError::AlreadyVerified`] when another submission
    /// for the same record was accepted first.
    async fn submit_verification_proof(
        &self,
        sender: Address,
        id: &str,
        clear_values: &[u8],
        proof: &[u8],
    ) -> Result<Confirmation, LedgerError>;

    async fn check_service_availability(&self) -> Result<bool, LedgerError>;
}

/// Proof checks performed on-ledger
pub trait ProofVerifier: Send + Sync {
    /// Check an input proof binding `ciphertext` to (`target`, `submitter`)
    fn verify_input(
        &self,
        ciphertext: &CiphertextHandle,
        proof: &[u8],
        target: &Address,
        submitter: &Address,
    ) -> bool;

    /// Check that `clear_values` are the decryption of `handles`
    fn verify_disclosure(&self, handles: &[CiphertextHandle], clear_values: &[u8], proof: &[u8])
    -> bool;
}

//! In-memory Ledger
//!
//! Single-process ledger for development and tests. Each call is atomic
//! under one lock and every accepted write is visible to the next read.
//! Fault injection mimics a wallet declining a prompt or the node failing.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};
use tokio::sync::Mutex;

use super::{Confirmation, CreateRecord, Ledger, LedgerError, ProofVerifier};
use crate::encryption::decode_clear_values;
use crate::record::{Address, CiphertextHandle, Disclosure, Record, RecordId};

#[derive(Debug, Default)]
struct Faults {
    available: bool,
    decline_next: bool,
    fail_next: Option<String>,
    reject_next_write: Option<String>,
    reads_failing: Option<String>,
    unreadable: HashSet<RecordId>,
}

#[derive(Debug, Default)]
struct LedgerState {
    /// Creation order
    order: Vec<RecordId>,
    records: HashMap<RecordId, Record>,
    block: u64,
    accepted_verifications: u64,
    rejected_verifications: u64,
}

impl LedgerState {
    fn next_confirmation(&mut self, kind: &str, id: &str) -> Confirmation {
        self.block += 1;
        let digest = blake3::hash(format!("{kind}:{id}:{}", self.block).as_bytes());
        Confirmation {
            tx_id: format!("0x{}", hex::encode(&digest.as_bytes()[..16])),
            block: self.block,
        }
    }
}

/// Ledger kept entirely in memory
pub struct MemoryLedger {
    address: Address,
    verifier: Option<Arc<dyn ProofVerifier>>,
    state: Mutex<LedgerState>,
    faults: Mutex<Faults>,
}

impl MemoryLedger {
    /// Create an empty ledger deployed at `address`. Without a verifier,
    /// proofs are accepted unchecked.
    pub fn new(address: Address) -> Self {
        Self {
            address,
            verifier: None,
            state: Mutex::new(LedgerState::default()),
            faults: Mutex::new(Faults {
                available: true,
                ..Faults::default()
            }),
        }
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn ProofVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Make the next write behave as if the signer declined it
    pub async fn decline_next_transaction(&self) {
        self.faults.lock().await.decline_next = true;
    }

    /// Make the next call fail with `reason`
    pub async fn fail_next_call(&self, reason: impl Into<String>) {
        self.faults.lock().await.fail_next = Some(reason.into());
    }

    /// Make the next write fail as a ledger-side rejection
    pub async fn reject_next_write(&self, reason: impl Into<String>) {
        self.faults.lock().await.reject_next_write = Some(reason.into());
    }

    /// Make every read call fail with `reason` until cleared with `None`
    pub async fn fail_reads(&self, reason: Option<String>) {
        self.faults.lock().await.reads_failing = reason;
    }

    /// Make every `get_record` for `id` fail
    pub async fn make_unreadable(&self, id: impl Into<RecordId>) {
        self.faults.lock().await.unreadable.insert(id.into());
    }

    pub async fn set_available(&self, available: bool) {
        self.faults.lock().await.available = available;
    }

    /// Verification submissions accepted so far
    pub async fn accepted_verifications(&self) -> u64 {
        self.state.lock().await.accepted_verifications
    }

    /// Verification submissions rejected as already verified
    pub async fn rejected_verifications(&self) -> u64 {
        self.state.lock().await.rejected_verifications
    }

    pub async fn record_count(&self) -> usize {
        self.state.lock().await.order.len()
    }

    async fn take_call_fault(&self) -> Result<(), LedgerError> {
        match self.faults.lock().await.fail_next.take() {
            Some(reason) => Err(LedgerError::Unavailable(reason)),
            None => Ok(()),
        }
    }

    async fn take_read_fault(&self) -> Result<(), LedgerError> {
        self.take_call_fault().await?;
        match self.faults.lock().await.reads_failing.clone() {
            Some(reason) => Err(LedgerError::Unavailable(reason)),
            None => Ok(()),
        }
    }

    async fn take_write_fault(&self) -> Result<(), LedgerError> {
        self.take_call_fault().await?;
        let mut faults = self.faults.lock().await;
        if std::mem::take(&mut faults.decline_next) {
            return Err(LedgerError::UserRejected);
        }
        if let Some(reason) = faults.reject_next_write.take() {
            return Err(LedgerError::Rejected(reason));
        }
        Ok(())
    }
}

fn now_secs() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

#[async_trait]
impl Ledger for MemoryLedger {
    fn address(&self) -> Address {
        self.address
    }

    async fn list_record_ids(&self) -> Result<Vec<RecordId>, LedgerError> {
        self.take_read_fault().await?;
        Ok(self.state.lock().await.order.clone())
    }

    async fn get_record(&self, id: &str) -> Result<Record, LedgerError> {
        self.take_read_fault().await?;
        if self.faults.lock().await.unreadable.contains(id) {
            return Err(LedgerError::Unavailable(format!("cannot decode record {id}")));
        }
        self.state
            .lock()
            .await
            .records
            .get(id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))
    }

    async fn create_record(
        &self,
        sender: Address,
        request: CreateRecord,
    ) -> Result<Confirmation, LedgerError> {
        self.take_write_fault().await?;

        if let Some(verifier) = &self.verifier {
            if !verifier.verify_input(&request.ciphertext, &request.input_proof, &self.address, &sender)
            {
                return Err(LedgerError::InvalidProof);
            }
        }

        let mut state = self.state.lock().await;
        if state.records.contains_key(&request.id) {
            return Err(LedgerError::AlreadyExists(request.id));
        }

        let record = Record {
            id: request.id.clone(),
            label: request.label,
            encrypted_handle: request.ciphertext,
            public_attribute1: request.public_attribute1,
            public_attribute2: request.public_attribute2,
            metadata: request.metadata,
            created_at: now_secs(),
            owner: sender,
            disclosure: Disclosure::Sealed,
        };

        let confirmation = state.next_confirmation("create", &record.id);
        state.order.push(record.id.clone());
        state.records.insert(record.id.clone(), record);

        info!(
            "Record {} created by {} in block {}",
            request.id, sender, confirmation.block
        );
        Ok(confirmation)
    }

    async fn get_ciphertext_handle(&self, id: &str) -> Result<CiphertextHandle, LedgerError> {
        self.take_read_fault().await?;
        self.state
            .lock()
            .await
            .records
            .get(id)
            .map(|record| record.encrypted_handle)
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))
    }

    async fn submit_verification_proof(
        &self,
        sender: Address,
        id: &str,
        clear_values: &[u8],
        proof: &[u8],
    ) -> Result<Confirmation, LedgerError> {
        self.take_write_fault().await?;

        let mut state = self.state.lock().await;
        let (handle, verified) = state
            .records
            .get(id)
            .map(|record| (record.encrypted_handle, record.verified()))
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))?;

        if verified {
            state.rejected_verifications += 1;
            debug!("Verification of {} by {} rejected: already verified", id, sender);
            return Err(LedgerError::AlreadyVerified(id.to_string()));
        }

        if let Some(verifier) = &self.verifier {
            if !verifier.verify_disclosure(&[handle], clear_values, proof) {
                return Err(LedgerError::InvalidProof);
            }
        }

        let value = match decode_clear_values(clear_values).as_deref() {
            Some([value]) => *value,
            _ => {
                return Err(LedgerError::Rejected(
                    "expected exactly one clear value".to_string(),
                ));
            }
        };

        let confirmation = state.next_confirmation("verify", id);
        if let Some(record) = state.records.get_mut(id) {
            record.disclosure = Disclosure::Disclosed(value);
        }
        state.accepted_verifications += 1;

        info!(
            "Record {} verified by {} in block {}",
            id, sender, confirmation.block
        );
        Ok(confirmation)
    }

    async fn check_service_availability(&self) -> Result<bool, LedgerError> {
        self.take_read_fault().await?;
        Ok(self.faults.lock().await.available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryption::{EncryptionService, LocalEncryptionService, encode_clear_values};

    const CONTRACT: Address = Address([0xC0; 20]);
    const ALICE: Address = Address([0xA1; 20]);

    fn create_request(id: &str, handle: CiphertextHandle, proof: Vec<u8>) -> CreateRecord {
        CreateRecord {
            id: id.to_string(),
            label: "Data Scientist".to_string(),
            ciphertext: handle,
            input_proof: proof,
            public_attribute1: 4,
            public_attribute2: 0,
            metadata: "Industry: Finance, Experience: 4 years".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_read_back() {
        let ledger = MemoryLedger::new(CONTRACT);
        ledger
            .create_record(ALICE, create_request("salary-1", CiphertextHandle([1u8; 32]), vec![]))
            .await
            .unwrap();

        let record = ledger.get_record("salary-1").await.unwrap();
        assert_eq!(record.owner, ALICE);
        assert!(!record.verified());
        assert_eq!(ledger.list_record_ids().await.unwrap(), vec!["salary-1"]);
        assert_eq!(
            ledger.get_ciphertext_handle("salary-1").await.unwrap(),
            CiphertextHandle([1u8; 32])
        );
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let ledger = MemoryLedger::new(CONTRACT);
        let request = create_request("salary-1", CiphertextHandle([1u8; 32]), vec![]);
        ledger.create_record(ALICE, request.clone()).await.unwrap();

        let err = ledger.create_record(ALICE, request).await.unwrap_err();
        assert_eq!(err, LedgerError::AlreadyExists("salary-1".to_string()));
        assert_eq!(ledger.record_count().await, 1);
    }

    #[tokio::test]
    async fn test_second_verification_reports_already_verified() {
        let ledger = MemoryLedger::new(CONTRACT);
        ledger
            .create_record(ALICE, create_request("salary-1", CiphertextHandle([1u8; 32]), vec![]))
            .await
            .unwrap();

        let encoded = encode_clear_values(&[64_000]);
        ledger
            .submit_verification_proof(ALICE, "salary-1", &encoded, &[])
            .await
            .unwrap();

        let err = ledger
            .submit_verification_proof(ALICE, "salary-1", &encode_clear_values(&[1]), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyVerified(_)));

        let record = ledger.get_record("salary-1").await.unwrap();
        assert_eq!(record.disclosed_value(), Some(64_000));
        assert_eq!(ledger.accepted_verifications().await, 1);
        assert_eq!(ledger.rejected_verifications().await, 1);
    }

    #[tokio::test]
    async fn test_verifier_rejects_bad_proofs() {
        let fhe = Arc::new(LocalEncryptionService::from_seed([4u8; 32]));
        fhe.initialize_session().await.unwrap();
        let ledger = MemoryLedger::new(CONTRACT).with_verifier(fhe.clone());

        let input = fhe.encrypt(CONTRACT, ALICE, 70_000).await.unwrap();

        // proof bound to ALICE, submitted by someone else
        let err = ledger
            .create_record(
                Address::ZERO,
                create_request("salary-1", input.handle, input.proof.clone()),
            )
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::InvalidProof);

        ledger
            .create_record(ALICE, create_request("salary-1", input.handle, input.proof))
            .await
            .unwrap();

        let err = ledger
            .submit_verification_proof(ALICE, "salary-1", &encode_clear_values(&[70_000]), &[0u8; 32])
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::InvalidProof);
        assert!(!ledger.get_record("salary-1").await.unwrap().verified());
    }

    #[tokio::test]
    async fn test_declined_write_leaves_no_record() {
        let ledger = MemoryLedger::new(CONTRACT);
        ledger.decline_next_transaction().await;

        let err = ledger
            .create_record(ALICE, create_request("salary-1", CiphertextHandle([1u8; 32]), vec![]))
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::UserRejected);
        assert_eq!(ledger.record_count().await, 0);
    }

    #[tokio::test]
    async fn test_read_and_write_faults() {
        let ledger = MemoryLedger::new(CONTRACT);
        ledger.fail_reads(Some("indexer lagging".into())).await;

        ledger
            .create_record(ALICE, create_request("salary-1", CiphertextHandle([1u8; 32]), vec![]))
            .await
            .unwrap();
        assert!(matches!(
            ledger.list_record_ids().await,
            Err(LedgerError::Unavailable(_))
        ));

        ledger.fail_reads(None).await;
        assert_eq!(ledger.record_count().await, 1);

        ledger.reject_next_write("out of gas").await;
        let err = ledger
            .submit_verification_proof(ALICE, "salary-1", &encode_clear_values(&[5]), &[])
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::Rejected("out of gas".to_string()));
        assert!(!ledger.get_record("salary-1").await.unwrap().verified());
    }

    #[tokio::test]
    async fn test_missing_record() {
        let ledger = MemoryLedger::new(CONTRACT);
        assert_eq!(
            ledger.get_record("salary-404").await,
            Err(LedgerError::NotFound("salary-404".to_string()))
        );
        assert!(ledger.check_service_availability().await.unwrap());

        ledger.set_available(false).await;
        assert!(!ledger.check_service_availability().await.unwrap());
    }
}

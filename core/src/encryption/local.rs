//! Local Encryption Service
//!
//! In-process stand-in for the FHE gateway, used by tests and the CLI demo.
//! Values are sealed with ChaCha20-Poly1305 under a service key; input and
//! disclosure proofs are keyed BLAKE3 MACs that only this service can issue,
//! which the ledger checks through [`ProofVerifier`].
//!
//! Sealed bytes never leave the service: callers only see the handle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use log::debug;
use rand::RngCore;
use tokio::sync::Mutex;

use super::{
    DisclosureProof, EncryptedInput, EncryptionError, EncryptionService, encode_clear_values,
};
use crate::ledger::ProofVerifier;
use crate::record::{Address, CiphertextHandle};

const SEALING_CONTEXT: &str = "paycloak-local-sealing-v1";
const PROOF_CONTEXT: &str = "paycloak-local-proof-v1";
const HANDLE_CONTEXT: &str = "paycloak-local-handle-v1";

#[derive(Debug, Clone)]
struct SealedValue {
    target: Address,
    owner: Address,
    nonce: [u8; 12],
    ciphertext: Vec<u8>,
}

#[derive(Debug, Default)]
struct Faults {
    fail_next_init: bool,
    encrypt: Option<String>,
    disclosure: Option<String>,
}

/// Local encryption service with deterministic keys per seed
pub struct LocalEncryptionService {
    sealing_key: [u8; 32],
    proof_key: [u8; 32],
    sealed: Mutex<HashMap<CiphertextHandle, SealedValue>>,
    faults: Mutex<Faults>,
    initialized: AtomicBool,
    init_calls: AtomicUsize,
    encrypt_calls: AtomicUsize,
    disclosure_requests: AtomicUsize,
}

impl LocalEncryptionService {
    /// Create a service with a random seed
    pub fn new() -> Self {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        Self::from_seed(seed)
    }

    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            sealing_key: blake3::derive_key(SEALING_CONTEXT, &seed),
            proof_key: blake3::derive_key(PROOF_CONTEXT, &seed),
            sealed: Mutex::new(HashMap::new()),
            faults: Mutex::new(Faults::default()),
            initialized: AtomicBool::new(false),
            init_calls: AtomicUsize::new(0),
            encrypt_calls: AtomicUsize::new(0),
            disclosure_requests: AtomicUsize::new(0),
        }
    }

    /// Make the next `initialize_session` call fail
    pub async fn fail_next_init(&self) {
        self.faults.lock().await.fail_next_init = true;
    }

    /// Make every `encrypt` call fail with `reason` (or succeed again with `None`)
    pub async fn fail_encryptions(&self, reason: Option<String>) {
        self.faults.lock().await.encrypt = reason;
    }

    /// Make every `request_disclosure` call fail with `reason`
    pub async fn fail_disclosures(&self, reason: Option<String>) {
        self.faults.lock().await.disclosure = reason;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Number of `initialize_session` calls received
    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    /// Number of `encrypt` calls received
    pub fn encrypt_calls(&self) -> usize {
        self.encrypt_calls.load(Ordering::SeqCst)
    }

    /// Number of `request_disclosure` calls received
    pub fn disclosure_requests(&self) -> usize {
        self.disclosure_requests.load(Ordering::SeqCst)
    }

    /// Simulated gateway round trip
    async fn round_trip(&self) {
        tokio::task::yield_now().await;
    }

    fn ensure_initialized(&self) -> Result<(), EncryptionError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(EncryptionError::NotInitialized)
        }
    }

    fn cipher(&self) -> Result<ChaCha20Poly1305, EncryptionError> {
        ChaCha20Poly1305::new_from_slice(&self.sealing_key).map_err(|_| EncryptionError::Crypto)
    }

    fn input_proof(
        &self,
        handle: &CiphertextHandle,
        target: &Address,
        submitter: &Address,
    ) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new_keyed(&self.proof_key);
        hasher.update(b"input");
        hasher.update(handle.as_bytes());
        hasher.update(target.as_bytes());
        hasher.update(submitter.as_bytes());
        hasher.finalize()
    }

    fn disclosure_proof(&self, handles: &[CiphertextHandle], clear_values: &[u8]) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new_keyed(&self.proof_key);
        hasher.update(b"disclosure");
        hasher.update(&(handles.len() as u64).to_le_bytes());
        for handle in handles {
            hasher.update(handle.as_bytes());
        }
        hasher.update(clear_values);
        hasher.finalize()
    }
}

impl Default for LocalEncryptionService {
    fn default() -> Self {
        Self::new()
    }
}

/// Associated data binding a ciphertext to its contract and submitter
fn binding(target: &Address, owner: &Address) -> [u8; 40] {
    let mut aad = [0u8; 40];
    aad[..20].copy_from_slice(target.as_bytes());
    aad[20..].copy_from_slice(owner.as_bytes());
    aad
}

fn proof_matches(expected: blake3::Hash, proof: &[u8]) -> bool {
    match <[u8; 32]>::try_from(proof) {
        // blake3::Hash equality is constant time
        Ok(bytes) => expected == blake3::Hash::from(bytes),
        Err(_) => false,
    }
}

#[async_trait]
impl EncryptionService for LocalEncryptionService {
    async fn initialize_session(&self) -> Result<(), EncryptionError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await;

        {
            let mut faults = self.faults.lock().await;
            if std::mem::take(&mut faults.fail_next_init) {
                return Err(EncryptionError::InitFailed("gateway unreachable".to_string()));
            }
        }

        self.initialized.store(true, Ordering::SeqCst);
        debug!("Local encryption session initialized");
        Ok(())
    }

    async fn encrypt(
        &self,
        target: Address,
        caller: Address,
        value: u64,
    ) -> Result<EncryptedInput, EncryptionError> {
        self.ensure_initialized()?;
        self.encrypt_calls.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await;

        if let Some(reason) = self.faults.lock().await.encrypt.clone() {
            return Err(EncryptionError::Gateway(reason));
        }

        let mut nonce = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce);

        let aad = binding(&target, &caller);
        let ciphertext = self
            .cipher()?
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: &value.to_le_bytes(),
                    aad: &aad,
                },
            )
            .map_err(|_| EncryptionError::Crypto)?;

        let mut hasher = blake3::Hasher::new_derive_key(HANDLE_CONTEXT);
        hasher.update(&nonce);
        hasher.update(&ciphertext);
        hasher.update(&aad);
        let handle = CiphertextHandle(*hasher.finalize().as_bytes());

        let proof = self.input_proof(&handle, &target, &caller);

        self.sealed.lock().await.insert(
            handle,
            SealedValue {
                target,
                owner: caller,
                nonce,
                ciphertext,
            },
        );

        debug!("Sealed value under handle {}", handle);
        Ok(EncryptedInput {
            handle,
            proof: proof.as_bytes().to_vec(),
        })
    }

    async fn request_disclosure(
        &self,
        handles: &[CiphertextHandle],
        target: Address,
    ) -> Result<DisclosureProof, EncryptionError> {
        self.ensure_initialized()?;
        self.disclosure_requests.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await;

        if let Some(reason) = self.faults.lock().await.disclosure.clone() {
            return Err(EncryptionError::Gateway(reason));
        }

        let cipher = self.cipher()?;
        let sealed = self.sealed.lock().await;

        let mut ordered = Vec::with_capacity(handles.len());
        for handle in handles {
            let entry = sealed
                .get(handle)
                .ok_or_else(|| EncryptionError::UnknownHandle(handle.to_hex()))?;
            if entry.target != target {
                return Err(EncryptionError::AccessDenied(handle.to_hex()));
            }

            let aad = binding(&entry.target, &entry.owner);
            let plaintext = cipher
                .decrypt(
                    Nonce::from_slice(&entry.nonce),
                    Payload {
                        msg: entry.ciphertext.as_slice(),
                        aad: &aad,
                    },
                )
                .map_err(|_| EncryptionError::Crypto)?;
            let bytes: [u8; 8] = plaintext
                .as_slice()
                .try_into()
                .map_err(|_| EncryptionError::Crypto)?;

            ordered.push(u64::from_le_bytes(bytes));
        }
        drop(sealed);

        let encoded_clear_values = encode_clear_values(&ordered);
        let proof = self.disclosure_proof(handles, &encoded_clear_values);

        Ok(DisclosureProof {
            clear_values: handles.iter().copied().zip(ordered).collect(),
            encoded_clear_values,
            proof: proof.as_bytes().to_vec(),
        })
    }
}

impl ProofVerifier for LocalEncryptionService {
    fn verify_input(
        &self,
        ciphertext: &CiphertextHandle,
        proof: &[u8],
        target: &Address,
        submitter: &Address,
    ) -> bool {
        proof_matches(self.input_proof(ciphertext, target, submitter), proof)
    }

    fn verify_disclosure(
        &self,
        handles: &[CiphertextHandle],
        clear_values: &[u8],
        proof: &[u8],
    ) -> bool {
        proof_matches(self.disclosure_proof(handles, clear_values), proof)
    }
}

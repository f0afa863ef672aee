#![allow(dead_code)]

use std::sync::Arc;

use paycloak_core::{
    Address, LifecycleConfig, LifecycleOrchestrator, LocalEncryptionService, MemoryLedger,
    RecordDraft, WalletSession,
};

pub const CONTRACT: Address = Address([0xC0; 20]);
pub const ALICE: Address = Address([0xA1; 20]);
pub const BOB: Address = Address([0xB0; 20]);

/// One caller wired to a ledger and encryption service
pub struct Harness {
    pub ledger: Arc<MemoryLedger>,
    pub fhe: Arc<LocalEncryptionService>,
    pub wallet: Arc<WalletSession>,
    pub orchestrator: LifecycleOrchestrator,
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Fresh ledger that checks proofs issued by a fresh encryption service
pub fn collaborators() -> (Arc<MemoryLedger>, Arc<LocalEncryptionService>) {
    let fhe = Arc::new(LocalEncryptionService::from_seed([7u8; 32]));
    let ledger = Arc::new(MemoryLedger::new(CONTRACT).with_verifier(fhe.clone()));
    (ledger, fhe)
}

pub fn harness_with(
    ledger: &Arc<MemoryLedger>,
    fhe: &Arc<LocalEncryptionService>,
    caller: Option<Address>,
) -> Harness {
    init_logging();
    let wallet = Arc::new(match caller {
        Some(address) => WalletSession::connected(address),
        None => WalletSession::disconnected(),
    });
    let orchestrator = LifecycleOrchestrator::new(
        wallet.clone(),
        ledger.clone(),
        fhe.clone(),
        LifecycleConfig::default(),
    );

    Harness {
        ledger: ledger.clone(),
        fhe: fhe.clone(),
        wallet,
        orchestrator,
    }
}

pub fn harness(caller: Option<Address>) -> Harness {
    let (ledger, fhe) = collaborators();
    harness_with(&ledger, &fhe, caller)
}

/// Connected harness with the encryption session ready
pub async fn started(caller: Address) -> Harness {
    let h = harness(Some(caller));
    h.orchestrator.start().await.unwrap();
    h
}

pub fn draft(label: &str, value: u64, experience_years: u32) -> RecordDraft {
    RecordDraft {
        label: label.to_string(),
        value,
        experience_years,
        public_attribute2: 0,
        industry: "Technology".to_string(),
    }
}

//! Paycloak core
//!
//! Confidential salary records: encrypted submission to a shared ledger,
//! verified decryption, and market benchmarking of the disclosed value.
//! No cleartext is produced or used except as the output of a decryption
//! the ledger has accepted.

pub mod config;
pub mod encryption;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod lifecycle;
pub mod record;

pub use config::LifecycleConfig;
pub use encryption::{EncryptionError, EncryptionService, LocalEncryptionService};
pub use error::{LifecycleError, ValidationError};
pub use identity::{IdentityProvider, WalletSession};
pub use ledger::{Ledger, LedgerError, MemoryLedger, ProofVerifier};
pub use lifecycle::{
    ComplianceMarker, DisclosureSource, LifecycleOrchestrator, OperationStatus, Phase,
    RecordDraft, RepositoryStats, SessionPhase, VerifiedValue,
};
pub use record::{Address, CiphertextHandle, Disclosure, Record, RecordId};

pub use paycloak_benchmark::{BenchmarkResult, MarketPosition, compute_benchmark};

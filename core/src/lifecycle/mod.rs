//! Lifecycle Orchestrator
//!
//! Drives confidential records through submission, verified decryption and
//! benchmarking. Every caller-facing operation runs under the status
//! tracker, so at most one is in flight at a time.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                        LifecycleOrchestrator                         │
//! │                                                                      │
//! │  identity ──▶ authorize ──▶ StatusTracker::begin                     │
//! │                                   │                                  │
//! │          ┌────────────────────────┴──────────────────────┐           │
//! │          ▼                                               ▼           │
//! │  ┌────────────────┐                              ┌────────────────┐  │
//! │  │   Submission   │── encrypt ──▶ Encryption ◀── │   Decryption   │  │
//! │  │    Pipeline    │               Session        │    Pipeline    │  │
//! │  └────────────────┘                              └────────────────┘  │
//! │          │ create_record                 verify proof │              │
//! │          ▼                                            ▼              │
//! │  ┌──────────────────────────── Ledger ─────────────────────────────┐ │
//! │  └─────────────────────────────────────────────────────────────────┘ │
//! │          │ refresh                                    │ value        │
//! │          ▼                                            ▼              │
//! │   RecordRepository                           Benchmark + Compliance  │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```

pub mod decryption;
pub mod repository;
pub mod session;
pub mod status;
pub mod submission;

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use paycloak_benchmark::{BenchmarkResult, compute_benchmark};
use serde::{Deserialize, Serialize};

use crate::config::LifecycleConfig;
use crate::encryption::EncryptionService;
use crate::error::LifecycleError;
use crate::identity::IdentityProvider;
use crate::ledger::Ledger;
use crate::record::{Address, Record, RecordId};

pub use decryption::{DecryptionPipeline, DisclosureSource, ResolvedValue};
pub use repository::{RecordRepository, RepositoryStats};
pub use session::{EncryptionSession, SessionPhase};
pub use status::{OperationStatus, PendingOperation, Phase, StatusTracker};
pub use submission::{RecordDraft, RecordIdGenerator, SubmissionPipeline};

// ============================================================================
// Outputs
// ============================================================================

/// Attests that a record's value came out of an accepted verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceMarker {
    pub record_id: RecordId,
    pub verified: bool,
    pub verified_at: DateTime<Utc>,
}

/// Result of a successful decryption
#[derive(Debug, Clone)]
pub struct VerifiedValue {
    pub record_id: RecordId,
    pub value: u64,
    pub source: DisclosureSource,
    pub benchmark: BenchmarkResult,
    pub compliance: ComplianceMarker,
}

#[derive(Debug, Default)]
struct Outcome {
    benchmark: Option<BenchmarkResult>,
    compliance: Option<ComplianceMarker>,
}

// ============================================================================
// Orchestrator
// ============================================================================

pub struct LifecycleOrchestrator {
    identity: Arc<dyn IdentityProvider>,
    ledger: Arc<dyn Ledger>,
    session: EncryptionSession,
    repository: RecordRepository,
    tracker: StatusTracker,
    ids: RecordIdGenerator,
    outcome: Mutex<Outcome>,
}

impl LifecycleOrchestrator {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        ledger: Arc<dyn Ledger>,
        encryption: Arc<dyn EncryptionService>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            identity,
            ledger,
            session: EncryptionSession::new(encryption),
            repository: RecordRepository::new(),
            tracker: StatusTracker::new(config.success_clear, config.error_clear),
            ids: RecordIdGenerator::new(),
            outcome: Mutex::new(Outcome::default()),
        }
    }

    fn outcome(&self) -> MutexGuard<'_, Outcome> {
        self.outcome.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Caller address, or `Unauthorized` with an error status posted
    pub fn authorize(&self) -> Result<Address, LifecycleError> {
        match self.identity.current_address() {
            Some(address) => Ok(address),
            None => {
                self.tracker.report_error("Please connect wallet first");
                Err(LifecycleError::Unauthorized)
            }
        }
    }

    /// Initialize the encryption session. Safe to call repeatedly; a failed
    /// attempt can be retried.
    pub async fn initialize_session(&self) -> Result<(), LifecycleError> {
        self.session.ensure_ready().await.map_err(|e| {
            error!("FHE initialization failed: {}", e);
            self.tracker.report_error("FHE initialization failed");
            LifecycleError::ServiceInit(e.to_string())
        })
    }

    /// Reload the working set from the ledger
    pub async fn refresh(&self) -> Result<usize, LifecycleError> {
        match self.repository.refresh(self.ledger.as_ref()).await {
            Ok(count) => Ok(count),
            Err(e) => {
                warn!("Failed to load data: {}", e);
                self.tracker.report_error("Failed to load data");
                Err(e.into())
            }
        }
    }

    /// Initialize the session and load records. Loading is attempted even
    /// if initialization fails; the first error is returned.
    pub async fn start(&self) -> Result<(), LifecycleError> {
        let initialized = self.initialize_session().await;
        let loaded = self.refresh().await;
        initialized?;
        let count = loaded?;
        info!("Lifecycle started with {} records", count);
        Ok(())
    }

    /// Encrypt and store a new record owned by the caller
    pub async fn submit_record(&self, draft: RecordDraft) -> Result<Record, LifecycleError> {
        let caller = self.authorize()?;
        let op = self.tracker.begin("Encrypting salary with FHE...")?;

        let pipeline = SubmissionPipeline {
            ledger: self.ledger.as_ref(),
            session: &self.session,
            repository: &self.repository,
            ids: &self.ids,
        };

        match pipeline.run(caller, &draft, &op).await {
            Ok(record) => {
                op.succeed("Salary encrypted and stored successfully!");
                Ok(record)
            }
            Err(LifecycleError::UserDeclined) => {
                op.fail("Transaction rejected");
                Err(LifecycleError::UserDeclined)
            }
            Err(e) => {
                warn!("Submission failed: {}", e);
                op.fail(format!("Submission failed: {e}"));
                Err(e)
            }
        }
    }

    /// Resolve the authoritative value of record `id` and benchmark it
    pub async fn decrypt_record(&self, id: &str) -> Result<VerifiedValue, LifecycleError> {
        let caller = self.authorize()?;
        let op = self.tracker.begin("Verifying decryption...")?;

        let pipeline = DecryptionPipeline {
            ledger: self.ledger.as_ref(),
            session: &self.session,
        };

        let resolved = match pipeline.run(caller, id, &op).await {
            Ok(resolved) => resolved,
            Err(LifecycleError::UserDeclined) => {
                op.fail("Transaction rejected");
                return Err(LifecycleError::UserDeclined);
            }
            Err(e) => {
                warn!("Decryption of {} failed: {}", id, e);
                op.fail(format!("Decryption failed: {e}"));
                return Err(e);
            }
        };

        let benchmark = compute_benchmark(resolved.value, resolved.record.experience_years());
        let compliance = ComplianceMarker {
            record_id: resolved.record.id.clone(),
            verified: true,
            verified_at: Utc::now(),
        };
        {
            let mut outcome = self.outcome();
            outcome.benchmark = Some(benchmark.clone());
            outcome.compliance = Some(compliance.clone());
        }

        if resolved.source != DisclosureSource::Cached {
            if let Err(e) = self.repository.refresh(self.ledger.as_ref()).await {
                warn!("Refresh after verifying {} failed: {}", id, e);
            }
        }

        op.succeed(match resolved.source {
            DisclosureSource::Verified => "Salary verified successfully!",
            DisclosureSource::VerifiedElsewhere => "Data is already verified",
            DisclosureSource::Cached => "Verified value loaded from ledger",
        });

        Ok(VerifiedValue {
            record_id: resolved.record.id,
            value: resolved.value,
            source: resolved.source,
            benchmark,
            compliance,
        })
    }

    /// Ask the ledger whether the record contract is serving
    pub async fn check_availability(&self) -> Result<bool, LifecycleError> {
        let op = self.tracker.begin("Checking availability...")?;
        match self.ledger.check_service_availability().await {
            Ok(available) => {
                op.succeed(format!("Contract is available: {available}"));
                Ok(available)
            }
            Err(e) => {
                warn!("Availability check failed: {}", e);
                op.fail("Availability check failed");
                Err(e.into())
            }
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn status(&self) -> OperationStatus {
        self.tracker.current()
    }

    pub fn session_phase(&self) -> SessionPhase {
        self.session.phase()
    }

    pub async fn records(&self) -> Vec<Record> {
        self.repository.records().await
    }

    /// Records owned by the connected caller; empty when disconnected
    pub async fn my_records(&self) -> Vec<Record> {
        match self.identity.current_address() {
            Some(address) => self.repository.owned_by(&address).await,
            None => Vec::new(),
        }
    }

    pub async fn stats(&self) -> RepositoryStats {
        self.repository.stats().await
    }

    /// Benchmark from the most recent successful decryption
    pub fn benchmark(&self) -> Option<BenchmarkResult> {
        self.outcome().benchmark.clone()
    }

    pub fn compliance(&self) -> Option<ComplianceMarker> {
        self.outcome().compliance.clone()
    }
}

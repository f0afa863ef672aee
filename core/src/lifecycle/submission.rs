//! Submission Pipeline
//!
//! ```text
//!   validate ──▶ encrypt(target, caller, value) ──▶ create_record ──▶ refresh
//!      │                  │                              │
//!      ▼                  ▼                              ▼
//!  Validation      no ledger call made           UserDeclined / Protocol
//! ```
//!
//! An encryption failure aborts before the ledger is touched, and a failed
//! ledger call leaves no record behind. Neither is retried.

use std::sync::atomic::{AtomicU64, Ordering};

use log::{info, warn};
use rand::Rng;

use super::repository::RecordRepository;
use super::session::EncryptionSession;
use super::status::PendingOperation;
use crate::error::{LifecycleError, ValidationError};
use crate::ledger::{CreateRecord, Ledger};
use crate::record::{Address, Disclosure, RECORD_ID_PREFIX, Record, RecordId};

/// A salary record as entered by the submitter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDraft {
    /// Position title
    pub label: String,
    /// Salary, kept confidential
    pub value: u64,
    pub experience_years: u32,
    pub public_attribute2: u32,
    pub industry: String,
}

impl RecordDraft {
    /// Parse a draft from raw form fields
    pub fn parse(
        label: &str,
        salary: &str,
        industry: &str,
        experience: &str,
    ) -> Result<Self, ValidationError> {
        let draft = Self {
            label: required("label", label)?.to_string(),
            value: parse_number("salary", salary)?,
            experience_years: parse_number("experience", experience)?,
            public_attribute2: 0,
            industry: required("industry", industry)?.to_string(),
        };
        draft.validate()?;
        Ok(draft)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        required("label", &self.label)?;
        required("industry", &self.industry)?;
        if self.value == 0 {
            return Err(ValidationError::ZeroValue);
        }
        Ok(())
    }

    /// Free text stored next to the ciphertext
    pub fn metadata(&self) -> String {
        format!(
            "Industry: {}, Experience: {} years",
            self.industry.trim(),
            self.experience_years
        )
    }
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(trimmed)
    }
}

fn parse_number<T: std::str::FromStr>(field: &'static str, raw: &str) -> Result<T, ValidationError> {
    required(field, raw)?
        .parse()
        .map_err(|_| ValidationError::InvalidNumber {
            field,
            value: raw.to_string(),
        })
}

/// Generates `salary-<unix millis>-<random hex>` identifiers. The millis
/// part is strictly increasing per generator; the random suffix keeps
/// concurrent submitters on one ledger apart.
#[derive(Debug, Default)]
pub struct RecordIdGenerator {
    last: AtomicU64,
}

impl RecordIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> RecordId {
        let now = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| {
                Some(now.max(prev + 1))
            })
            .unwrap_or(now);
        let millis = now.max(previous + 1);
        let suffix: u32 = rand::thread_rng().r#gen();
        format!("{RECORD_ID_PREFIX}{millis}-{suffix:08x}")
    }
}

pub struct SubmissionPipeline<'a> {
    pub ledger: &'a dyn Ledger,
    pub session: &'a EncryptionSession,
    pub repository: &'a RecordRepository,
    pub ids: &'a RecordIdGenerator,
}

impl SubmissionPipeline<'_> {
    /// Encrypt `draft` and commit it as a new record owned by `caller`
    pub async fn run(
        &self,
        caller: Address,
        draft: &RecordDraft,
        op: &PendingOperation,
    ) -> Result<Record, LifecycleError> {
        draft.validate()?;
        if !self.session.is_ready() {
            return Err(LifecycleError::ServiceInit(
                "encryption session not initialized".to_string(),
            ));
        }

        let target = self.ledger.address();
        op.progress("Encrypting salary with FHE...");
        let input = self
            .session
            .service()
            .encrypt(target, caller, draft.value)
            .await?;

        let id = self.ids.next_id();
        op.progress("Submitting encrypted salary...");
        let request = CreateRecord {
            id: id.clone(),
            label: draft.label.trim().to_string(),
            ciphertext: input.handle,
            input_proof: input.proof,
            public_attribute1: draft.experience_years,
            public_attribute2: draft.public_attribute2,
            metadata: draft.metadata(),
        };
        let confirmation = self.ledger.create_record(caller, request.clone()).await?;

        info!(
            "Record {} submitted by {} (tx {}, block {})",
            id, caller, confirmation.tx_id, confirmation.block
        );

        if let Err(e) = self.repository.refresh(self.ledger).await {
            warn!("Refresh after submitting {} failed: {}", id, e);
        }

        if let Some(record) = self.repository.get(&id).await {
            return Ok(record);
        }
        match self.ledger.get_record(&id).await {
            Ok(record) => Ok(record),
            Err(e) => {
                // committed but not yet readable
                warn!("Could not read back {} after commit: {}", id, e);
                Ok(pending_copy(caller, request))
            }
        }
    }
}

/// Local view of a committed record the ledger cannot serve yet
fn pending_copy(owner: Address, request: CreateRecord) -> Record {
    Record {
        id: request.id,
        label: request.label,
        encrypted_handle: request.ciphertext,
        public_attribute1: request.public_attribute1,
        public_attribute2: request.public_attribute2,
        metadata: request.metadata,
        created_at: chrono::Utc::now().timestamp().max(0) as u64,
        owner,
        disclosure: Disclosure::Sealed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_form_fields() {
        let draft = RecordDraft::parse(" Backend Engineer ", "98000", "Tech", "6").unwrap();
        assert_eq!(draft.label, "Backend Engineer");
        assert_eq!(draft.value, 98_000);
        assert_eq!(draft.experience_years, 6);
        assert_eq!(draft.metadata(), "Industry: Tech, Experience: 6 years");
    }

    #[test]
    fn test_missing_fields_rejected() {
        assert_eq!(
            RecordDraft::parse("", "98000", "Tech", "6"),
            Err(ValidationError::MissingField("label"))
        );
        assert_eq!(
            RecordDraft::parse("Engineer", "  ", "Tech", "6"),
            Err(ValidationError::MissingField("salary"))
        );
        assert_eq!(
            RecordDraft::parse("Engineer", "98000", "", "6"),
            Err(ValidationError::MissingField("industry"))
        );
        assert_eq!(
            RecordDraft::parse("Engineer", "98000", "Tech", ""),
            Err(ValidationError::MissingField("experience"))
        );
    }

    #[test]
    fn test_zero_and_malformed_values_rejected() {
        assert_eq!(
            RecordDraft::parse("Engineer", "0", "Tech", "6"),
            Err(ValidationError::ZeroValue)
        );
        assert!(matches!(
            RecordDraft::parse("Engineer", "-5", "Tech", "6"),
            Err(ValidationError::InvalidNumber { field: "salary", .. })
        ));
        assert!(matches!(
            RecordDraft::parse("Engineer", "98000", "Tech", "six"),
            Err(ValidationError::InvalidNumber { field: "experience", .. })
        ));
    }

    #[test]
    fn test_zero_experience_is_accepted() {
        let draft = RecordDraft::parse("Intern", "30000", "Tech", "0").unwrap();
        assert_eq!(draft.experience_years, 0);
    }

    #[test]
    fn test_ids_are_unique_and_prefixed() {
        let ids = RecordIdGenerator::new();
        let generated: Vec<RecordId> = (0..100).map(|_| ids.next_id()).collect();

        assert!(generated.iter().all(|id| id.starts_with(RECORD_ID_PREFIX)));
        let (millis, suffix) = generated[0][RECORD_ID_PREFIX.len()..]
            .split_once('-')
            .unwrap();
        assert!(millis.parse::<u64>().is_ok());
        assert_eq!(suffix.len(), 8);
        let mut deduped = generated.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), generated.len());
    }
}

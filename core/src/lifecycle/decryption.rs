//! Verified Decryption Pipeline
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │ 0. get_record ── verified? ──yes──▶ return disclosed value      │
//! │         │ no                                                    │
//! │ 1. get_ciphertext_handle                                        │
//! │ 2. request_disclosure   (encryption service: clear + proof)     │
//! │ 3. submit_verification_proof                                    │
//! │         ├── accepted ─────────┐                                 │
//! │         ├── AlreadyVerified ──┤  (another actor won the race)   │
//! │         └── other ──▶ error   │                                 │
//! │ 4. get_record ◀───────────────┘  ledger value is authoritative  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use log::{debug, info, warn};

use super::session::EncryptionSession;
use super::status::PendingOperation;
use crate::error::LifecycleError;
use crate::ledger::{Ledger, LedgerError};
use crate::record::{Address, Record};

/// How the authoritative value was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisclosureSource {
    /// The record was already verified; no cryptographic work was done
    Cached,
    /// Our proof was accepted by the ledger
    Verified,
    /// Another actor's proof was accepted first
    VerifiedElsewhere,
}

#[derive(Debug, Clone)]
pub struct ResolvedValue {
    /// The record as re-read after resolution
    pub record: Record,
    pub value: u64,
    pub source: DisclosureSource,
}

pub struct DecryptionPipeline<'a> {
    pub ledger: &'a dyn Ledger,
    pub session: &'a EncryptionSession,
}

impl DecryptionPipeline<'_> {
    /// Resolve the authoritative cleartext of record `id`
    pub async fn run(
        &self,
        caller: Address,
        id: &str,
        op: &PendingOperation,
    ) -> Result<ResolvedValue, LifecycleError> {
        let record = self.ledger.get_record(id).await?;
        if let Some(value) = record.disclosed_value() {
            debug!("Record {} already verified, skipping handshake", id);
            return Ok(ResolvedValue {
                record,
                value,
                source: DisclosureSource::Cached,
            });
        }

        if !self.session.is_ready() {
            return Err(LifecycleError::ServiceInit(
                "encryption session not initialized".to_string(),
            ));
        }

        let target = self.ledger.address();
        let handle = self.ledger.get_ciphertext_handle(id).await?;
        let disclosure = self
            .session
            .service()
            .request_disclosure(&[handle], target)
            .await?;
        let clear_value = disclosure.clear_value(&handle).ok_or_else(|| {
            LifecycleError::Protocol(format!("disclosure is missing handle {handle}"))
        })?;

        op.progress("Verifying decryption...");
        let source = match self
            .ledger
            .submit_verification_proof(
                caller,
                id,
                &disclosure.encoded_clear_values,
                &disclosure.proof,
            )
            .await
        {
            Ok(confirmation) => {
                info!(
                    "Verification of {} accepted (tx {}, block {})",
                    id, confirmation.tx_id, confirmation.block
                );
                DisclosureSource::Verified
            }
            Err(LedgerError::AlreadyVerified(_)) => {
                info!("Record {} was verified by another actor first", id);
                DisclosureSource::VerifiedElsewhere
            }
            Err(e) => return Err(e.into()),
        };

        let record = self.ledger.get_record(id).await?;
        let value = record.disclosed_value().ok_or_else(|| {
            LifecycleError::Protocol(format!("record {id} is not verified after acceptance"))
        })?;

        if value != clear_value {
            warn!(
                "Ledger value for {} differs from local disclosure ({:?}); using ledger value",
                id, source
            );
        }

        Ok(ResolvedValue {
            record,
            value,
            source,
        })
    }
}

//! Lifecycle error taxonomy
//!
//! Collaborator errors ([`LedgerError`], [`EncryptionError`]) are translated
//! into [`LifecycleError`] at the pipeline boundary. The ledger's
//! "already verified" rejection never reaches this type: the decryption
//! pipeline turns it into a success.

use thiserror::Error;

use crate::encryption::EncryptionError;
use crate::ledger::LedgerError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("{field} must be a non-negative integer, got {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("salary must be greater than zero")]
    ZeroValue,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// No authenticated address
    #[error("not authorized: connect a wallet first")]
    Unauthorized,

    /// The encryption session is not ready
    #[error("encryption service unavailable: {0}")]
    ServiceInit(String),

    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// The caller rejected the ledger transaction prompt
    #[error("transaction rejected by user")]
    UserDeclined,

    /// Another operation is still pending
    #[error("another operation is already in progress")]
    Busy,

    /// Any other collaborator failure, surfaced verbatim
    #[error("{0}")]
    Protocol(String),
}

impl From<LedgerError> for LifecycleError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::UserRejected => LifecycleError::UserDeclined,
            other => LifecycleError::Protocol(other.to_string()),
        }
    }
}

impl From<EncryptionError> for LifecycleError {
    fn from(err: EncryptionError) -> Self {
        match err {
            EncryptionError::NotInitialized | EncryptionError::InitFailed(_) => {
                LifecycleError::ServiceInit(err.to_string())
            }
            other => LifecycleError::Protocol(other.to_string()),
        }
    }
}

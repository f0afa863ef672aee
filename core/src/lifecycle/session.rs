//! Encryption session lifecycle
//!
//! The encryption service must be initialized once per session before it
//! can encrypt or disclose anything.
//!
//! ```text
//!   Uninitialized ──ensure_ready()──▶ Initializing ──ok──▶ Ready
//!         ▲                                │
//!         └──────────────err───────────────┘
//! ```
//!
//! Concurrent `ensure_ready` calls share one initialization attempt and all
//! see its outcome, failure included. A failed attempt leaves the session
//! uninitialized so a later call can retry.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use log::{info, warn};
use tokio::sync::Mutex;

use crate::encryption::{EncryptionError, EncryptionService};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Initializing,
    Ready,
}

#[derive(Debug, Default)]
struct Attempts {
    /// Completed initialization attempts
    completed: u64,
    /// Outcome of the latest attempt, `None` on success
    last_error: Option<EncryptionError>,
}

/// Shared, initialize-once wrapper around an encryption service
pub struct EncryptionSession {
    service: Arc<dyn EncryptionService>,
    ready: AtomicBool,
    initializing: AtomicBool,
    /// Mirror of `Attempts::completed`, readable without the lock
    completed: AtomicU64,
    attempts: Mutex<Attempts>,
}

impl EncryptionSession {
    pub fn new(service: Arc<dyn EncryptionService>) -> Self {
        Self {
            service,
            ready: AtomicBool::new(false),
            initializing: AtomicBool::new(false),
            completed: AtomicU64::new(0),
            attempts: Mutex::new(Attempts::default()),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        if self.is_ready() {
            SessionPhase::Ready
        } else if self.initializing.load(Ordering::SeqCst) {
            SessionPhase::Initializing
        } else {
            SessionPhase::Uninitialized
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Initialize the service unless it already is
    pub async fn ensure_ready(&self) -> Result<(), EncryptionError> {
        if self.is_ready() {
            return Ok(());
        }

        let observed = self.completed.load(Ordering::SeqCst);
        let mut attempts = self.attempts.lock().await;
        if self.is_ready() {
            return Ok(());
        }

        // an attempt finished while we waited for the lock: share its outcome
        if attempts.completed != observed {
            return match &attempts.last_error {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            };
        }

        self.initializing.store(true, Ordering::SeqCst);
        let result = self.service.initialize_session().await;
        self.initializing.store(false, Ordering::SeqCst);

        attempts.completed += 1;
        self.completed.store(attempts.completed, Ordering::SeqCst);

        match &result {
            Ok(()) => {
                attempts.last_error = None;
                self.ready.store(true, Ordering::SeqCst);
                info!("Encryption session ready");
            }
            Err(e) => {
                attempts.last_error = Some(e.clone());
                warn!("Encryption session initialization failed: {}", e);
            }
        }
        result
    }

    /// The underlying service. Callers check [`is_ready`](Self::is_ready) first.
    pub fn service(&self) -> &dyn EncryptionService {
        self.service.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryption::LocalEncryptionService;

    #[tokio::test]
    async fn test_concurrent_initialization_collapses() {
        let service = Arc::new(LocalEncryptionService::from_seed([1u8; 32]));
        let session = EncryptionSession::new(service.clone());
        assert_eq!(session.phase(), SessionPhase::Uninitialized);

        let (a, b, c) = tokio::join!(
            session.ensure_ready(),
            session.ensure_ready(),
            session.ensure_ready()
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(service.init_calls(), 1);
        assert_eq!(session.phase(), SessionPhase::Ready);

        session.ensure_ready().await.unwrap();
        assert_eq!(service.init_calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_a_failure() {
        let service = Arc::new(LocalEncryptionService::from_seed([1u8; 32]));
        service.fail_next_init().await;
        let session = EncryptionSession::new(service.clone());

        let (a, b, c) = tokio::join!(
            session.ensure_ready(),
            session.ensure_ready(),
            session.ensure_ready()
        );
        for result in [a, b, c] {
            assert!(matches!(result, Err(EncryptionError::InitFailed(_))));
        }
        assert_eq!(service.init_calls(), 1);
        assert_eq!(session.phase(), SessionPhase::Uninitialized);

        session.ensure_ready().await.unwrap();
        assert_eq!(service.init_calls(), 2);
        assert!(session.is_ready());
    }

    #[tokio::test]
    async fn test_failed_initialization_is_retryable() {
        let service = Arc::new(LocalEncryptionService::from_seed([1u8; 32]));
        service.fail_next_init().await;
        let session = EncryptionSession::new(service.clone());

        assert!(matches!(
            session.ensure_ready().await,
            Err(EncryptionError::InitFailed(_))
        ));
        assert_eq!(session.phase(), SessionPhase::Uninitialized);

        session.ensure_ready().await.unwrap();
        assert!(session.is_ready());
        assert_eq!(service.init_calls(), 2);
    }
}

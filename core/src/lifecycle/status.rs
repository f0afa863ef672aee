//! Operation Status Tracker
//!
//! ```text
//!            begin()                  succeed()
//!   ┌──────┐ ──────▶ ┌─────────┐ ───────────────▶ ┌─────────┐
//!   │ Idle │         │ Pending │                  │ Success │──┐
//!   └──────┘ ◀────┐  └─────────┘ ───────────────▶ └─────────┘  │
//!       ▲         │               fail()          ┌─────────┐  │
//!       │         │                               │  Error  │──┤
//!       │         │                               └─────────┘  │
//!       │         └──────── after success/error delay ─────────┘
//! ```
//!
//! Only one operation can be pending: `begin` while pending fails with
//! [`LifecycleError::Busy`] and leaves the pending message untouched.
//! Expiry is evaluated against `tokio::time::Instant`, so a paused test
//! clock controls it.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

use crate::error::LifecycleError;

pub const DEFAULT_SUCCESS_CLEAR: Duration = Duration::from_millis(2000);
pub const DEFAULT_ERROR_CLEAR: Duration = Duration::from_millis(3000);

const ABANDONED_MESSAGE: &str = "Operation abandoned";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Pending,
    Success,
    Error,
}

/// Snapshot of the tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationStatus {
    pub phase: Phase,
    pub message: String,
}

impl OperationStatus {
    pub fn idle() -> Self {
        Self {
            phase: Phase::Idle,
            message: String::new(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.phase == Phase::Pending
    }
}

#[derive(Debug)]
struct TrackerState {
    status: OperationStatus,
    /// When the current success/error status returns to idle
    clears_at: Option<Instant>,
    /// Bumped on every begin so stale handles cannot write
    generation: u64,
}

impl TrackerState {
    fn expire(&mut self) {
        if let Some(deadline) = self.clears_at {
            if Instant::now() >= deadline {
                self.status = OperationStatus::idle();
                self.clears_at = None;
            }
        }
    }

    fn settle(&mut self, phase: Phase, message: String, delay: Duration) {
        self.status = OperationStatus { phase, message };
        self.clears_at = Some(Instant::now() + delay);
    }
}

#[derive(Debug)]
struct Shared {
    state: Mutex<TrackerState>,
    success_clear: Duration,
    error_clear: Duration,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn delay_for(&self, phase: Phase) -> Duration {
        match phase {
            Phase::Error => self.error_clear,
            _ => self.success_clear,
        }
    }
}

/// Tracks the lifecycle of the operation currently in flight
#[derive(Debug, Clone)]
pub struct StatusTracker {
    shared: Arc<Shared>,
}

impl StatusTracker {
    pub fn new(success_clear: Duration, error_clear: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(TrackerState {
                    status: OperationStatus::idle(),
                    clears_at: None,
                    generation: 0,
                }),
                success_clear,
                error_clear,
            }),
        }
    }

    /// Current status, after applying any due auto-clear
    pub fn current(&self) -> OperationStatus {
        let mut state = self.shared.lock();
        state.expire();
        state.status.clone()
    }

    /// Start an operation
    pub fn begin(&self, message: impl Into<String>) -> Result<PendingOperation, LifecycleError> {
        let mut state = self.shared.lock();
        state.expire();
        if state.status.is_pending() {
            return Err(LifecycleError::Busy);
        }

        state.generation += 1;
        state.clears_at = None;
        state.status = OperationStatus {
            phase: Phase::Pending,
            message: message.into(),
        };

        Ok(PendingOperation {
            shared: Arc::clone(&self.shared),
            generation: state.generation,
            resolved: false,
        })
    }

    /// Post a one-off error outside any operation.
    /// Ignored while an operation is pending.
    pub fn report_error(&self, message: impl Into<String>) {
        let mut state = self.shared.lock();
        state.expire();
        if state.status.is_pending() {
            return;
        }
        let delay = self.shared.delay_for(Phase::Error);
        state.settle(Phase::Error, message.into(), delay);
    }
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new(DEFAULT_SUCCESS_CLEAR, DEFAULT_ERROR_CLEAR)
    }
}

/// Handle to the pending operation. Dropping it unresolved records an error.
#[derive(Debug)]
pub struct PendingOperation {
    shared: Arc<Shared>,
    generation: u64,
    resolved: bool,
}

impl PendingOperation {
    /// Replace the pending message
    pub fn progress(&self, message: impl Into<String>) {
        let mut state = self.shared.lock();
        if state.generation == self.generation && state.status.is_pending() {
            state.status.message = message.into();
        }
    }

    pub fn succeed(mut self, message: impl Into<String>) {
        self.resolve(Phase::Success, message.into());
    }

    pub fn fail(mut self, message: impl Into<String>) {
        self.resolve(Phase::Error, message.into());
    }

    fn resolve(&mut self, phase: Phase, message: String) {
        self.resolved = true;
        let mut state = self.shared.lock();
        if state.generation != self.generation || !state.status.is_pending() {
            return;
        }
        let delay = self.shared.delay_for(phase);
        state.settle(phase, message, delay);
    }
}

impl Drop for PendingOperation {
    fn drop(&mut self) {
        if !self.resolved {
            self.resolve(Phase::Error, ABANDONED_MESSAGE.to_string());
        }
    }
}

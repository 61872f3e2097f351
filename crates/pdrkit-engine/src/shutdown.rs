//! Cooperative cancellation for PDR runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::PdrError;

pub(crate) fn deadline_exceeded(deadline: Option<Instant>) -> bool {
    match deadline {
        Some(deadline) => Instant::now() >= deadline,
        None => false,
    }
}

pub(crate) fn deadline_from_timeout_secs(timeout_secs: u64) -> Option<Instant> {
    if timeout_secs == 0 {
        return None;
    }
    Instant::now().checked_add(Duration::from_secs(timeout_secs))
}

/// Cloneable shutdown handle.
///
/// Every clone observes the same request flag, so a handle given to another
/// thread can stop a run in progress. The run polls
/// [`ShutdownNotifier::check`] between solver queries.
#[derive(Debug, Clone, Default)]
pub struct ShutdownNotifier {
    requested: Arc<AtomicBool>,
    reason: Arc<Mutex<Option<String>>>,
    deadline: Option<Instant>,
    timeout_secs: u64,
}

impl ShutdownNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same flag, with a wall-clock deadline `timeout_secs` from now.
    /// Zero leaves the handle without a deadline.
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.deadline = deadline_from_timeout_secs(timeout_secs);
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn has_deadline(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn request_shutdown(&self, reason: impl Into<String>) {
        if let Ok(mut slot) = self.reason.lock() {
            if slot.is_none() {
                *slot = Some(reason.into());
            }
        }
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn should_shutdown(&self) -> bool {
        self.requested.load(Ordering::SeqCst) || deadline_exceeded(self.deadline)
    }

    pub fn reason(&self) -> Option<String> {
        if self.requested.load(Ordering::SeqCst) {
            let recorded = self.reason.lock().ok().and_then(|slot| slot.clone());
            return Some(recorded.unwrap_or_else(|| "shutdown requested".into()));
        }
        if deadline_exceeded(self.deadline) {
            return Some(format!("timed out after {}s", self.timeout_secs));
        }
        None
    }

    pub fn check(&self) -> Result<(), PdrError> {
        match self.reason() {
            Some(reason) => Err(PdrError::Cancelled(reason)),
            None => Ok(()),
        }
    }
}

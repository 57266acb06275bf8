//! Pass status bookkeeping.
//!
//! The `PassRegistry` records the outcome of every pass attempt (scheduled
//! or on demand): last run time, duration, result and running totals.

use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of a pass attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum PassResult {
    /// Pass completed
    Success,
    /// Pass failed with an error message
    Failed(String),
    /// Pass was skipped (another pass was running)
    Skipped(String),
}

/// How a pass was started.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PassTrigger {
    Scheduled,
    Manual,
}

impl std::fmt::Display for PassTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PassTrigger::Scheduled => write!(f, "scheduled"),
            PassTrigger::Manual => write!(f, "manual"),
        }
    }
}

/// Snapshot of pass history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PassStatus {
    /// When the last pass finished
    pub last_run: Option<DateTime<Utc>>,
    /// Duration of the last pass in milliseconds
    pub last_duration_ms: Option<u64>,
    /// Result of the last attempt (including skips)
    pub last_result: Option<PassResult>,
    /// Passes that ran to completion or failure
    pub run_count: u64,
    pub error_count: u64,
    pub skip_count: u64,
    /// Groups formed across all passes
    pub matched_groups: u64,
    /// Tickets matched across all passes
    pub matched_tickets: u64,
    /// Whether a pass is currently executing
    pub is_running: bool,
}

/// Thread-safe pass status.
///
/// # Example
///
/// ```
/// use matchmaker_scheduler::{PassRegistry, PassResult};
///
/// let registry = PassRegistry::new();
/// registry.record_start();
/// assert!(registry.is_running());
///
/// registry.record_complete(PassResult::Success, 12, 3, 6);
/// assert!(!registry.is_running());
/// assert_eq!(registry.status().matched_groups, 3);
/// ```
#[derive(Debug, Default)]
pub struct PassRegistry {
    status: RwLock<PassStatus>,
}

impl PassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a pass has started executing.
    pub fn record_start(&self) {
        let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
        status.is_running = true;
    }

    /// Record that a pass has finished.
    ///
    /// `Success` adds the match counts; `Failed` bumps the error count.
    pub fn record_complete(
        &self,
        result: PassResult,
        duration_ms: u64,
        groups: usize,
        tickets: usize,
    ) {
        let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
        status.is_running = false;
        status.last_run = Some(Utc::now());
        status.last_duration_ms = Some(duration_ms);
        status.run_count += 1;
        match &result {
            PassResult::Success => {
                status.matched_groups += groups as u64;
                status.matched_tickets += tickets as u64;
            }
            PassResult::Failed(_) => status.error_count += 1,
            PassResult::Skipped(_) => {}
        }
        status.last_result = Some(result);
    }

    /// Record a tick that found a pass already running.
    ///
    /// Does not touch the running flag or the run count.
    pub fn record_skipped(&self, reason: &str) {
        let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
        status.skip_count += 1;
        status.last_result = Some(PassResult::Skipped(reason.to_string()));
    }

    pub fn status(&self) -> PassStatus {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_running(&self) -> bool {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_running
    }
}

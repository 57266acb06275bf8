//! Error types for the scheduler crate.

use matchmaker_core::MatchmakerError;
use thiserror::Error;
use tokio_cron_scheduler::JobSchedulerError;

/// Errors that can occur during scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Error from the underlying tokio-cron-scheduler
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// Unusable pass interval
    #[error("Invalid interval: {0}")]
    InvalidInterval(String),

    /// Scheduler is already running
    #[error("Scheduler is already running")]
    AlreadyRunning,

    /// Scheduler is not running
    #[error("Scheduler is not running")]
    NotRunning,

    /// Scheduler was shut down; it cannot be restarted
    #[error("Scheduler is stopped")]
    Stopped,

    /// Another pass holds the overlap guard
    #[error("A pass is already in progress")]
    PassInProgress,

    /// The pass itself failed
    #[error("Pass failed: {0}")]
    Pass(#[from] MatchmakerError),

    /// The blocking pass task panicked or was cancelled
    #[error("Pass task failed: {0}")]
    Task(String),
}

impl From<JobSchedulerError> for SchedulerError {
    fn from(err: JobSchedulerError) -> Self {
        SchedulerError::Scheduler(err.to_string())
    }
}

//! Pass scheduler built on tokio-cron-scheduler.
//!
//! A repeated job fires every `interval_ms`. Each tick tries the overlap
//! guard; a busy guard means the tick is skipped. The pass itself runs on
//! the blocking pool since `Matchmaker::process` is synchronous.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use matchmaker_core::{Matchmaker, PassReport};
use serde::{Deserialize, Serialize};
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::overlap::OverlapGuard;
use crate::registry::{PassRegistry, PassResult, PassTrigger};
use crate::{SchedulerConfig, SchedulerError};

/// Lifecycle state. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

/// Everything a tick needs; cloned into the repeated job.
#[derive(Clone)]
struct PassRunner {
    matchmaker: Arc<Matchmaker>,
    guard: Arc<OverlapGuard>,
    registry: Arc<PassRegistry>,
    shutdown_token: CancellationToken,
}

impl PassRunner {
    async fn run(&self, trigger: PassTrigger) -> Result<PassReport, SchedulerError> {
        if self.shutdown_token.is_cancelled() {
            return Err(SchedulerError::Stopped);
        }

        let Some(run_guard) = self.guard.try_acquire() else {
            debug!(%trigger, "Pass still running, skipping");
            self.registry.record_skipped("pass in progress");
            return Err(SchedulerError::PassInProgress);
        };

        self.registry.record_start();
        let start = Instant::now();
        let matchmaker = self.matchmaker.clone();

        // The guard moves into the blocking task so it is held until the
        // pass really ends, even if this future is dropped.
        let joined = tokio::task::spawn_blocking(move || {
            let _run = run_guard;
            matchmaker.process()
        })
        .await;

        let duration_ms = start.elapsed().as_millis() as u64;
        match joined {
            Ok(Ok(report)) => {
                self.registry.record_complete(
                    PassResult::Success,
                    duration_ms,
                    report.matched.len(),
                    report.matched_tickets(),
                );
                debug!(%trigger, groups = report.matched.len(), duration_ms, "Pass finished");
                Ok(report)
            }
            Ok(Err(e)) => {
                warn!(%trigger, error = %e, "Pass failed");
                self.registry
                    .record_complete(PassResult::Failed(e.to_string()), duration_ms, 0, 0);
                Err(SchedulerError::Pass(e))
            }
            Err(e) => {
                warn!(%trigger, error = %e, "Pass task failed");
                self.registry
                    .record_complete(PassResult::Failed(e.to_string()), duration_ms, 0, 0);
                Err(SchedulerError::Task(e.to_string()))
            }
        }
    }
}

/// Drives `Matchmaker::process` on a fixed interval.
///
/// Created idle; `start()` begins ticking; `shutdown()` stops ticking and
/// waits (bounded by `shutdown_timeout_secs`) for the pass in flight.
pub struct MatchmakerScheduler {
    scheduler: JobScheduler,
    config: SchedulerConfig,
    runner: PassRunner,
    state: Mutex<SchedulerState>,
    job_id: Mutex<Option<Uuid>>,
}

impl MatchmakerScheduler {
    pub async fn new(
        matchmaker: Arc<Matchmaker>,
        config: SchedulerConfig,
    ) -> Result<Self, SchedulerError> {
        config.validate()?;
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler,
            config,
            runner: PassRunner {
                matchmaker,
                guard: Arc::new(OverlapGuard::new()),
                registry: Arc::new(PassRegistry::new()),
                shutdown_token: CancellationToken::new(),
            },
            state: Mutex::new(SchedulerState::Idle),
            job_id: Mutex::new(None),
        })
    }

    fn set_state(&self, next: SchedulerState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }

    /// Start ticking.
    ///
    /// # Errors
    ///
    /// `AlreadyRunning` if started, `Stopped` after shutdown.
    pub async fn start(&self) -> Result<(), SchedulerError> {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            match *state {
                SchedulerState::Running => return Err(SchedulerError::AlreadyRunning),
                SchedulerState::Stopped => return Err(SchedulerError::Stopped),
                SchedulerState::Idle => *state = SchedulerState::Running,
            }
        }

        let uuid = match self.register_pass_job().await {
            Ok(uuid) => uuid,
            Err(e) => {
                self.set_state(SchedulerState::Idle);
                return Err(e);
            }
        };
        *self.job_id.lock().unwrap_or_else(PoisonError::into_inner) = Some(uuid);

        info!(uuid = %uuid, interval_ms = self.config.interval_ms, "Scheduler started");
        Ok(())
    }

    async fn register_pass_job(&self) -> Result<Uuid, SchedulerError> {
        let runner = self.runner.clone();
        let job = Job::new_repeated_async(
            Duration::from_millis(self.config.interval_ms),
            move |_uuid, _lock| {
                let runner = runner.clone();
                Box::pin(async move {
                    // Outcomes are logged and recorded by the runner.
                    let _ = runner.run(PassTrigger::Scheduled).await;
                })
            },
        )?;

        let uuid = self.scheduler.add(job).await?;
        self.scheduler.start().await?;
        Ok(uuid)
    }

    /// Run a pass now, through the same overlap guard as scheduled ticks.
    ///
    /// # Errors
    ///
    /// `Stopped` after shutdown, `PassInProgress` if a pass is running, or
    /// the pass's own failure.
    pub async fn run_now(&self) -> Result<PassReport, SchedulerError> {
        if self.state() == SchedulerState::Stopped {
            return Err(SchedulerError::Stopped);
        }
        self.runner.run(PassTrigger::Manual).await
    }

    /// Stop ticking and drain the in-flight pass.
    ///
    /// # Errors
    ///
    /// `NotRunning` unless the scheduler is running.
    pub async fn shutdown(&self) -> Result<(), SchedulerError> {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state != SchedulerState::Running {
                return Err(SchedulerError::NotRunning);
            }
            *state = SchedulerState::Stopped;
        }

        info!("Initiating scheduler shutdown");
        self.runner.shutdown_token.cancel();

        // JobScheduler is a shared handle; shutting down a clone stops it.
        let mut scheduler = self.scheduler.clone();
        if let Err(e) = scheduler.shutdown().await {
            warn!("Error during scheduler shutdown: {}", e);
        }

        let timeout = Duration::from_secs(self.config.shutdown_timeout_secs);
        match tokio::time::timeout(timeout, self.runner.guard.wait_idle()).await {
            Ok(()) => info!("Scheduler shutdown complete"),
            Err(_) => warn!(
                timeout_secs = self.config.shutdown_timeout_secs,
                "In-flight pass did not finish before shutdown timeout"
            ),
        }
        Ok(())
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Id of the repeated pass job once started.
    pub fn job_id(&self) -> Option<Uuid> {
        *self.job_id.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a pass holds the overlap guard right now.
    pub fn is_pass_running(&self) -> bool {
        self.runner.guard.is_running()
    }

    pub fn registry(&self) -> Arc<PassRegistry> {
        self.runner.registry.clone()
    }

    pub fn matchmaker(&self) -> Arc<Matchmaker> {
        self.runner.matchmaker.clone()
    }

    /// Cancelled when shutdown begins.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.runner.shutdown_token.clone()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }
}

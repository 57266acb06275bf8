//! Periodic pass driver for the ticket matchmaker.
//!
//! This crate runs `Matchmaker::process` on a fixed interval using
//! `tokio-cron-scheduler`, with graceful shutdown.
//!
//! # Features
//!
//! - Repeated job every `interval_ms`
//! - Non-reentrant passes: a tick that finds a pass running is skipped
//! - On-demand passes (`run_now`) through the same guard
//! - Drain on shutdown via CancellationToken and the overlap guard
//! - Pass status observability via `PassRegistry`
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use matchmaker_core::{Matchmaker, NoopDispatcher};
//! use matchmaker_scheduler::{MatchmakerScheduler, SchedulerConfig};
//!
//! let matchmaker = Arc::new(Matchmaker::new(config.clone(), Arc::new(NoopDispatcher))?);
//! let scheduler =
//!     MatchmakerScheduler::new(matchmaker, SchedulerConfig::from(&config)).await?;
//!
//! scheduler.start().await?;
//! // ...
//! scheduler.shutdown().await?;
//! ```

mod config;
mod error;
mod overlap;
mod registry;
mod scheduler;

pub use config::SchedulerConfig;
pub use error::SchedulerError;
pub use overlap::{OverlapGuard, RunGuard};
pub use registry::{PassRegistry, PassResult, PassStatus, PassTrigger};
pub use scheduler::{MatchmakerScheduler, SchedulerState};

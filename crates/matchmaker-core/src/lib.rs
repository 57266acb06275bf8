//! # matchmaker-core
//!
//! The matching engine. Tickets enter through [`Matchmaker::submit`], wait
//! in a pool, and are grouped by periodic passes ([`Matchmaker::process`]).
//!
//! A pass:
//! 1. commits pending index writes and snapshots the index and registry
//! 2. walks outer tickets (active first, then pooled, oldest first)
//! 3. searches candidates and assembles groups with the configured strategy
//! 4. removes matched tickets, promotes pooled tickets on their last
//!    interval, and hands each group to the [`MatchDispatcher`]
//!
//! Two strategies exist: [`DefaultStrategy`] (greedy buffers with trimming)
//! and [`CustomStrategy`] (exhaustive proposals filtered by a
//! [`MatchmakerOverride`]).

pub mod candidate;
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod matchmaker;
pub mod mutual;
pub mod pass;
pub mod registry;
pub mod strategy;
pub mod trim;

pub use dispatch::{MatchDispatcher, NoopDispatcher};
pub use error::MatchmakerError;
pub use gate::PrecisionGate;
pub use matchmaker::{Matchmaker, MatchmakerStats, PassReport};
pub use mutual::MutualMatcher;
pub use pass::PassContext;
pub use registry::{PassSnapshot, PooledTicket, TicketRegistry};
pub use strategy::{
    AssemblyStrategy, CustomStrategy, DefaultStrategy, MatchmakerOverride, ProposedGroup,
};
pub use trim::{removal_plans, TrimMember, TrimPlan, MAX_TRIM_MEMBERS};

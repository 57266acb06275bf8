//! Ticket matchmaker simulator.
//!
//! Feeds a matchmaker with synthetic tickets and lets the scheduler run
//! passes over them, logging every group that forms.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Simulation driver and synthetic ticket generation

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands};
pub use commands::{
    largest_first, run_simulation, start_simulation, synthetic_request, SimulationOptions,
    SimulationSummary,
};

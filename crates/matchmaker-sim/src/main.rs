//! Ticket Matchmaker Simulator
//!
//! # Usage
//!
//! ```bash
//! matchmaker-sim run [--tickets N] [--passes N] [--custom] [--seed SEED]
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/matchmaker/config.toml)
//! 3. Environment variables (MATCHMAKER_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use matchmaker_sim::{start_simulation, Cli, Commands, SimulationOptions};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            tickets,
            passes,
            custom,
            interval_ms,
            seed,
        } => {
            let options = SimulationOptions {
                tickets,
                passes,
                custom,
                interval_ms,
                seed,
            };
            start_simulation(cli.config.as_deref(), cli.log_level.as_deref(), options).await?;
        }
    }

    Ok(())
}

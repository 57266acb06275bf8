//! CLI argument parsing for the simulator.

use clap::{Parser, Subcommand};

/// Ticket matchmaker simulator
#[derive(Parser, Debug)]
#[command(name = "matchmaker-sim")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit synthetic tickets and run matchmaking passes over them
    Run {
        /// Number of tickets to submit
        #[arg(short, long, default_value_t = 40)]
        tickets: usize,

        /// Passes to run before stopping
        #[arg(short, long, default_value_t = 3)]
        passes: u64,

        /// Use the custom strategy with a largest-group-first selector
        #[arg(long)]
        custom: bool,

        /// Pass interval in milliseconds (overrides config)
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Seed for ticket generation
        #[arg(long)]
        seed: Option<u64>,
    },
}

//! Error types for the matching engine.

use matchmaker_index::IndexError;
use matchmaker_types::SettingsError;
use thiserror::Error;

/// Errors surfaced by intake calls and passes.
///
/// Intake errors (`InvalidQuery`, `InvalidCount`, `InvalidRequest`,
/// `TicketNotFound`, `TooManyTickets`) go straight back to the caller.
/// `Index` and `Override` abort a single pass and are retried by the next.
#[derive(Debug, Error)]
pub enum MatchmakerError {
    /// Query text failed to parse
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// min/max/multiple constraints are inconsistent
    #[error("Invalid count: {0}")]
    InvalidCount(String),

    /// Request shape is unusable (no presences, duplicate sessions)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Ticket does not exist or does not belong to the caller
    #[error("Ticket not found: {0}")]
    TicketNotFound(String),

    /// Session or party already holds the maximum number of tickets
    #[error("Too many tickets: {0}")]
    TooManyTickets(String),

    /// Configuration rejected at construction
    #[error("Configuration error: {0}")]
    Config(#[from] SettingsError),

    /// Index read/write failure
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    /// Custom override function failed; no matches formed this pass
    #[error("Matchmaker override failed: {0}")]
    Override(String),

    /// Shared state mutex poisoned by a panicking holder
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

//! # matchmaker-types
//!
//! Shared domain types for the ticket matchmaker.
//!
//! This crate defines the data structures passed between the index, the
//! matching engine and the scheduler:
//! - Presences: the session/user pairs a ticket matches on behalf of
//! - Tickets: validated, immutable matchmaking requests
//! - Entries and groups: the per-user output handed to dispatch
//! - Settings: layered configuration
//!
//! ## Usage
//!
//! ```rust
//! use matchmaker_types::TicketRequest;
//!
//! let request = TicketRequest::solo("session-1", "user-1", "*", 2, 2, 1);
//! assert_eq!(request.presences.len(), 1);
//! ```

pub mod config;
pub mod error;
pub mod ticket;

pub use config::{MatchmakerConfig, Settings};
pub use error::SettingsError;
pub use ticket::{MatchedGroup, MatchmakerEntry, Presence, Ticket, TicketRequest};

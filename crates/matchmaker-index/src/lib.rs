//! # matchmaker-index
//!
//! In-memory full-text index of waiting tickets, built on Tantivy.
//!
//! Each pooled ticket is one document. Other tickets' queries run against
//! those documents to find candidates, so a ticket's properties and its own
//! query text are both searchable.
//!
//! ## Features
//! - RAM-backed Tantivy index with a single shared writer
//! - Queries compiled once at intake and reused every pass
//! - Point-in-time snapshots: a pass searches one immutable `Searcher`
//!   while intake keeps writing
//! - Candidate search with count-range, party and session exclusion filters,
//!   ranked by score then creation time
//! - Single-document probes for mutual-match validation

pub mod document;
pub mod error;
pub mod index;
pub mod indexer;
pub mod query;
pub mod schema;
pub mod searcher;

pub use document::ticket_to_doc;
pub use error::IndexError;
pub use index::{TicketIndex, TicketIndexConfig};
pub use indexer::TicketIndexer;
pub use query::ParsedQuery;
pub use schema::{build_ticket_schema, TicketSchema};
pub use searcher::{CandidateQuery, TicketHit, TicketSearcher, TicketSnapshot};

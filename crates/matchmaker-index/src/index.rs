//! Tantivy index management.
//!
//! Tickets live only as long as they wait, so the index is RAM-backed and
//! rebuilt empty on every start.

use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy};
use tracing::{debug, info};

use crate::error::IndexError;
use crate::schema::{build_ticket_schema, TicketSchema};

/// Default memory budget for IndexWriter (50MB)
const DEFAULT_WRITER_MEMORY_MB: usize = 50;

/// Ticket index configuration
#[derive(Debug, Clone)]
pub struct TicketIndexConfig {
    /// Memory budget for writer in MB
    pub writer_memory_mb: usize,
}

impl Default for TicketIndexConfig {
    fn default() -> Self {
        Self {
            writer_memory_mb: DEFAULT_WRITER_MEMORY_MB,
        }
    }
}

impl TicketIndexConfig {
    pub fn with_memory_mb(mut self, mb: usize) -> Self {
        self.writer_memory_mb = mb;
        self
    }
}

/// Wrapper for Tantivy index with schema access.
pub struct TicketIndex {
    index: Index,
    schema: TicketSchema,
    config: TicketIndexConfig,
}

impl TicketIndex {
    /// Create an empty in-memory index.
    pub fn create_in_ram(config: TicketIndexConfig) -> Result<Self, IndexError> {
        let schema = build_ticket_schema();
        let index = Index::create_in_ram(schema.schema().clone());
        let schema = TicketSchema::from_schema(index.schema())?;

        info!(
            writer_memory_mb = config.writer_memory_mb,
            "Created in-memory ticket index"
        );

        Ok(Self {
            index,
            schema,
            config,
        })
    }

    /// Get the ticket schema
    pub fn schema(&self) -> &TicketSchema {
        &self.schema
    }

    /// Get the underlying Tantivy index
    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Create an IndexWriter with configured memory budget
    pub fn writer(&self) -> Result<IndexWriter, IndexError> {
        let memory_budget = self.config.writer_memory_mb * 1024 * 1024;
        let writer = self.index.writer(memory_budget)?;
        debug!(
            memory_mb = self.config.writer_memory_mb,
            "Created index writer"
        );
        Ok(writer)
    }

    /// Create an IndexReader that only reloads when asked.
    ///
    /// Each pass reloads once and then searches a fixed snapshot.
    pub fn reader(&self) -> Result<IndexReader, IndexError> {
        let reader = self
            .index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        debug!("Created index reader");
        Ok(reader)
    }
}

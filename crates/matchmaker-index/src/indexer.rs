//! Ticket indexer for adding and removing ticket documents.
//!
//! The indexer wraps the single IndexWriter with shared access via
//! Arc<Mutex>. Intake threads upsert and delete concurrently; changes are
//! not visible until commit() is called, which the pass does before it
//! takes its snapshot.

use std::sync::{Arc, Mutex, MutexGuard};

use tantivy::{IndexWriter, Term};
use tracing::debug;

use matchmaker_types::Ticket;

use crate::document::ticket_to_doc;
use crate::error::IndexError;
use crate::index::TicketIndex;
use crate::schema::TicketSchema;

/// Manages ticket document writes.
pub struct TicketIndexer {
    writer: Arc<Mutex<IndexWriter>>,
    schema: TicketSchema,
}

impl TicketIndexer {
    /// Create a new indexer from a TicketIndex.
    pub fn new(index: &TicketIndex) -> Result<Self, IndexError> {
        let writer = index.writer()?;
        let schema = index.schema().clone();

        Ok(Self {
            writer: Arc::new(Mutex::new(writer)),
            schema,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, IndexWriter>, IndexError> {
        self.writer
            .lock()
            .map_err(|e| IndexError::IndexLocked(e.to_string()))
    }

    /// Index a ticket, replacing any document with the same ticket id.
    pub fn upsert(&self, ticket: &Ticket) -> Result<(), IndexError> {
        let doc = ticket_to_doc(&self.schema, ticket);
        let writer = self.lock()?;

        let term = Term::from_field_text(self.schema.ticket_id, &ticket.ticket_id);
        writer.delete_term(term);
        writer.add_document(doc)?;

        debug!(ticket_id = %ticket.ticket_id, count = ticket.count(), "Indexed ticket");
        Ok(())
    }

    /// Delete a ticket document by id.
    pub fn delete(&self, ticket_id: &str) -> Result<(), IndexError> {
        let writer = self.lock()?;
        writer.delete_term(Term::from_field_text(self.schema.ticket_id, ticket_id));

        debug!(ticket_id, "Deleted ticket");
        Ok(())
    }

    /// Delete many ticket documents under one writer lock.
    ///
    /// A pass calls this once with every matched ticket, followed by a commit.
    pub fn delete_batch<S: AsRef<str>>(&self, ticket_ids: &[S]) -> Result<usize, IndexError> {
        let writer = self.lock()?;
        for ticket_id in ticket_ids {
            writer.delete_term(Term::from_field_text(
                self.schema.ticket_id,
                ticket_id.as_ref(),
            ));
        }

        debug!(count = ticket_ids.len(), "Deleted ticket batch");
        Ok(ticket_ids.len())
    }

    /// Commit pending changes to make them searchable.
    pub fn commit(&self) -> Result<u64, IndexError> {
        let mut writer = self.lock()?;
        let opstamp = writer.commit()?;
        debug!(opstamp, "Committed ticket index changes");
        Ok(opstamp)
    }
}

//! Tantivy schema definition for ticket documents.
//!
//! One document per waiting ticket. Identity and exclusion fields are raw
//! strings, count bounds are numeric for range filters, and the ticket's
//! query text plus its properties are tokenized so other tickets' queries
//! can match them.

use tantivy::schema::{Field, Schema, FAST, INDEXED, STORED, STRING, TEXT};

use crate::IndexError;

/// Schema field handles for efficient access
#[derive(Debug, Clone)]
pub struct TicketSchema {
    schema: Schema,
    /// Primary key (STRING | STORED)
    pub ticket_id: Field,
    /// Party the ticket belongs to, empty for solo tickets (STRING | STORED)
    pub party_id: Field,
    /// One value per presence (STRING | STORED)
    pub session_id: Field,
    /// The ticket's own query text, default search field (TEXT | STORED)
    pub query: Field,
    /// String and numeric properties as a JSON object (TEXT | STORED)
    pub properties: Field,
    /// Smallest acceptable group size (u64, INDEXED | STORED | FAST)
    pub min_count: Field,
    /// Largest acceptable group size (u64, INDEXED | STORED | FAST)
    pub max_count: Field,
    /// Entries the ticket contributes (u64, INDEXED | STORED | FAST)
    pub count: Field,
    /// Creation time in milliseconds, tie-break key (i64, INDEXED | STORED | FAST)
    pub created_at_ms: Field,
}

impl TicketSchema {
    /// Get the underlying Tantivy schema
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Create a TicketSchema from an existing Tantivy Schema
    pub fn from_schema(schema: Schema) -> Result<Self, IndexError> {
        let field = |name: &str| {
            schema
                .get_field(name)
                .map_err(|_| IndexError::SchemaMismatch(format!("missing {} field", name)))
        };

        Ok(Self {
            ticket_id: field("ticket_id")?,
            party_id: field("party_id")?,
            session_id: field("session_id")?,
            query: field("query")?,
            properties: field("properties")?,
            min_count: field("min_count")?,
            max_count: field("max_count")?,
            count: field("count")?,
            created_at_ms: field("created_at_ms")?,
            schema,
        })
    }
}

/// Build the ticket schema.
pub fn build_ticket_schema() -> TicketSchema {
    let mut schema_builder = Schema::builder();

    let ticket_id = schema_builder.add_text_field("ticket_id", STRING | STORED);
    let party_id = schema_builder.add_text_field("party_id", STRING | STORED);
    let session_id = schema_builder.add_text_field("session_id", STRING | STORED);

    let query = schema_builder.add_text_field("query", TEXT | STORED);
    let properties = schema_builder.add_json_field("properties", STORED | TEXT);

    let min_count = schema_builder.add_u64_field("min_count", INDEXED | STORED | FAST);
    let max_count = schema_builder.add_u64_field("max_count", INDEXED | STORED | FAST);
    let count = schema_builder.add_u64_field("count", INDEXED | STORED | FAST);
    let created_at_ms = schema_builder.add_i64_field("created_at_ms", INDEXED | STORED | FAST);

    let schema = schema_builder.build();

    TicketSchema {
        schema,
        ticket_id,
        party_id,
        session_id,
        query,
        properties,
        min_count,
        max_count,
        count,
        created_at_ms,
    }
}

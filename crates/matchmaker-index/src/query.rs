//! Ticket query compilation.
//!
//! Queries are parsed once when a ticket is submitted; a malformed query is
//! rejected at intake and never reaches a pass.

use std::fmt;

use tantivy::query::{Query, QueryParser};

use crate::error::IndexError;
use crate::index::TicketIndex;

/// A compiled ticket query together with its source text.
pub struct ParsedQuery {
    text: String,
    query: Box<dyn Query>,
}

impl ParsedQuery {
    /// Parse `text` against the ticket schema.
    ///
    /// Bare terms search other tickets' query text; `properties.<key>:value`
    /// addresses their properties. `*` matches every ticket.
    pub fn parse(index: &TicketIndex, text: &str) -> Result<Self, IndexError> {
        let parser = QueryParser::for_index(index.index(), vec![index.schema().query]);
        let query = parser.parse_query(text)?;
        Ok(Self {
            text: text.to_string(),
            query,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Fresh boxed copy for composing into a larger boolean query.
    pub fn boxed(&self) -> Box<dyn Query> {
        self.query.box_clone()
    }
}

impl Clone for ParsedQuery {
    fn clone(&self) -> Self {
        Self {
            text: self.text.clone(),
            query: self.query.box_clone(),
        }
    }
}

impl fmt::Debug for ParsedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParsedQuery").field("text", &self.text).finish()
    }
}

//! Candidate search over a point-in-time snapshot of the ticket index.
//!
//! A pass reloads the reader once, then runs every search against the same
//! immutable `Searcher`. Tickets written after the reload are invisible to
//! that pass.

use std::ops::Bound::{Included, Unbounded};

use tantivy::collector::{Count, TopDocs};
use tantivy::query::{BooleanQuery, Occur, Query, RangeQuery, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::{IndexReader, Searcher, TantivyDocument, Term};
use tracing::debug;

use matchmaker_types::Ticket;

use crate::error::IndexError;
use crate::index::TicketIndex;
use crate::query::ParsedQuery;
use crate::schema::TicketSchema;

/// A candidate ticket with its relevance score.
#[derive(Debug, Clone)]
pub struct TicketHit {
    pub ticket_id: String,
    pub score: f32,
    pub created_at_ms: i64,
}

/// Everything a candidate search needs to know about the searching ticket.
#[derive(Debug, Clone)]
pub struct CandidateQuery<'a> {
    pub ticket_id: &'a str,
    pub query: &'a ParsedQuery,
    pub min_count: usize,
    pub max_count: usize,
    pub party_id: Option<&'a str>,
    pub session_ids: Vec<&'a str>,
    /// Maximum hits to return
    pub limit: usize,
}

impl<'a> CandidateQuery<'a> {
    pub fn for_ticket(ticket: &'a Ticket, query: &'a ParsedQuery, limit: usize) -> Self {
        Self {
            ticket_id: &ticket.ticket_id,
            query,
            min_count: ticket.min_count,
            max_count: ticket.max_count,
            party_id: ticket.party_id.as_deref(),
            session_ids: ticket.session_ids().collect(),
            limit,
        }
    }
}

/// Long-lived reader handle; hands out snapshots.
pub struct TicketSearcher {
    reader: IndexReader,
    schema: TicketSchema,
}

impl TicketSearcher {
    /// Create a new searcher from a TicketIndex.
    pub fn new(index: &TicketIndex) -> Result<Self, IndexError> {
        Ok(Self {
            reader: index.reader()?,
            schema: index.schema().clone(),
        })
    }

    /// Reload to the latest commit and pin it.
    pub fn snapshot(&self) -> Result<TicketSnapshot, IndexError> {
        self.reader.reload()?;
        let searcher = self.reader.searcher();
        debug!(num_docs = searcher.num_docs(), "Took index snapshot");
        Ok(TicketSnapshot {
            searcher,
            schema: self.schema.clone(),
        })
    }
}

/// Immutable view of the committed segments at snapshot time.
pub struct TicketSnapshot {
    searcher: Searcher,
    schema: TicketSchema,
}

impl TicketSnapshot {
    fn term_query(&self, term: Term) -> Box<dyn Query> {
        Box::new(TermQuery::new(term, IndexRecordOption::Basic))
    }

    /// Find tickets the searching ticket could be grouped with.
    ///
    /// The searching ticket's query must match; count ranges must overlap in
    /// both directions; the ticket itself, its party and its sessions are
    /// excluded. Results are ordered by score descending, then oldest first.
    pub fn search(&self, request: &CandidateQuery<'_>) -> Result<Vec<TicketHit>, IndexError> {
        let schema = &self.schema;

        let mut clauses: Vec<(Occur, Box<dyn Query>)> = vec![
            (Occur::Must, request.query.boxed()),
            (
                Occur::Must,
                Box::new(RangeQuery::new(
                    Included(Term::from_field_u64(
                        schema.max_count,
                        request.min_count as u64,
                    )),
                    Unbounded,
                )),
            ),
            (
                Occur::Must,
                Box::new(RangeQuery::new(
                    Unbounded,
                    Included(Term::from_field_u64(
                        schema.min_count,
                        request.max_count as u64,
                    )),
                )),
            ),
            (
                Occur::MustNot,
                self.term_query(Term::from_field_text(schema.ticket_id, request.ticket_id)),
            ),
        ];

        if let Some(party_id) = request.party_id {
            clauses.push((
                Occur::MustNot,
                self.term_query(Term::from_field_text(schema.party_id, party_id)),
            ));
        }

        for session_id in &request.session_ids {
            clauses.push((
                Occur::MustNot,
                self.term_query(Term::from_field_text(schema.session_id, session_id)),
            ));
        }

        let query = BooleanQuery::new(clauses);
        let top_docs = self
            .searcher
            .search(&query, &TopDocs::with_limit(request.limit))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = self.searcher.doc(doc_address)?;

            let ticket_id = doc
                .get_first(schema.ticket_id)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            let created_at_ms = doc
                .get_first(schema.created_at_ms)
                .and_then(|v| v.as_i64())
                .unwrap_or(i64::MAX);

            hits.push(TicketHit {
                ticket_id,
                score,
                created_at_ms,
            });
        }

        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.created_at_ms.cmp(&b.created_at_ms))
        });

        debug!(
            ticket_id = request.ticket_id,
            query = request.query.text(),
            hits = hits.len(),
            "Candidate search complete"
        );

        Ok(hits)
    }

    /// Whether `query` matches the single document for `ticket_id`.
    pub fn matches(&self, query: &ParsedQuery, ticket_id: &str) -> Result<bool, IndexError> {
        let probe = BooleanQuery::new(vec![
            (Occur::Must, query.boxed()),
            (
                Occur::Must,
                self.term_query(Term::from_field_text(self.schema.ticket_id, ticket_id)),
            ),
        ]);
        Ok(self.searcher.search(&probe, &Count)? > 0)
    }

    /// Number of live documents in the snapshot.
    pub fn num_docs(&self) -> u64 {
        self.searcher.num_docs()
    }
}

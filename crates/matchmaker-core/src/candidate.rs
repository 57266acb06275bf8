//! Candidate search for one outer ticket.

use std::sync::Arc;

use matchmaker_index::CandidateQuery;
use tracing::{debug, warn};

use crate::pass::PassContext;
use crate::registry::PooledTicket;

impl PassContext<'_> {
    /// Tickets the outer ticket could be grouped with, best first.
    ///
    /// Runs the outer query against the pass snapshot (count ranges, self,
    /// party and session exclusion are applied by the index), then drops
    /// hits the registry snapshot does not know, hits already consumed this
    /// pass, and hits failing mutual validation while the gate is open.
    /// Search failures are logged and yield no candidates.
    pub fn candidates(&mut self, outer: &PooledTicket, limit: usize) -> Vec<Arc<PooledTicket>> {
        let request = CandidateQuery::for_ticket(&outer.ticket, &outer.query, limit);
        let hits = match self.index.search(&request) {
            Ok(hits) => hits,
            Err(e) => {
                warn!(ticket_id = outer.id(), error = %e, "Candidate search failed");
                return Vec::new();
            }
        };

        let mut candidates = Vec::with_capacity(hits.len());
        for hit in hits {
            let Some(candidate) = self.tickets.tickets.get(&hit.ticket_id).cloned() else {
                debug!(ticket_id = %hit.ticket_id, "Skipping hit missing from pass snapshot");
                continue;
            };
            if !self.is_available(&candidate) {
                continue;
            }
            if !self.mutually_compatible(outer, &candidate) {
                continue;
            }
            candidates.push(candidate);
        }
        candidates
    }
}

//! Ticket registry: every waiting ticket and its pool/active membership.
//!
//! The registry is shared with intake and always accessed under the
//! matchmaker's registry mutex. Passes only read it through a
//! [`PassSnapshot`] and write back matched removals and promotions.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use matchmaker_index::ParsedQuery;
use matchmaker_types::Ticket;

/// A registered ticket with its compiled query.
#[derive(Debug, Clone)]
pub struct PooledTicket {
    pub ticket: Ticket,
    pub query: ParsedQuery,
}

impl PooledTicket {
    pub fn new(ticket: Ticket, query: ParsedQuery) -> Self {
        Self { ticket, query }
    }

    pub fn id(&self) -> &str {
        &self.ticket.ticket_id
    }
}

/// Tickets visible to one pass.
#[derive(Debug, Default, Clone)]
pub struct PassSnapshot {
    pub tickets: HashMap<String, Arc<PooledTicket>>,
    pub active: HashSet<String>,
}

impl PassSnapshot {
    pub fn contains(&self, ticket_id: &str) -> bool {
        self.tickets.contains_key(ticket_id)
    }

    pub fn is_active(&self, ticket_id: &str) -> bool {
        self.active.contains(ticket_id)
    }

    pub fn pool_size(&self) -> usize {
        self.tickets.len() - self.active.len()
    }

    pub fn active_size(&self) -> usize {
        self.active.len()
    }

    /// Outer-ticket processing order: active tickets first, then pooled,
    /// each oldest first (ticket id breaks equal timestamps).
    pub fn processing_order(&self) -> Vec<(Arc<PooledTicket>, bool)> {
        let mut ordered: Vec<(Arc<PooledTicket>, bool)> = self
            .tickets
            .values()
            .map(|t| (t.clone(), self.active.contains(t.id())))
            .collect();
        ordered.sort_by(|(a, a_active), (b, b_active)| {
            b_active
                .cmp(a_active)
                .then(a.ticket.created_at.cmp(&b.ticket.created_at))
                .then(a.id().cmp(b.id()))
        });
        ordered
    }
}

/// In-memory ticket bookkeeping.
#[derive(Debug, Default)]
pub struct TicketRegistry {
    tickets: HashMap<String, Arc<PooledTicket>>,
    active: HashSet<String>,
    /// Solo tickets by owning session
    by_session: HashMap<String, HashSet<String>>,
    /// Party tickets by party
    by_party: HashMap<String, HashSet<String>>,
}

impl TicketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a ticket in the pool.
    pub fn insert(&mut self, pooled: PooledTicket) {
        let ticket_id = pooled.id().to_string();
        match &pooled.ticket.party_id {
            Some(party_id) => {
                self.by_party
                    .entry(party_id.clone())
                    .or_default()
                    .insert(ticket_id.clone());
            }
            None => {
                for session_id in pooled.ticket.session_ids() {
                    self.by_session
                        .entry(session_id.to_string())
                        .or_default()
                        .insert(ticket_id.clone());
                }
            }
        }
        self.tickets.insert(ticket_id, Arc::new(pooled));
    }

    /// Remove a ticket from the pool or the active set.
    pub fn remove(&mut self, ticket_id: &str) -> Option<Arc<PooledTicket>> {
        let pooled = self.tickets.remove(ticket_id)?;
        self.active.remove(ticket_id);

        match &pooled.ticket.party_id {
            Some(party_id) => detach(&mut self.by_party, party_id, ticket_id),
            None => {
                for session_id in pooled.ticket.session_ids() {
                    detach(&mut self.by_session, session_id, ticket_id);
                }
            }
        }
        Some(pooled)
    }

    pub fn get(&self, ticket_id: &str) -> Option<&Arc<PooledTicket>> {
        self.tickets.get(ticket_id)
    }

    /// Solo ticket ids owned by a session.
    pub fn tickets_for_session(&self, session_id: &str) -> Vec<String> {
        self.by_session
            .get(session_id)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Ticket ids owned by a party.
    pub fn tickets_for_party(&self, party_id: &str) -> Vec<String> {
        self.by_party
            .get(party_id)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Move a pooled ticket to the active set. Returns false when the ticket
    /// is gone or already active.
    pub fn promote(&mut self, ticket_id: &str) -> bool {
        self.tickets.contains_key(ticket_id) && self.active.insert(ticket_id.to_string())
    }

    pub fn is_active(&self, ticket_id: &str) -> bool {
        self.active.contains(ticket_id)
    }

    /// Copy the current membership for a pass. Ticket bodies are shared.
    pub fn snapshot(&self) -> PassSnapshot {
        PassSnapshot {
            tickets: self.tickets.clone(),
            active: self.active.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    pub fn pool_size(&self) -> usize {
        self.tickets.len() - self.active.len()
    }

    pub fn active_size(&self) -> usize {
        self.active.len()
    }
}

fn detach(map: &mut HashMap<String, HashSet<String>>, key: &str, ticket_id: &str) {
    if let Some(ids) = map.get_mut(key) {
        ids.remove(ticket_id);
        if ids.is_empty() {
            map.remove(key);
        }
    }
}

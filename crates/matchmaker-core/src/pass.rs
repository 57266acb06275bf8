//! Per-pass working state shared by assembly strategies.
//!
//! A pass sees one index snapshot and one registry snapshot. Everything a
//! strategy decides (which tickets are consumed, which sessions are used,
//! which pooled tickets reached their last interval) is recorded here and
//! applied by the matchmaker after assembly finishes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use matchmaker_index::TicketSnapshot;
use matchmaker_types::{MatchedGroup, MatchmakerConfig};

use crate::gate::PrecisionGate;
use crate::mutual::MutualMatcher;
use crate::registry::{PassSnapshot, PooledTicket};

pub struct PassContext<'a> {
    pub(crate) index: &'a TicketSnapshot,
    pub(crate) tickets: &'a PassSnapshot,
    pub(crate) config: &'a MatchmakerConfig,
    gate: &'a PrecisionGate,
    intervals: &'a mut HashMap<String, u32>,
    mutual: MutualMatcher,
    consumed: HashSet<String>,
    consumed_sessions: HashSet<String>,
    promotions: Vec<String>,
}

impl<'a> PassContext<'a> {
    pub fn new(
        index: &'a TicketSnapshot,
        tickets: &'a PassSnapshot,
        config: &'a MatchmakerConfig,
        gate: &'a PrecisionGate,
        intervals: &'a mut HashMap<String, u32>,
    ) -> Self {
        Self {
            index,
            tickets,
            config,
            gate,
            intervals,
            mutual: MutualMatcher::new(),
            consumed: HashSet::new(),
            consumed_sessions: HashSet::new(),
            promotions: Vec::new(),
        }
    }

    pub fn config(&self) -> &MatchmakerConfig {
        self.config
    }

    /// Outer tickets in processing order, flagged when active.
    pub fn processing_order(&self) -> Vec<(Arc<PooledTicket>, bool)> {
        self.tickets.processing_order()
    }

    /// Count one more interval for an outer ticket and report whether this
    /// is its last interval. Pooled tickets reaching their last interval
    /// are queued for promotion.
    pub fn begin_interval(&mut self, outer: &PooledTicket, active: bool) -> bool {
        let intervals = self.intervals.entry(outer.id().to_string()).or_insert(0);
        *intervals += 1;

        let ticket = &outer.ticket;
        let last = active
            || *intervals >= self.config.max_intervals
            || ticket.min_count == ticket.max_count;
        if last && !active {
            self.promotions.push(outer.id().to_string());
        }
        last
    }

    /// Neither the ticket nor any of its sessions has been matched this pass.
    pub fn is_available(&self, pooled: &PooledTicket) -> bool {
        !self.consumed.contains(pooled.id())
            && pooled
                .ticket
                .session_ids()
                .all(|s| !self.consumed_sessions.contains(s))
    }

    /// Two-way query check while the precision gate is open; always true
    /// otherwise.
    pub fn mutually_compatible(&mut self, a: &PooledTicket, b: &PooledTicket) -> bool {
        if !self.gate.is_open() {
            return true;
        }
        self.mutual.check(self.index, a, b)
    }

    /// Record a formed group and consume its tickets and sessions.
    pub fn commit_group(&mut self, members: &[Arc<PooledTicket>]) -> MatchedGroup {
        for member in members {
            self.consumed.insert(member.id().to_string());
            self.consumed_sessions
                .extend(member.ticket.session_ids().map(str::to_string));
        }
        MatchedGroup::from_tickets(members.iter().map(|m| &m.ticket))
    }

    /// Pooled tickets to move into the active set after this pass.
    pub fn take_promotions(&mut self) -> Vec<String> {
        std::mem::take(&mut self.promotions)
    }

    pub fn consumed_count(&self) -> usize {
        self.consumed.len()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use matchmaker_index::{ParsedQuery, TicketIndex, TicketIndexer, TicketSearcher};
    use matchmaker_types::{Ticket, TicketRequest};

    use crate::registry::TicketRegistry;

    /// Index, registry and snapshots for driving strategies directly.
    pub(crate) struct PassFixture {
        pub index: TicketIndex,
        pub indexer: TicketIndexer,
        pub searcher: TicketSearcher,
        pub registry: TicketRegistry,
        pub config: MatchmakerConfig,
        pub intervals: HashMap<String, u32>,
        age: i64,
    }

    impl PassFixture {
        pub fn new(config: MatchmakerConfig) -> Self {
            let index = TicketIndex::create_in_ram(Default::default()).unwrap();
            let indexer = TicketIndexer::new(&index).unwrap();
            let searcher = TicketSearcher::new(&index).unwrap();
            Self {
                index,
                indexer,
                searcher,
                registry: TicketRegistry::new(),
                config,
                intervals: HashMap::new(),
                age: 1000,
            }
        }

        /// Add a ticket; each call is one second younger than the last.
        pub fn add(&mut self, request: TicketRequest) -> String {
            self.age -= 1;
            let query = if request.query.is_empty() {
                "*".to_string()
            } else {
                request.query.clone()
            };
            let ticket = Ticket::new(request, query.clone())
                .with_created_at(Utc::now() - ChronoDuration::seconds(self.age));
            let parsed = ParsedQuery::parse(&self.index, &query).unwrap();
            self.indexer.upsert(&ticket).unwrap();
            let id = ticket.ticket_id.clone();
            self.registry.insert(PooledTicket::new(ticket, parsed));
            id
        }

        pub fn solo(&mut self, session: &str, min: usize, max: usize, multiple: usize) -> String {
            self.add(TicketRequest::solo(session, session, "*", min, max, multiple))
        }

        pub fn snapshots(&self) -> (TicketSnapshot, PassSnapshot) {
            self.indexer.commit().unwrap();
            (self.searcher.snapshot().unwrap(), self.registry.snapshot())
        }
    }

    #[test]
    fn test_begin_interval_promotion() {
        let mut config = MatchmakerConfig::default();
        config.max_intervals = 2;
        let mut fixture = PassFixture::new(config);
        let flexible = fixture.solo("s1", 2, 4, 1);
        let fixed = fixture.solo("s2", 2, 2, 1);
        let (index, tickets) = fixture.snapshots();
        let gate = PrecisionGate::disabled();

        let flexible_ticket = tickets.tickets[&flexible].clone();
        let fixed_ticket = tickets.tickets[&fixed].clone();

        let mut ctx = PassContext::new(
            &index,
            &tickets,
            &fixture.config,
            &gate,
            &mut fixture.intervals,
        );
        assert!(!ctx.begin_interval(&flexible_ticket, false));
        assert!(ctx.begin_interval(&fixed_ticket, false));
        assert_eq!(ctx.take_promotions(), vec![fixed.clone()]);

        assert!(ctx.begin_interval(&flexible_ticket, false));
        assert_eq!(ctx.take_promotions(), vec![flexible.clone()]);

        // already active: last interval, no re-promotion
        assert!(ctx.begin_interval(&flexible_ticket, true));
        assert!(ctx.take_promotions().is_empty());
    }

    #[test]
    fn test_commit_group_consumes_sessions() {
        let mut fixture = PassFixture::new(MatchmakerConfig::default());
        let a = fixture.solo("s1", 2, 2, 1);
        let b = fixture.solo("s2", 2, 2, 1);
        let other_b = fixture.solo("s2", 2, 2, 1);
        let (index, tickets) = fixture.snapshots();
        let gate = PrecisionGate::disabled();

        let mut ctx = PassContext::new(
            &index,
            &tickets,
            &fixture.config,
            &gate,
            &mut fixture.intervals,
        );
        let members = vec![tickets.tickets[&a].clone(), tickets.tickets[&b].clone()];
        let group = ctx.commit_group(&members);

        assert_eq!(group.size(), 2);
        assert_eq!(ctx.consumed_count(), 2);
        assert!(!ctx.is_available(&tickets.tickets[&a]));
        // different ticket, same session
        assert!(!ctx.is_available(&tickets.tickets[&other_b]));
    }
}

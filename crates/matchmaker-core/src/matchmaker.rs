//! The matchmaker: ticket intake and matching passes.
//!
//! Intake (`submit`, `cancel`, removals) may run on any thread at any time.
//! A pass (`process`) is synchronous and must not overlap another pass; the
//! scheduler guarantees that. Intake and passes share the registry mutex and
//! the index writer; the pass only holds the registry lock while it takes
//! its snapshots and while it writes back results.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use matchmaker_index::{
    ParsedQuery, TicketIndex, TicketIndexConfig, TicketIndexer, TicketSearcher,
};
use matchmaker_types::{MatchedGroup, MatchmakerConfig, Ticket, TicketRequest};
use tracing::{debug, info, warn};

use crate::dispatch::MatchDispatcher;
use crate::error::MatchmakerError;
use crate::gate::PrecisionGate;
use crate::pass::PassContext;
use crate::registry::{PooledTicket, TicketRegistry};
use crate::strategy::{AssemblyStrategy, CustomStrategy, DefaultStrategy, MatchmakerOverride};

/// Outcome of one pass.
#[derive(Debug, Clone, Default)]
pub struct PassReport {
    pub matched: Vec<MatchedGroup>,
    /// Pooled tickets moved to the active set
    pub promoted: usize,
    /// Membership at snapshot time
    pub pool_size: usize,
    pub active_size: usize,
    pub duration: Duration,
}

impl PassReport {
    pub fn matched_tickets(&self) -> usize {
        self.matched.iter().map(|g| g.ticket_ids().len()).sum()
    }
}

/// Current registry membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchmakerStats {
    pub tickets: usize,
    pub pool: usize,
    pub active: usize,
}

/// State carried from one pass to the next.
#[derive(Debug, Default)]
struct PassState {
    /// Interval counters, pruned to live tickets
    intervals: HashMap<String, u32>,
    /// Matched tickets whose index removal failed; deleted again before the
    /// next snapshot
    stale: Vec<String>,
}

pub struct Matchmaker {
    config: MatchmakerConfig,
    index: TicketIndex,
    indexer: TicketIndexer,
    searcher: TicketSearcher,
    registry: Mutex<TicketRegistry>,
    pass_state: Mutex<PassState>,
    strategy: Box<dyn AssemblyStrategy>,
    dispatcher: Arc<dyn MatchDispatcher>,
}

impl Matchmaker {
    /// Matchmaker using greedy assembly.
    pub fn new(
        config: MatchmakerConfig,
        dispatcher: Arc<dyn MatchDispatcher>,
    ) -> Result<Self, MatchmakerError> {
        Self::build(config, dispatcher, Box::new(DefaultStrategy))
    }

    /// Matchmaker delegating group selection to `selector`.
    pub fn with_override(
        config: MatchmakerConfig,
        dispatcher: Arc<dyn MatchDispatcher>,
        selector: Arc<dyn MatchmakerOverride>,
    ) -> Result<Self, MatchmakerError> {
        Self::build(config, dispatcher, Box::new(CustomStrategy::new(selector)))
    }

    fn build(
        config: MatchmakerConfig,
        dispatcher: Arc<dyn MatchDispatcher>,
        strategy: Box<dyn AssemblyStrategy>,
    ) -> Result<Self, MatchmakerError> {
        config.validate()?;

        let index = TicketIndex::create_in_ram(
            TicketIndexConfig::default().with_memory_mb(config.writer_memory_mb),
        )?;
        let indexer = TicketIndexer::new(&index)?;
        let searcher = TicketSearcher::new(&index)?;

        ParsedQuery::parse(&index, &config.default_query)
            .map_err(|e| MatchmakerError::InvalidQuery(format!("default query: {}", e)))?;

        info!(
            strategy = strategy.name(),
            max_intervals = config.max_intervals,
            mutual_match = config.mutual_match,
            "Matchmaker created"
        );

        Ok(Self {
            config,
            index,
            indexer,
            searcher,
            registry: Mutex::new(TicketRegistry::new()),
            pass_state: Mutex::new(PassState::default()),
            strategy,
            dispatcher,
        })
    }

    pub fn config(&self) -> &MatchmakerConfig {
        &self.config
    }

    fn lock_registry(&self) -> Result<MutexGuard<'_, TicketRegistry>, MatchmakerError> {
        self.registry
            .lock()
            .map_err(|e| MatchmakerError::LockPoisoned(e.to_string()))
    }

    /// Validate and register a ticket. It is searchable from the next pass.
    pub fn submit(&self, request: TicketRequest) -> Result<Ticket, MatchmakerError> {
        validate_request(&request)?;

        let query_text = if request.query.trim().is_empty() {
            self.config.default_query.clone()
        } else {
            request.query.clone()
        };
        let query = ParsedQuery::parse(&self.index, &query_text)
            .map_err(|e| MatchmakerError::InvalidQuery(e.to_string()))?;

        let ticket = Ticket::new(request, query_text);

        let mut registry = self.lock_registry()?;
        self.check_ticket_cap(&registry, &ticket)?;

        self.indexer.upsert(&ticket)?;
        registry.insert(PooledTicket::new(ticket.clone(), query));

        info!(
            ticket_id = %ticket.ticket_id,
            party_id = ticket.party_id.as_deref().unwrap_or(""),
            count = ticket.count(),
            min_count = ticket.min_count,
            max_count = ticket.max_count,
            "Ticket submitted"
        );
        Ok(ticket)
    }

    fn check_ticket_cap(
        &self,
        registry: &TicketRegistry,
        ticket: &Ticket,
    ) -> Result<(), MatchmakerError> {
        let max = self.config.max_tickets;
        match &ticket.party_id {
            Some(party_id) => {
                if registry.tickets_for_party(party_id).len() >= max {
                    return Err(MatchmakerError::TooManyTickets(format!("party {}", party_id)));
                }
            }
            None => {
                for session_id in ticket.session_ids() {
                    if registry.tickets_for_session(session_id).len() >= max {
                        return Err(MatchmakerError::TooManyTickets(format!(
                            "session {}",
                            session_id
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Withdraw a solo ticket on behalf of one of its presences.
    ///
    /// Unknown tickets and tickets not owned by the caller both report
    /// `TicketNotFound`, so cancelling twice is harmless.
    pub fn cancel(
        &self,
        session_id: &str,
        user_id: &str,
        ticket_id: &str,
    ) -> Result<(), MatchmakerError> {
        let mut registry = self.lock_registry()?;
        let owned = registry.get(ticket_id).is_some_and(|pooled| {
            pooled.ticket.party_id.is_none()
                && pooled
                    .ticket
                    .presences
                    .iter()
                    .any(|p| p.session_id == session_id && p.user_id == user_id)
        });
        if !owned {
            return Err(MatchmakerError::TicketNotFound(ticket_id.to_string()));
        }

        self.remove_locked(&mut registry, ticket_id)?;
        info!(ticket_id, session_id, "Ticket cancelled");
        Ok(())
    }

    /// Withdraw one ticket owned by a party.
    pub fn remove_party(&self, party_id: &str, ticket_id: &str) -> Result<(), MatchmakerError> {
        let mut registry = self.lock_registry()?;
        let owned = registry
            .get(ticket_id)
            .is_some_and(|pooled| pooled.ticket.party_id.as_deref() == Some(party_id));
        if !owned {
            return Err(MatchmakerError::TicketNotFound(ticket_id.to_string()));
        }

        self.remove_locked(&mut registry, ticket_id)?;
        info!(ticket_id, party_id, "Party ticket removed");
        Ok(())
    }

    /// Withdraw every solo ticket a session owns (e.g. on disconnect).
    pub fn remove_session_all(&self, session_id: &str) -> Result<usize, MatchmakerError> {
        let mut registry = self.lock_registry()?;
        let ids = registry.tickets_for_session(session_id);
        for ticket_id in &ids {
            self.remove_locked(&mut registry, ticket_id)?;
        }
        if !ids.is_empty() {
            info!(session_id, removed = ids.len(), "Session tickets removed");
        }
        Ok(ids.len())
    }

    /// Withdraw every ticket a party owns (e.g. on disband).
    pub fn remove_party_all(&self, party_id: &str) -> Result<usize, MatchmakerError> {
        let mut registry = self.lock_registry()?;
        let ids = registry.tickets_for_party(party_id);
        for ticket_id in &ids {
            self.remove_locked(&mut registry, ticket_id)?;
        }
        if !ids.is_empty() {
            info!(party_id, removed = ids.len(), "Party tickets removed");
        }
        Ok(ids.len())
    }

    fn remove_locked(
        &self,
        registry: &mut TicketRegistry,
        ticket_id: &str,
    ) -> Result<(), MatchmakerError> {
        self.indexer.delete(ticket_id)?;
        registry.remove(ticket_id);
        Ok(())
    }

    /// Look up a waiting ticket.
    pub fn ticket(&self, ticket_id: &str) -> Result<Option<Ticket>, MatchmakerError> {
        let registry = self.lock_registry()?;
        Ok(registry.get(ticket_id).map(|p| p.ticket.clone()))
    }

    pub fn is_active(&self, ticket_id: &str) -> Result<bool, MatchmakerError> {
        Ok(self.lock_registry()?.is_active(ticket_id))
    }

    pub fn stats(&self) -> Result<MatchmakerStats, MatchmakerError> {
        let registry = self.lock_registry()?;
        Ok(MatchmakerStats {
            tickets: registry.len(),
            pool: registry.pool_size(),
            active: registry.active_size(),
        })
    }

    /// Run one matching pass.
    ///
    /// Takes a consistent index + registry snapshot, assembles groups,
    /// removes matched tickets, promotes pooled tickets that reached their
    /// last interval, then dispatches. An error leaves every unmatched
    /// ticket in place for the next pass.
    pub fn process(&self) -> Result<PassReport, MatchmakerError> {
        let started = Instant::now();
        let mut state = self
            .pass_state
            .lock()
            .map_err(|e| MatchmakerError::LockPoisoned(e.to_string()))?;

        let (index_snapshot, tickets) = {
            let registry = self.lock_registry()?;
            if !state.stale.is_empty() {
                let retried = self.indexer.delete_batch(&state.stale)?;
                debug!(retried, "Re-deleting matched tickets left in the index");
                state.stale.clear();
            }
            self.indexer.commit()?;
            (self.searcher.snapshot()?, registry.snapshot())
        };

        state.intervals.retain(|id, _| tickets.contains(id));

        let mut report = PassReport {
            pool_size: tickets.pool_size(),
            active_size: tickets.active_size(),
            ..Default::default()
        };
        if tickets.tickets.is_empty() {
            report.duration = started.elapsed();
            return Ok(report);
        }

        let gate = PrecisionGate::start(
            self.config.mutual_match,
            Duration::from_millis(self.config.mutual_match_threshold_ms),
        );
        let (assembled, promotions) = {
            let mut ctx = PassContext::new(
                &index_snapshot,
                &tickets,
                &self.config,
                &gate,
                &mut state.intervals,
            );
            let assembled = self.strategy.assemble(&mut ctx);
            (assembled, ctx.take_promotions())
        };
        drop(gate);

        let groups = match assembled {
            Ok(groups) => groups,
            Err(e) => {
                // Interval progress still counts toward activation.
                self.promote(&promotions, &HashSet::new())?;
                warn!(strategy = self.strategy.name(), error = %e, "Pass failed");
                return Err(e);
            }
        };

        let matched_ids: HashSet<String> = groups
            .iter()
            .flat_map(|g| g.ticket_ids())
            .map(str::to_string)
            .collect();

        if !matched_ids.is_empty() {
            let ids: Vec<&String> = matched_ids.iter().collect();
            let mut registry = self.lock_registry()?;
            // Formed groups are always dispatched; failed removals retry.
            let removed = self
                .indexer
                .delete_batch(&ids)
                .and_then(|_| self.indexer.commit());
            if let Err(e) = removed {
                warn!(
                    error = %e,
                    tickets = ids.len(),
                    "Failed to remove matched tickets from the index, retrying next pass"
                );
                state.stale.extend(matched_ids.iter().cloned());
            }
            for ticket_id in &matched_ids {
                if registry.remove(ticket_id).is_none() {
                    debug!(%ticket_id, "Matched ticket was withdrawn during the pass");
                }
                state.intervals.remove(ticket_id);
            }
        }

        report.promoted = self.promote(&promotions, &matched_ids)?;

        for group in &groups {
            self.dispatcher.dispatch(group);
        }

        report.matched = groups;
        report.duration = started.elapsed();
        info!(
            strategy = self.strategy.name(),
            groups = report.matched.len(),
            matched_tickets = matched_ids.len(),
            promoted = report.promoted,
            pool = report.pool_size,
            active = report.active_size,
            duration_ms = report.duration.as_millis() as u64,
            "Pass complete"
        );
        Ok(report)
    }

    fn promote(
        &self,
        promotions: &[String],
        matched: &HashSet<String>,
    ) -> Result<usize, MatchmakerError> {
        if promotions.is_empty() {
            return Ok(0);
        }
        let mut registry = self.lock_registry()?;
        Ok(promotions
            .iter()
            .filter(|id| !matched.contains(*id))
            .filter(|id| registry.promote(id))
            .count())
    }
}

fn validate_request(request: &TicketRequest) -> Result<(), MatchmakerError> {
    if request.presences.is_empty() {
        return Err(MatchmakerError::InvalidRequest(
            "at least one presence is required".to_string(),
        ));
    }
    let mut sessions = HashSet::new();
    for presence in &request.presences {
        if presence.session_id.is_empty() || presence.user_id.is_empty() {
            return Err(MatchmakerError::InvalidRequest(
                "presences need a session id and user id".to_string(),
            ));
        }
        if !sessions.insert(presence.session_id.as_str()) {
            return Err(MatchmakerError::InvalidRequest(format!(
                "duplicate session {}",
                presence.session_id
            )));
        }
    }

    if request.min_count < 1 {
        return Err(MatchmakerError::InvalidCount("min_count must be >= 1".to_string()));
    }
    if request.max_count < request.min_count {
        return Err(MatchmakerError::InvalidCount(format!(
            "max_count {} is below min_count {}",
            request.max_count, request.min_count
        )));
    }
    if request.count_multiple < 1 {
        return Err(MatchmakerError::InvalidCount(
            "count_multiple must be >= 1".to_string(),
        ));
    }
    if request.presences.len() > request.max_count {
        return Err(MatchmakerError::InvalidCount(format!(
            "{} presences exceed max_count {}",
            request.presences.len(),
            request.max_count
        )));
    }
    Ok(())
}

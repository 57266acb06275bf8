//! Exhaustive proposal enumeration with an external selector.
//!
//! For each outer ticket the top candidates are combined in every subset
//! whose members are pairwise compatible and whose size satisfies the outer
//! ticket. Deduplicated proposals go to a [`MatchmakerOverride`], which
//! returns the groups to form. Selections are re-checked against the pass
//! state before they are committed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use matchmaker_types::{MatchedGroup, MatchmakerEntry};
use tracing::{debug, info, warn};

use super::AssemblyStrategy;
use crate::error::MatchmakerError;
use crate::pass::PassContext;
use crate::registry::PooledTicket;

/// A candidate group offered to the override.
#[derive(Debug, Clone)]
pub struct ProposedGroup {
    pub entries: Vec<MatchmakerEntry>,
}

impl ProposedGroup {
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Sorted distinct ticket ids; identifies the proposal.
    pub fn ticket_key(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.iter().map(|e| e.ticket_id.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// Chooses which proposed groups become matches.
///
/// Returning an error fails the pass: nothing is matched and every ticket
/// stays queued for the next pass.
pub trait MatchmakerOverride: Send + Sync {
    fn select(&self, proposals: Vec<ProposedGroup>) -> Result<Vec<ProposedGroup>, String>;
}

impl<F> MatchmakerOverride for F
where
    F: Fn(Vec<ProposedGroup>) -> Result<Vec<ProposedGroup>, String> + Send + Sync,
{
    fn select(&self, proposals: Vec<ProposedGroup>) -> Result<Vec<ProposedGroup>, String> {
        self(proposals)
    }
}

pub struct CustomStrategy {
    selector: Arc<dyn MatchmakerOverride>,
}

impl CustomStrategy {
    pub fn new(selector: Arc<dyn MatchmakerOverride>) -> Self {
        Self { selector }
    }
}

impl std::fmt::Debug for CustomStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomStrategy").finish_non_exhaustive()
    }
}

impl AssemblyStrategy for CustomStrategy {
    fn name(&self) -> &str {
        "custom"
    }

    fn assemble(&self, ctx: &mut PassContext<'_>) -> Result<Vec<MatchedGroup>, MatchmakerError> {
        let limit = ctx.config().batch_size;
        let cap = ctx.config().max_custom_candidates;

        let mut seen: HashSet<Vec<String>> = HashSet::new();
        let mut proposals: Vec<(Vec<String>, Vec<Arc<PooledTicket>>)> = Vec::new();

        for (outer, active) in ctx.processing_order() {
            let last_interval = ctx.begin_interval(&outer, active);

            let mut candidates = ctx.candidates(&outer, limit);
            candidates.truncate(cap);
            if candidates.is_empty() {
                continue;
            }

            for members in enumerate(ctx, &outer, &candidates, last_interval) {
                let mut key: Vec<String> = members.iter().map(|m| m.id().to_string()).collect();
                key.sort();
                if seen.insert(key.clone()) {
                    proposals.push((key, members));
                }
            }
        }

        if proposals.is_empty() {
            return Ok(Vec::new());
        }

        let offered: Vec<ProposedGroup> = proposals
            .iter()
            .map(|(_, members)| ProposedGroup {
                entries: members.iter().flat_map(|m| m.ticket.to_entries()).collect(),
            })
            .collect();
        let offered_count = offered.len();

        let selected = self.selector.select(offered).map_err(|e| {
            warn!(error = %e, proposals = offered_count, "Matchmaker override failed");
            MatchmakerError::Override(e)
        })?;

        let by_key: HashMap<Vec<String>, Vec<Arc<PooledTicket>>> = proposals.into_iter().collect();
        let mut groups = Vec::new();
        for choice in selected {
            let key = choice.ticket_key();
            let Some(members) = by_key.get(&key) else {
                warn!(tickets = ?key, "Override returned a group that was not proposed");
                continue;
            };
            if !members.iter().all(|m| ctx.is_available(m)) {
                debug!(tickets = ?key, "Override selection overlaps an earlier group");
                continue;
            }
            groups.push(ctx.commit_group(members));
        }

        info!(
            proposals = offered_count,
            selected = groups.len(),
            "Override selection applied"
        );
        Ok(groups)
    }
}

/// Every valid member list (outer first) from subsets of `candidates`.
fn enumerate(
    ctx: &mut PassContext<'_>,
    outer: &Arc<PooledTicket>,
    candidates: &[Arc<PooledTicket>],
    last_interval: bool,
) -> Vec<Vec<Arc<PooledTicket>>> {
    let n = candidates.len();

    // compatible[i] has bit j set when candidates i and j can share a group
    let mut compatible = vec![0u32; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let (a, b) = (&candidates[i], &candidates[j]);
            if a.ticket.shares_session(&b.ticket)
                || a.ticket.party_conflict(&b.ticket)
                || !a.ticket.counts_compatible(&b.ticket)
            {
                continue;
            }
            if ctx.mutually_compatible(a, b) {
                compatible[i] |= 1 << j;
                compatible[j] |= 1 << i;
            }
        }
    }

    let ticket = &outer.ticket;
    let mut found = Vec::new();
    for mask in 1u32..(1u32 << n) {
        let mut size = ticket.count();
        let mut valid = true;
        for (i, candidate) in candidates.iter().enumerate() {
            if mask & (1 << i) == 0 {
                continue;
            }
            let others = mask & !(1 << i);
            if compatible[i] & others != others {
                valid = false;
                break;
            }
            size += candidate.ticket.count();
        }
        if !valid || size > ticket.max_count {
            continue;
        }
        if !last_interval && size != ticket.max_count {
            continue;
        }
        if !ticket.accepts_size(size) {
            continue;
        }

        let mut members = Vec::with_capacity(mask.count_ones() as usize + 1);
        members.push(outer.clone());
        members.extend(
            candidates
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, c)| c.clone()),
        );
        if members[1..].iter().all(|m| m.ticket.accepts_size(size)) {
            found.push(members);
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::PrecisionGate;
    use crate::pass::tests::PassFixture;
    use matchmaker_types::{MatchmakerConfig, TicketRequest};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    fn run(
        fixture: &mut PassFixture,
        selector: Arc<dyn MatchmakerOverride>,
    ) -> Result<Vec<MatchedGroup>, MatchmakerError> {
        let (index, tickets) = fixture.snapshots();
        let gate = PrecisionGate::disabled();
        let mut ctx = PassContext::new(
            &index,
            &tickets,
            &fixture.config,
            &gate,
            &mut fixture.intervals,
        );
        CustomStrategy::new(selector).assemble(&mut ctx)
    }

    #[test]
    fn test_proposals_are_deduplicated() {
        let mut fixture = PassFixture::new(MatchmakerConfig::default());
        fixture.solo("s1", 2, 2, 1);
        fixture.solo("s2", 2, 2, 1);
        fixture.solo("s3", 2, 2, 1);

        let offered = Arc::new(Mutex::new(Vec::new()));
        let sink = offered.clone();
        let selector = move |proposals: Vec<ProposedGroup>| -> Result<Vec<ProposedGroup>, String> {
            sink.lock().unwrap().extend(proposals.iter().map(|p| p.ticket_key()));
            Ok(Vec::new())
        };

        let groups = run(&mut fixture, Arc::new(selector)).unwrap();
        assert!(groups.is_empty());

        // three tickets make exactly three distinct pairs
        let offered = offered.lock().unwrap();
        assert_eq!(offered.len(), 3);
        assert_eq!(offered.iter().collect::<BTreeSet<_>>().len(), 3);
    }

    #[test]
    fn test_selector_picks_groups() {
        let mut fixture = PassFixture::new(MatchmakerConfig::default());
        let a = fixture.solo("s1", 2, 2, 1);
        let b = fixture.solo("s2", 2, 2, 1);
        let c = fixture.solo("s3", 2, 2, 1);

        let wanted = BTreeSet::from([a.clone(), c.clone()]);
        let selector = move |proposals: Vec<ProposedGroup>| -> Result<Vec<ProposedGroup>, String> {
            Ok(proposals
                .into_iter()
                .filter(|p| p.ticket_key().into_iter().collect::<BTreeSet<_>>() == wanted)
                .collect())
        };

        let groups = run(&mut fixture, Arc::new(selector)).unwrap();
        assert_eq!(groups.len(), 1);
        let ids: BTreeSet<String> = groups[0]
            .ticket_ids()
            .into_iter()
            .map(str::to_string)
            .collect();
        assert_eq!(ids, BTreeSet::from([a, c]));
        assert!(!ids.contains(&b));
    }

    #[test]
    fn test_overlapping_selections_first_wins() {
        let mut fixture = PassFixture::new(MatchmakerConfig::default());
        fixture.solo("s1", 2, 2, 1);
        fixture.solo("s2", 2, 2, 1);
        fixture.solo("s3", 2, 2, 1);

        // accept everything: only one pair can form from three tickets
        let selector =
            |proposals: Vec<ProposedGroup>| -> Result<Vec<ProposedGroup>, String> { Ok(proposals) };
        let groups = run(&mut fixture, Arc::new(selector)).unwrap();
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn test_unknown_selection_ignored() {
        let mut fixture = PassFixture::new(MatchmakerConfig::default());
        fixture.solo("s1", 2, 2, 1);
        fixture.solo("s2", 2, 2, 1);

        let selector = |mut proposals: Vec<ProposedGroup>| -> Result<Vec<ProposedGroup>, String> {
            for p in &mut proposals {
                p.entries.truncate(1);
            }
            Ok(proposals)
        };
        let groups = run(&mut fixture, Arc::new(selector)).unwrap();
        assert!(groups.is_empty());
    }

    #[test]
    fn test_selector_error_fails_pass() {
        let mut fixture = PassFixture::new(MatchmakerConfig::default());
        fixture.solo("s1", 2, 2, 1);
        fixture.solo("s2", 2, 2, 1);

        let selector = |_: Vec<ProposedGroup>| -> Result<Vec<ProposedGroup>, String> {
            Err("script exploded".to_string())
        };
        let err = run(&mut fixture, Arc::new(selector)).unwrap_err();
        assert!(matches!(err, MatchmakerError::Override(msg) if msg == "script exploded"));
    }

    #[test]
    fn test_partial_sizes_only_on_last_interval() {
        let mut fixture = PassFixture::new(MatchmakerConfig::default());
        fixture.solo("s1", 2, 3, 1);
        fixture.solo("s2", 2, 3, 1);

        let sizes = Arc::new(Mutex::new(Vec::new()));
        let sink = sizes.clone();
        let record = move |proposals: Vec<ProposedGroup>| -> Result<Vec<ProposedGroup>, String> {
            sink.lock().unwrap().extend(proposals.iter().map(ProposedGroup::size));
            Ok(Vec::new())
        };
        let selector: Arc<dyn MatchmakerOverride> = Arc::new(record);

        // first interval: a pair is below max and not proposed
        run(&mut fixture, selector.clone()).unwrap();
        assert!(sizes.lock().unwrap().is_empty());

        // last interval: the pair is proposed
        run(&mut fixture, selector).unwrap();
        assert_eq!(*sizes.lock().unwrap(), vec![2]);
    }

    #[test]
    fn test_party_tickets_not_proposed_together() {
        let mut fixture = PassFixture::new(MatchmakerConfig::default());
        fixture.solo("s1", 3, 3, 1);
        fixture.add(TicketRequest::solo("s2", "u2", "*", 3, 3, 1).with_party("p2"));
        fixture.add(TicketRequest::solo("s3", "u3", "*", 3, 3, 1).with_party("p2"));

        let offered = Arc::new(Mutex::new(0usize));
        let sink = offered.clone();
        let accept_all =
            move |proposals: Vec<ProposedGroup>| -> Result<Vec<ProposedGroup>, String> {
                *sink.lock().unwrap() += proposals.len();
                Ok(proposals)
            };

        let groups = run(&mut fixture, Arc::new(accept_all)).unwrap();
        assert!(groups.is_empty());
        assert_eq!(*offered.lock().unwrap(), 0);
    }
}


//! Greedy buffer assembly with trimming.

use std::sync::Arc;

use matchmaker_types::MatchedGroup;
use tracing::{debug, trace};

use super::AssemblyStrategy;
use crate::error::MatchmakerError;
use crate::pass::PassContext;
use crate::registry::PooledTicket;
use crate::trim::{removal_plans, TrimMember};

/// For each outer ticket, distribute candidates into compatible buffers in
/// rank order and accept the first buffer that completes a valid group.
///
/// A buffer completes when it reaches the outer ticket's max count, or, on
/// the outer ticket's last interval, when it meets the min count and no
/// later candidate could still extend it.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultStrategy;

impl AssemblyStrategy for DefaultStrategy {
    fn name(&self) -> &str {
        "default"
    }

    fn assemble(&self, ctx: &mut PassContext<'_>) -> Result<Vec<MatchedGroup>, MatchmakerError> {
        let mut groups = Vec::new();
        let limit = ctx.config().batch_size;

        for (outer, active) in ctx.processing_order() {
            if !ctx.is_available(&outer) {
                continue;
            }
            let last_interval = ctx.begin_interval(&outer, active);

            let candidates = ctx.candidates(&outer, limit);
            if candidates.is_empty() {
                trace!(ticket_id = outer.id(), "No candidates");
                continue;
            }

            if let Some(members) = assemble_for(ctx, &outer, &candidates, last_interval) {
                let group = ctx.commit_group(&members);
                debug!(
                    ticket_id = outer.id(),
                    size = group.size(),
                    tickets = members.len(),
                    last_interval,
                    "Formed group"
                );
                groups.push(group);
            }
        }

        Ok(groups)
    }
}

fn entry_count(buffer: &[Arc<PooledTicket>]) -> usize {
    buffer.iter().map(|t| t.ticket.count()).sum()
}

/// Returns the full member list (outer first) of the accepted group.
fn assemble_for(
    ctx: &mut PassContext<'_>,
    outer: &Arc<PooledTicket>,
    candidates: &[Arc<PooledTicket>],
    last_interval: bool,
) -> Option<Vec<Arc<PooledTicket>>> {
    let outer_count = outer.ticket.count();
    let max = outer.ticket.max_count;
    let min = outer.ticket.min_count;
    let mut buffers: Vec<Vec<Arc<PooledTicket>>> = Vec::new();

    for (rank, hit) in candidates.iter().enumerate() {
        let hit_count = hit.ticket.count();
        if outer_count + hit_count > max || outer.ticket.party_conflict(&hit.ticket) {
            continue;
        }

        let mut slot = None;
        for (i, buffer) in buffers.iter().enumerate() {
            if outer_count + entry_count(buffer) + hit_count > max {
                continue;
            }
            if buffer.iter().any(|m| {
                m.ticket.shares_session(&hit.ticket) || m.ticket.party_conflict(&hit.ticket)
            }) {
                continue;
            }
            if buffer.iter().all(|m| ctx.mutually_compatible(m, hit)) {
                slot = Some(i);
                break;
            }
        }
        let slot = match slot {
            Some(i) => {
                buffers[i].push(hit.clone());
                i
            }
            None => {
                buffers.push(vec![hit.clone()]);
                buffers.len() - 1
            }
        };

        let size = outer_count + entry_count(&buffers[slot]);
        let complete = size == max
            || (last_interval
                && size >= min
                && !candidates[rank + 1..]
                    .iter()
                    .any(|next| size + next.ticket.count() <= max));
        if !complete {
            continue;
        }

        if let Some(members) = finalize(outer, &buffers[slot]) {
            return Some(members);
        }
    }

    // Out of candidates: on the last interval any buffer meeting the min
    // can no longer be extended. Largest first.
    if last_interval {
        buffers.sort_by_key(|b| std::cmp::Reverse(entry_count(b)));
        for buffer in &buffers {
            if outer_count + entry_count(buffer) < min {
                break;
            }
            if let Some(members) = finalize(outer, buffer) {
                return Some(members);
            }
        }
    }

    None
}

/// Trim the buffer to a multiple of the outer ticket's count multiple and
/// validate every member against the final size.
fn finalize(
    outer: &Arc<PooledTicket>,
    buffer: &[Arc<PooledTicket>],
) -> Option<Vec<Arc<PooledTicket>>> {
    let size = outer.ticket.count() + entry_count(buffer);
    let trim_members: Vec<TrimMember> = buffer
        .iter()
        .map(|t| TrimMember {
            count: t.ticket.count(),
            created_at_ms: t.ticket.created_at_ms(),
        })
        .collect();

    for plan in removal_plans(
        &trim_members,
        size,
        outer.ticket.count_multiple,
        outer.ticket.min_count,
    ) {
        let final_size = size - plan.excess;
        let kept: Vec<&Arc<PooledTicket>> = buffer
            .iter()
            .enumerate()
            .filter(|(i, _)| plan.keeps(*i))
            .map(|(_, t)| t)
            .collect();
        if kept.is_empty() || !outer.ticket.accepts_size(final_size) {
            continue;
        }
        if kept.iter().all(|t| t.ticket.accepts_size(final_size)) {
            let mut members = Vec::with_capacity(kept.len() + 1);
            members.push(outer.clone());
            members.extend(kept.into_iter().cloned());
            return Some(members);
        }
    }
    None
}

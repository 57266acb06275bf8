//! Two-way query validation between ticket pairs.

use std::collections::HashMap;

use matchmaker_index::TicketSnapshot;
use tracing::warn;

use crate::registry::PooledTicket;

/// Memoizes pair results for the lifetime of one pass.
#[derive(Debug, Default)]
pub struct MutualMatcher {
    memo: HashMap<(String, String), bool>,
}

impl MutualMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when each ticket's query matches the other ticket's document.
    ///
    /// Index failures count as a mismatch so the pair is never grouped on an
    /// unverified answer.
    pub fn check(&mut self, snapshot: &TicketSnapshot, a: &PooledTicket, b: &PooledTicket) -> bool {
        let key = if a.id() <= b.id() {
            (a.id().to_string(), b.id().to_string())
        } else {
            (b.id().to_string(), a.id().to_string())
        };
        if let Some(&cached) = self.memo.get(&key) {
            return cached;
        }

        let result = one_way(snapshot, a, b) && one_way(snapshot, b, a);
        self.memo.insert(key, result);
        result
    }

    pub fn len(&self) -> usize {
        self.memo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memo.is_empty()
    }
}

fn one_way(snapshot: &TicketSnapshot, from: &PooledTicket, to: &PooledTicket) -> bool {
    match snapshot.matches(&from.query, to.id()) {
        Ok(found) => found,
        Err(e) => {
            warn!(from = from.id(), to = to.id(), error = %e, "Mutual match check failed");
            false
        }
    }
}

//! Removal plans that bring an oversized group down to a valid multiple.
//!
//! Given the members that could be dropped from a candidate group, produce
//! plans in order of increasing excess: `size % multiple`, then one more
//! multiple, and so on while the remaining size stays at or above the
//! floor. For each excess the plan removes an exact-sum subset of members,
//! preferring the subset with the latest average creation time and then
//! the fewest members. Older tickets are kept.

/// Members beyond this many (youngest first) are never considered for removal.
pub const MAX_TRIM_MEMBERS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimMember {
    pub count: usize,
    pub created_at_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrimPlan {
    /// Entries removed
    pub excess: usize,
    /// Indexes into the member slice
    pub removed: Vec<usize>,
}

impl TrimPlan {
    pub fn keeps(&self, index: usize) -> bool {
        !self.removed.contains(&index)
    }
}

/// All viable removal plans for a group of `size` entries.
///
/// `members` are the removable tickets. A group already at a multiple
/// yields an empty plan first.
pub fn removal_plans(
    members: &[TrimMember],
    size: usize,
    multiple: usize,
    floor: usize,
) -> Vec<TrimPlan> {
    if multiple == 0 || size == 0 {
        return Vec::new();
    }

    let mut plans = Vec::new();
    let mut excess = size % multiple;
    while excess < size && size - excess >= floor {
        if excess == 0 {
            plans.push(TrimPlan {
                excess,
                removed: Vec::new(),
            });
        } else if let Some(removed) = best_subset(members, excess) {
            plans.push(TrimPlan { excess, removed });
        }
        excess += multiple;
    }
    plans
}

/// Exact-sum subset of members, each no larger than `target`, preferring
/// the latest average creation time, then fewer members.
fn best_subset(members: &[TrimMember], target: usize) -> Option<Vec<usize>> {
    let mut eligible: Vec<usize> = (0..members.len())
        .filter(|&i| members[i].count <= target)
        .collect();
    eligible.sort_by(|&a, &b| members[b].created_at_ms.cmp(&members[a].created_at_ms));
    eligible.truncate(MAX_TRIM_MEMBERS);

    // (created sum, member count, mask)
    let mut best: Option<(i128, usize, u32)> = None;
    for mask in 1u32..(1u32 << eligible.len()) {
        let mut sum = 0usize;
        let mut created = 0i128;
        let mut picked = 0usize;
        for (bit, &i) in eligible.iter().enumerate() {
            if mask & (1 << bit) != 0 {
                sum += members[i].count;
                created += members[i].created_at_ms as i128;
                picked += 1;
            }
        }
        if sum != target {
            continue;
        }

        let better = match best {
            None => true,
            Some((best_created, best_picked, _)) => {
                // compare averages without dividing: a/n > b/m  <=>  a*m > b*n
                let lhs = created * best_picked as i128;
                let rhs = best_created * picked as i128;
                lhs > rhs || (lhs == rhs && picked < best_picked)
            }
        };
        if better {
            best = Some((created, picked, mask));
        }
    }

    best.map(|(_, _, mask)| {
        let mut removed: Vec<usize> = eligible
            .iter()
            .enumerate()
            .filter(|(bit, _)| mask & (1 << bit) != 0)
            .map(|(_, &i)| i)
            .collect();
        removed.sort_unstable();
        removed
    })
}

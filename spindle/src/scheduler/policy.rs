/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Next-slot selection for `yield_now` and `finish`.
//!
//! Both policies look at every slot except the current one, pick one
//! runnable slot and count all runnable slots they passed over, so the
//! returned count is the same for either policy.  They differ only in where
//! the scan starts:
//!
//! | Policy | Scan order (capacity 4, current 2) |
//! |---|---|
//! | `LowestIndexFirst` | 0, 1, 3 |
//! | `RoundRobin` | 3, 0, 1 |
//!
//! `LowestIndexFirst` restarts at 0 on every call, so a low-indexed fiber
//! that stays runnable is picked ahead of higher-indexed ones each time.

use crate::config::SchedPolicy;
use crate::table::SlotId;

/// Outcome of a scan that found at least one other runnable slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// Slot to switch to.
    pub next: SlotId,
    /// Runnable slots other than the current one, `next` included.
    pub others: usize,
}

/// Scans `capacity` slots according to `policy`, skipping `current`.
///
/// Returns `None` when no other slot is runnable.
pub fn select(
    policy: SchedPolicy,
    capacity: usize,
    current: SlotId,
    is_runnable: impl Fn(SlotId) -> bool,
) -> Option<Selection> {
    let mut next = None;
    let mut others = 0;

    for candidate in scan_order(policy, capacity, current) {
        if candidate == current || !is_runnable(candidate) {
            continue;
        }
        if next.is_none() {
            next = Some(candidate);
        }
        others += 1;
    }

    next.map(|next| Selection { next, others })
}

fn scan_order(
    policy: SchedPolicy,
    capacity: usize,
    current: SlotId,
) -> impl Iterator<Item = SlotId> {
    let start = match policy {
        SchedPolicy::LowestIndexFirst => 0,
        SchedPolicy::RoundRobin => current + 1,
    };
    (0..capacity).map(move |offset| (start + offset) % capacity)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn runnable(set: &[SlotId]) -> impl Fn(SlotId) -> bool + '_ {
        move |id| set.contains(&id)
    }

    // ── LowestIndexFirst ──────────────────────────────────────────────────────

    #[test]
    fn lowest_first_picks_lowest_runnable_other_slot() {
        let sel = select(SchedPolicy::LowestIndexFirst, 4, 2, runnable(&[1, 2, 3])).unwrap();
        assert_eq!(sel, Selection { next: 1, others: 2 });
    }

    #[test]
    fn lowest_first_prefers_root_when_runnable() {
        let sel = select(SchedPolicy::LowestIndexFirst, 4, 3, runnable(&[0, 1, 3])).unwrap();
        assert_eq!(sel.next, 0);
        assert_eq!(sel.others, 2);
    }

    #[test]
    fn only_current_runnable_returns_none() {
        for policy in [SchedPolicy::LowestIndexFirst, SchedPolicy::RoundRobin] {
            assert_eq!(select(policy, 4, 0, runnable(&[0])), None);
            assert_eq!(select(policy, 4, 2, runnable(&[2])), None);
        }
    }

    #[test]
    fn nothing_runnable_returns_none() {
        // A finishing slot is no longer runnable, and may be the last one.
        assert_eq!(select(SchedPolicy::LowestIndexFirst, 4, 1, runnable(&[])), None);
    }

    #[test]
    fn low_index_is_favoured_on_repeated_calls() {
        // Root, 1 and 2 all stay runnable: control bounces between root and
        // slot 1 while slot 2 is never picked.
        let set = [0, 1, 2];
        let mut current = 0;
        let mut visited = Vec::new();
        for _ in 0..6 {
            current = select(SchedPolicy::LowestIndexFirst, 3, current, runnable(&set))
                .unwrap()
                .next;
            visited.push(current);
        }
        assert_eq!(visited, vec![1, 0, 1, 0, 1, 0]);
    }

    // ── RoundRobin ────────────────────────────────────────────────────────────

    #[test]
    fn round_robin_starts_after_current() {
        let sel = select(SchedPolicy::RoundRobin, 4, 1, runnable(&[0, 1, 2, 3])).unwrap();
        assert_eq!(sel, Selection { next: 2, others: 3 });
    }

    #[test]
    fn round_robin_wraps_around() {
        let sel = select(SchedPolicy::RoundRobin, 4, 3, runnable(&[1, 3])).unwrap();
        assert_eq!(sel, Selection { next: 1, others: 1 });
    }

    #[test]
    fn round_robin_visits_every_runnable_slot_in_turn() {
        let set = [0, 1, 2, 3];
        let mut current = 0;
        let mut visited = Vec::new();
        for _ in 0..4 {
            current = select(SchedPolicy::RoundRobin, 4, current, runnable(&set))
                .unwrap()
                .next;
            visited.push(current);
        }
        assert_eq!(visited, vec![1, 2, 3, 0]);
    }

    #[test]
    fn count_is_identical_for_both_policies() {
        let set = [0, 2, 3, 5];
        for current in 0..6 {
            let a = select(SchedPolicy::LowestIndexFirst, 6, current, runnable(&set));
            let b = select(SchedPolicy::RoundRobin, 6, current, runnable(&set));
            assert_eq!(a.map(|s| s.others), b.map(|s| s.others), "current = {current}");
        }
    }

    #[test]
    fn scan_order_covers_every_slot_once() {
        for policy in [SchedPolicy::LowestIndexFirst, SchedPolicy::RoundRobin] {
            let mut order: Vec<_> = scan_order(policy, 5, 3).collect();
            order.sort_unstable();
            assert_eq!(order, vec![0, 1, 2, 3, 4]);
        }
    }
}

//! K-way merge of per-segment ranked lists.
//!
//! Multi-index search (segments, shards) runs one query per index and
//! meets here: the merger re-applies the selector's exact comparator over
//! the already-sorted inputs, so the global list needs no re-scoring and
//! stays deterministic.

use rustc_hash::FxHashSet;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use suggest_core::types::{Ranked, Suggestion};

struct Head<'a> {
    segment: usize,
    offset: usize,
    item: &'a Ranked,
}

impl PartialEq for Head<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Head<'_> {}

impl PartialOrd for Head<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Head<'_> {
    // Max-heap: higher score first, then lower order, then lower segment.
    fn cmp(&self, other: &Self) -> Ordering {
        self.item
            .score
            .cmp(&other.item.score)
            .then_with(|| other.item.order.cmp(&self.item.order))
            .then_with(|| other.segment.cmp(&self.segment))
    }
}

/// Merge per-segment top-K lists, each already sorted by
/// `(score desc, order asc)`, into one global top-K under the same rule.
///
/// Surfaces appearing in several segments are deduplicated, keeping the
/// better-ranked occurrence. `order` keys must be globally comparable:
/// give each segment a disjoint range (e.g. add a per-segment base to the
/// entry ordinals) before merging.
pub fn merge(segments: &[Vec<Ranked>], k: usize) -> Vec<Suggestion> {
    let mut heap = BinaryHeap::with_capacity(segments.len());
    for (segment, list) in segments.iter().enumerate() {
        if let Some(item) = list.first() {
            heap.push(Head { segment, offset: 0, item });
        }
    }

    let mut seen: FxHashSet<&str> = FxHashSet::default();
    let mut out = Vec::with_capacity(k.min(64));
    while out.len() < k {
        let Some(head) = heap.pop() else { break };
        if seen.insert(head.item.text.as_str()) {
            out.push(Suggestion { text: head.item.text.clone(), score: head.item.score });
        }
        let offset = head.offset + 1;
        if let Some(item) = segments[head.segment].get(offset) {
            heap.push(Head { segment: head.segment, offset, item });
        }
    }
    out
}

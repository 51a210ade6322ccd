//! Bounded best-K selection with a deterministic total order.
//!
//! Ordering is `(score desc, insertion order asc)`: among equal scores the
//! entry indexed earlier wins. Identical surfaces are deduplicated during
//! selection, keeping the better-ranked occurrence. Memory stays O(K): the
//! working set is pruned back to K whenever it doubles.

use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::collections::hash_map::Entry;

use suggest_core::types::Ranked;

type Key = (u64, u64); // (score, insertion order)

fn beats(a: Key, b: Key) -> bool {
    a.0 > b.0 || (a.0 == b.0 && a.1 < b.1)
}

fn rank(a: &(&str, Key), b: &(&str, Key)) -> Ordering {
    b.1 .0.cmp(&a.1 .0).then_with(|| a.1 .1.cmp(&b.1 .1))
}

pub(crate) struct TopK<'a> {
    k: usize,
    cap: usize,
    best: FxHashMap<&'a str, Key>,
}

impl<'a> TopK<'a> {
    pub(crate) fn new(k: usize) -> Self {
        Self { k, cap: (2 * k).max(32), best: FxHashMap::default() }
    }

    pub(crate) fn insert(&mut self, surface: &'a str, score: u64, order: u64) {
        let key = (score, order);
        match self.best.entry(surface) {
            Entry::Occupied(mut occupied) => {
                if beats(key, *occupied.get()) {
                    occupied.insert(key);
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(key);
            }
        }
        if self.best.len() >= self.cap {
            self.prune();
        }
    }

    fn prune(&mut self) {
        let mut all: Vec<(&'a str, Key)> = self.best.drain().collect();
        all.sort_unstable_by(rank);
        all.truncate(self.k);
        self.best = all.into_iter().collect();
    }

    pub(crate) fn finish(mut self) -> Vec<Ranked> {
        let mut all: Vec<(&'a str, Key)> = self.best.drain().collect();
        all.sort_unstable_by(rank);
        all.truncate(self.k);
        all.into_iter()
            .map(|(surface, (score, order))| Ranked { text: surface.to_string(), score, order })
            .collect()
    }
}

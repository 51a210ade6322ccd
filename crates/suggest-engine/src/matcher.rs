//! Query traversal over the compiled trie.
//!
//! All three match modes drive the same depth-first walk and feed
//! surviving candidates through the context filter into the selector.
//! Regex patterns are compiled into an anchored dense DFA that is stepped
//! along trie edges, so dead states prune whole subtrees instead of
//! post-filtering enumerated surfaces. Fuzzy matching propagates
//! Damerau-Levenshtein rows down the trie and accepts a whole subtree as
//! soon as the full pattern fits the edit budget.

use regex_automata::dfa::dense;
use regex_automata::dfa::{Automaton, StartKind};
use regex_automata::{Anchored, Input};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use suggest_core::error::{Error, Result};
use suggest_core::types::{MatchMode, Ranked, SuggestRequest};

use crate::context::ResolvedContexts;
use crate::index::Compiled;
use crate::score;
use crate::topk::TopK;

/// Traversal steps between deadline/cancellation checks.
const CHECK_INTERVAL: u32 = 256;

/// Cooperative cancellation for one query: an absolute deadline, a shared
/// flag, or both. Checked between traversal steps; a triggered control
/// fails the query with [`Error::Cancelled`] and discards partial results.
#[derive(Debug, Clone, Default)]
pub struct QueryControl {
    pub deadline: Option<Instant>,
    pub cancel: Option<Arc<AtomicBool>>,
}

impl QueryControl {
    pub fn with_deadline(deadline: Instant) -> Self {
        Self { deadline: Some(deadline), cancel: None }
    }

    pub fn with_flag(flag: Arc<AtomicBool>) -> Self {
        Self { deadline: None, cancel: Some(flag) }
    }

    fn triggered(&self) -> bool {
        if let Some(flag) = &self.cancel {
            if flag.load(Ordering::Relaxed) {
                return true;
            }
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return true;
            }
        }
        false
    }
}

struct Traversal<'a> {
    compiled: &'a Compiled,
    resolved: &'a ResolvedContexts,
    control: &'a QueryControl,
    selector: TopK<'a>,
    steps: u32,
}

impl<'a> Traversal<'a> {
    fn new(
        compiled: &'a Compiled,
        resolved: &'a ResolvedContexts,
        control: &'a QueryControl,
        k: usize,
    ) -> Self {
        Self { compiled, resolved, control, selector: TopK::new(k), steps: 0 }
    }

    fn step(&mut self) -> Result<()> {
        self.steps += 1;
        if self.steps % CHECK_INTERVAL == 0 && self.control.triggered() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    /// Filter-then-score the entries terminating at `node`.
    fn offer(&mut self, node: u32) {
        for &id in self.compiled.entries_at(node) {
            let entry = &self.compiled.entries[id as usize];
            if let Some(multiplier) = score::context_multiplier(&entry.contexts, self.resolved) {
                let score = u64::from(entry.weight) * multiplier;
                self.selector.insert(entry.surface.as_str(), score, u64::from(id));
            }
        }
    }

    /// Every completion below `node` is a text match; enumerate them.
    fn collect_subtree(&mut self, node: u32) -> Result<()> {
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            self.step()?;
            self.offer(current);
            let (_, targets) = self.compiled.edges(current);
            stack.extend_from_slice(targets);
        }
        Ok(())
    }
}

pub(crate) fn run(
    compiled: &Compiled,
    request: &SuggestRequest,
    resolved: &ResolvedContexts,
    control: &QueryControl,
) -> Result<Vec<Ranked>> {
    let mut traversal = Traversal::new(compiled, resolved, control, request.size);
    match &request.mode {
        MatchMode::Prefix => run_prefix(&mut traversal, request.pattern.as_bytes())?,
        MatchMode::Regex => run_regex(&mut traversal, &request.pattern)?,
        MatchMode::Fuzzy { max_edits } => {
            run_fuzzy(&mut traversal, request.pattern.as_bytes(), *max_edits)?;
        }
    }
    Ok(traversal.selector.finish())
}

fn run_prefix(traversal: &mut Traversal, pattern: &[u8]) -> Result<()> {
    let mut node = traversal.compiled.root();
    for &byte in pattern {
        match traversal.compiled.child(node, byte) {
            Some(child) => node = child,
            None => return Ok(()),
        }
    }
    traversal.collect_subtree(node)
}

fn run_regex(traversal: &mut Traversal, pattern: &str) -> Result<()> {
    let dfa = dense::Builder::new()
        .configure(dense::DFA::config().start_kind(StartKind::Anchored))
        .build(pattern)
        .map_err(|e| Error::Pattern(e.to_string()))?;
    let start = dfa
        .start_state_forward(&Input::new("").anchored(Anchored::Yes))
        .map_err(|e| Error::Pattern(e.to_string()))?;

    let mut stack = vec![(traversal.compiled.root(), start)];
    while let Some((node, state)) = stack.pop() {
        traversal.step()?;
        if !traversal.compiled.entries_at(node).is_empty()
            && dfa.is_match_state(dfa.next_eoi_state(state))
        {
            traversal.offer(node);
        }
        let (labels, targets) = traversal.compiled.edges(node);
        for (i, &label) in labels.iter().enumerate() {
            let next = dfa.next_state(state, label);
            if !dfa.is_dead_state(next) && !dfa.is_quit_state(next) {
                stack.push((targets[i], next));
            }
        }
    }
    Ok(())
}

/// One DFS frame of the edit-distance walk: the DP row for the node's
/// path, plus the previous row and edge label for transpositions.
struct FuzzyFrame {
    node: u32,
    row: Vec<u32>,
    prev_row: Option<Vec<u32>>,
    prev_label: u8,
}

fn run_fuzzy(traversal: &mut Traversal, pattern: &[u8], max_edits: u8) -> Result<()> {
    if max_edits > 2 {
        return Err(Error::Pattern(format!("max_edits must be 0..=2, got {max_edits}")));
    }
    let budget = u32::from(max_edits);
    let m = pattern.len();
    let root_row: Vec<u32> = (0..=m as u32).collect();
    if root_row[m] <= budget {
        // The empty prefix already matches the whole pattern.
        return traversal.collect_subtree(traversal.compiled.root());
    }

    let mut stack = vec![FuzzyFrame {
        node: traversal.compiled.root(),
        row: root_row,
        prev_row: None,
        prev_label: 0,
    }];
    while let Some(frame) = stack.pop() {
        traversal.step()?;
        let (labels, targets) = traversal.compiled.edges(frame.node);
        for (i, &label) in labels.iter().enumerate() {
            let mut row = vec![0u32; m + 1];
            row[0] = frame.row[0] + 1;
            for j in 1..=m {
                let substitution = u32::from(pattern[j - 1] != label);
                let mut best = (row[j - 1] + 1)
                    .min(frame.row[j] + 1)
                    .min(frame.row[j - 1] + substitution);
                if j >= 2 && pattern[j - 1] == frame.prev_label && pattern[j - 2] == label {
                    if let Some(prev_row) = &frame.prev_row {
                        best = best.min(prev_row[j - 2] + 1);
                    }
                }
                row[j] = best;
            }
            if row[m] <= budget {
                // Some prefix ending here is close enough; the whole
                // subtree completes it.
                traversal.collect_subtree(targets[i])?;
                continue;
            }
            if row.iter().copied().min().unwrap_or(u32::MAX) <= budget {
                stack.push(FuzzyFrame {
                    node: targets[i],
                    row,
                    prev_row: Some(frame.row.clone()),
                    prev_label: label,
                });
            }
        }
    }
    Ok(())
}

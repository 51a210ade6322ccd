//! The completion index: an append-only build phase over a byte trie,
//! compiled by `finalize` into immutable flat arrays that are safe for
//! unlimited concurrent readers.

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use suggest_core::error::{Error, Result};
use suggest_core::types::{ContextDimension, EntryInput, Ranked, SuggestRequest, Suggestion};

use crate::context::DimensionTable;
use crate::matcher::{self, QueryControl};

/// One indexed entry. `contexts` holds sorted token ids per dimension
/// ordinal; the entry's position in the arena is its insertion order and
/// the tie-break key for ranking.
pub(crate) struct EntryData {
    pub(crate) surface: String,
    pub(crate) weight: u32,
    pub(crate) contexts: Vec<Vec<u32>>,
}

#[derive(Default)]
struct BuildNode {
    children: FxHashMap<u8, u32>,
    entries: Vec<u32>,
}

struct Builder {
    nodes: Vec<BuildNode>,
    entries: Vec<EntryData>,
}

impl Builder {
    fn new() -> Self {
        Self { nodes: vec![BuildNode::default()], entries: Vec::new() }
    }

    fn insert(&mut self, surface: String, weight: u32, contexts: Vec<Vec<u32>>) {
        let mut node = 0usize;
        for &byte in surface.as_bytes() {
            let next = self.nodes.len() as u32;
            let child = *self.nodes[node].children.entry(byte).or_insert(next);
            if child == next {
                self.nodes.push(BuildNode::default());
            }
            node = child as usize;
        }
        let id = self.entries.len() as u32;
        self.nodes[node].entries.push(id);
        self.entries.push(EntryData { surface, weight, contexts });
    }

    /// Compile the hash-map trie into flat arrays: nodes renumbered in
    /// breadth-first order, edges sorted by label for binary-search
    /// descent, entry lists concatenated with per-node ranges.
    fn compile(self) -> Compiled {
        let node_count = self.nodes.len();
        let mut order: Vec<u32> = Vec::with_capacity(node_count);
        order.push(0);
        let mut node_edge_start = Vec::with_capacity(node_count + 1);
        let mut edge_labels = Vec::new();
        let mut edge_targets = Vec::new();
        let mut node_entry_start = Vec::with_capacity(node_count + 1);
        let mut entry_ids = Vec::with_capacity(self.entries.len());

        let mut head = 0usize;
        while head < order.len() {
            let old = order[head] as usize;
            head += 1;
            node_edge_start.push(edge_labels.len() as u32);
            node_entry_start.push(entry_ids.len() as u32);
            entry_ids.extend_from_slice(&self.nodes[old].entries);

            let mut kids: Vec<(u8, u32)> =
                self.nodes[old].children.iter().map(|(&label, &target)| (label, target)).collect();
            kids.sort_unstable_by_key(|&(label, _)| label);
            for (label, target) in kids {
                edge_labels.push(label);
                edge_targets.push(order.len() as u32);
                order.push(target);
            }
        }
        node_edge_start.push(edge_labels.len() as u32);
        node_entry_start.push(entry_ids.len() as u32);

        Compiled {
            node_edge_start,
            edge_labels,
            edge_targets,
            node_entry_start,
            entry_ids,
            entries: self.entries,
        }
    }
}

/// The finalized, read-only form of the index.
pub(crate) struct Compiled {
    node_edge_start: Vec<u32>,
    edge_labels: Vec<u8>,
    edge_targets: Vec<u32>,
    node_entry_start: Vec<u32>,
    entry_ids: Vec<u32>,
    pub(crate) entries: Vec<EntryData>,
}

impl Compiled {
    pub(crate) fn root(&self) -> u32 {
        0
    }

    pub(crate) fn edges(&self, node: u32) -> (&[u8], &[u32]) {
        let start = self.node_edge_start[node as usize] as usize;
        let end = self.node_edge_start[node as usize + 1] as usize;
        (&self.edge_labels[start..end], &self.edge_targets[start..end])
    }

    pub(crate) fn child(&self, node: u32, label: u8) -> Option<u32> {
        let (labels, targets) = self.edges(node);
        labels.binary_search(&label).ok().map(|i| targets[i])
    }

    pub(crate) fn entries_at(&self, node: u32) -> &[u32] {
        let start = self.node_entry_start[node as usize] as usize;
        let end = self.node_entry_start[node as usize + 1] as usize;
        &self.entry_ids[start..end]
    }
}

enum State {
    Building(Builder),
    Ready(Compiled),
}

/// An entry the bulk loader refused, with the position it arrived at.
#[derive(Debug)]
pub struct Rejection {
    pub ordinal: usize,
    pub surface: String,
    pub error: Error,
}

/// Outcome of a bulk load: bad entries are collected, not fatal.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub accepted: usize,
    pub rejections: Vec<Rejection>,
}

/// A context-aware completion index.
///
/// Two-phase lifecycle: single-writer `insert` calls accumulate entries,
/// `finalize` compiles them into an immutable structure, after which any
/// number of threads may `search` concurrently. Inserting after finalize
/// or searching before it fails with [`Error::BuildState`].
pub struct CompletionIndex {
    dims: DimensionTable,
    state: State,
}

impl CompletionIndex {
    pub fn new(dimensions: Vec<ContextDimension>) -> Result<Self> {
        Ok(Self {
            dims: DimensionTable::new(dimensions)?,
            state: State::Building(Builder::new()),
        })
    }

    /// The dimension declarations this index was created with.
    pub fn dimensions(&self) -> &[ContextDimension] {
        self.dims.declared()
    }

    pub fn len(&self) -> usize {
        match &self.state {
            State::Building(builder) => builder.entries.len(),
            State::Ready(compiled) => compiled.entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add one entry. Context values are encoded through the declared
    /// dimensions; a value that does not fit its dimension rejects the
    /// entry and leaves the index unchanged.
    pub fn insert(&mut self, entry: EntryInput) -> Result<()> {
        let State::Building(builder) = &mut self.state else {
            return Err(Error::BuildState("index is finalized; no further inserts"));
        };
        if entry.surface.is_empty() {
            return Err(Error::InvalidEntry("empty surface".to_string()));
        }
        if entry.weight == 0 {
            return Err(Error::InvalidEntry(format!(
                "weight must be positive for '{}'",
                entry.surface
            )));
        }
        let contexts = self.dims.encode_entry(&entry.contexts)?;
        builder.insert(entry.surface, entry.weight, contexts);
        Ok(())
    }

    /// Bulk load: per-entry failures go into the report instead of
    /// aborting the build. Only a state error stops the load.
    pub fn insert_all(
        &mut self,
        entries: impl IntoIterator<Item = EntryInput>,
    ) -> Result<BuildReport> {
        let mut report = BuildReport::default();
        for (ordinal, entry) in entries.into_iter().enumerate() {
            let surface = entry.surface.clone();
            match self.insert(entry) {
                Ok(()) => report.accepted += 1,
                Err(error @ Error::BuildState(_)) => return Err(error),
                Err(error) => {
                    warn!(ordinal, surface = %surface, %error, "rejected entry");
                    report.rejections.push(Rejection { ordinal, surface, error });
                }
            }
        }
        Ok(report)
    }

    /// One-time barrier: compiles the accumulated entries into the
    /// immutable query-ready form.
    pub fn finalize(&mut self) -> Result<()> {
        let State::Building(builder) = &mut self.state else {
            return Err(Error::BuildState("index is already finalized"));
        };
        let builder = std::mem::replace(builder, Builder::new());
        let entry_count = builder.entries.len();
        let node_count = builder.nodes.len();
        let compiled = builder.compile();
        debug!(
            entries = entry_count,
            nodes = node_count,
            tokens = self.dims.token_count(),
            "finalized completion index"
        );
        self.state = State::Ready(compiled);
        Ok(())
    }

    pub fn search(&self, request: &SuggestRequest) -> Result<Vec<Suggestion>> {
        self.search_with_control(request, &QueryControl::default())
    }

    pub fn search_with_control(
        &self,
        request: &SuggestRequest,
        control: &QueryControl,
    ) -> Result<Vec<Suggestion>> {
        let ranked = self.search_ranked(request, control)?;
        Ok(ranked.into_iter().map(Ranked::into_suggestion).collect())
    }

    /// Like [`search`](Self::search) but keeps the insertion-order key on
    /// each result so per-segment lists can go through [`crate::merge`].
    pub fn search_ranked(
        &self,
        request: &SuggestRequest,
        control: &QueryControl,
    ) -> Result<Vec<Ranked>> {
        let State::Ready(compiled) = &self.state else {
            return Err(Error::BuildState("index must be finalized before queries"));
        };
        if request.size == 0 {
            return Err(Error::Pattern("size must be positive".to_string()));
        }
        let resolved = self.dims.resolve(&request.contexts)?;
        matcher::run(compiled, request, &resolved, control)
    }
}

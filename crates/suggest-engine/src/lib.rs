//! suggest-engine
//!
//! Context-aware completion matching. Weighted `(surface, weight, context)`
//! entries are inserted into a byte trie, compiled once into an immutable
//! query-ready structure, and matched with prefix, regex or bounded-edit
//! fuzzy patterns. Category and geohash context constraints filter
//! candidates inline during traversal and boost the surviving ones;
//! results come back as a deterministic, deduplicated top-K.

mod context;
mod index;
mod matcher;
mod merge;
mod score;
mod topk;

pub use index::{BuildReport, CompletionIndex, Rejection};
pub use matcher::QueryControl;
pub use merge::merge;

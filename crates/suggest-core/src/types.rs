//! Domain types shared by the build and query sides of the suggester.
//!
//! Everything here is serde-friendly so dimension sets can be declared in
//! config files and entries/requests can travel as JSON.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Geohash cell length used when a geo dimension does not declare one.
pub const DEFAULT_GEO_PRECISION: usize = 6;

/// A WGS84 point supplied as a raw geo context value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// True when the point lies inside the valid WGS84 coordinate ranges.
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }
}

fn default_precision() -> usize {
    DEFAULT_GEO_PRECISION
}

/// The closed set of context dimension kinds.
///
/// New kinds are added by extending this enum and the two dispatch points
/// in the engine (build-time encode, query-time expand).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DimensionKind {
    Category,
    Geo {
        #[serde(default = "default_precision")]
        precision: usize,
    },
}

/// A named classification axis declared once per index.
///
/// The declaration is the contract between the build-time encoder and the
/// query-time resolver; kind and precision are immutable once an entry has
/// been indexed under it. `path` names the source document field callers
/// extract raw values from; the engine itself never reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextDimension {
    pub name: String,
    #[serde(flatten)]
    pub kind: DimensionKind,
    #[serde(default)]
    pub path: Option<String>,
}

impl ContextDimension {
    pub fn category(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: DimensionKind::Category, path: None }
    }

    pub fn geo(name: impl Into<String>, precision: usize) -> Self {
        Self { name: name.into(), kind: DimensionKind::Geo { precision }, path: None }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// A raw context value as supplied at build time, before encoding.
///
/// Category dimensions take strings; geo dimensions take either geohash
/// cell strings or a point. A lone string deserializes as a one-element
/// list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawContext {
    Point(GeoPoint),
    Values(Vec<String>),
    Value(String),
}

impl RawContext {
    pub fn point(lat: f64, lon: f64) -> Self {
        Self::Point(GeoPoint::new(lat, lon))
    }

    pub fn values<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        Self::Values(values.into_iter().map(Into::into).collect())
    }
}

impl From<&str> for RawContext {
    fn from(value: &str) -> Self {
        Self::Value(value.to_string())
    }
}

impl From<String> for RawContext {
    fn from(value: String) -> Self {
        Self::Value(value)
    }
}

impl From<GeoPoint> for RawContext {
    fn from(value: GeoPoint) -> Self {
        Self::Point(value)
    }
}

/// One weighted completion entry as handed to the index at build time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryInput {
    pub surface: String,
    pub weight: u32,
    #[serde(default)]
    pub contexts: HashMap<String, RawContext>,
}

impl EntryInput {
    pub fn new(surface: impl Into<String>, weight: u32) -> Self {
        Self { surface: surface.into(), weight, contexts: HashMap::new() }
    }

    pub fn context(mut self, dimension: impl Into<String>, value: impl Into<RawContext>) -> Self {
        self.contexts.insert(dimension.into(), value.into());
        self
    }
}

fn default_boost() -> u32 {
    1
}

/// One accepted value on a constrained dimension, with its boost.
///
/// Several `QueryContext`s on the same dimension are OR'd; each carries
/// its own boost and the boost defaults to the neutral 1 when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryContext {
    pub value: String,
    #[serde(default = "default_boost")]
    pub boost: u32,
}

impl QueryContext {
    pub fn new(value: impl Into<String>) -> Self {
        Self { value: value.into(), boost: 1 }
    }

    pub fn boosted(value: impl Into<String>, boost: u32) -> Self {
        Self { value: value.into(), boost }
    }
}

/// How the query pattern is matched against stored surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MatchMode {
    /// Surface starts with the pattern, byte for byte.
    Prefix,
    /// The compiled regex accepts the full surface.
    Regex,
    /// Some prefix of the surface is within `max_edits` Damerau-Levenshtein
    /// edits of the pattern; 0, 1 or 2.
    Fuzzy { max_edits: u8 },
}

impl Default for MatchMode {
    fn default() -> Self {
        Self::Prefix
    }
}

fn default_size() -> usize {
    5
}

/// A complete completion query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestRequest {
    pub pattern: String,
    #[serde(default)]
    pub mode: MatchMode,
    #[serde(default = "default_size")]
    pub size: usize,
    #[serde(default)]
    pub contexts: HashMap<String, Vec<QueryContext>>,
}

impl SuggestRequest {
    pub fn prefix(pattern: impl Into<String>, size: usize) -> Self {
        Self { pattern: pattern.into(), mode: MatchMode::Prefix, size, contexts: HashMap::new() }
    }

    pub fn regex(pattern: impl Into<String>, size: usize) -> Self {
        Self { pattern: pattern.into(), mode: MatchMode::Regex, size, contexts: HashMap::new() }
    }

    pub fn fuzzy(pattern: impl Into<String>, max_edits: u8, size: usize) -> Self {
        Self {
            pattern: pattern.into(),
            mode: MatchMode::Fuzzy { max_edits },
            size,
            contexts: HashMap::new(),
        }
    }

    pub fn context(
        mut self,
        dimension: impl Into<String>,
        contexts: impl IntoIterator<Item = QueryContext>,
    ) -> Self {
        self.contexts.insert(dimension.into(), contexts.into_iter().collect());
        self
    }
}

/// Final ranked output unit: highest score first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub text: String,
    pub score: u64,
}

/// Per-segment result carrying the insertion-order tie-break key so the
/// merger can re-apply the exact selector ordering without re-scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ranked {
    pub text: String,
    pub score: u64,
    pub order: u64,
}

impl Ranked {
    pub fn into_suggestion(self) -> Suggestion {
        Suggestion { text: self.text, score: self.score }
    }
}

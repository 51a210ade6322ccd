//! Dimension encoders and the query-context resolver.
//!
//! At build time, raw context values reduce to canonical tokens which are
//! interned into a disjoint id namespace per dimension; entry filtering at
//! query time is then integer-set membership with no string comparisons.
//! At query time, each `QueryContext` expands into the set of token ids it
//! should accept: one per category value, up to nine per geo value (the
//! query cell and its ring of neighbors).

use rustc_hash::FxHashMap;
use std::collections::HashMap;

use suggest_core::error::{Error, Result};
use suggest_core::types::{ContextDimension, DimensionKind, QueryContext, RawContext};

#[derive(Debug)]
pub(crate) struct DimensionTable {
    dims: Vec<ContextDimension>,
    by_name: FxHashMap<String, usize>,
    /// Token string -> id, one namespace per dimension ordinal.
    interners: Vec<FxHashMap<String, u32>>,
}

/// Per-dimension accepted token ids with their boosts. `None` means the
/// query leaves the dimension unconstrained; an empty map means it is
/// constrained but no accepted token exists in the index.
pub(crate) struct ResolvedContexts {
    slots: Vec<Option<FxHashMap<u32, u32>>>,
}

impl ResolvedContexts {
    pub(crate) fn slots(&self) -> &[Option<FxHashMap<u32, u32>>] {
        &self.slots
    }

    #[cfg(test)]
    pub(crate) fn from_slots(slots: Vec<Option<FxHashMap<u32, u32>>>) -> Self {
        Self { slots }
    }
}

fn mismatch(dimension: &str, reason: impl Into<String>) -> Error {
    Error::ContextTypeMismatch { dimension: dimension.to_string(), reason: reason.into() }
}

impl DimensionTable {
    pub(crate) fn new(dims: Vec<ContextDimension>) -> Result<Self> {
        let mut by_name = FxHashMap::default();
        for (ordinal, dim) in dims.iter().enumerate() {
            if let DimensionKind::Geo { precision } = dim.kind {
                if !(1..=suggest_geo::MAX_PRECISION).contains(&precision) {
                    return Err(mismatch(
                        &dim.name,
                        format!("geo precision {precision} out of range 1..={}", suggest_geo::MAX_PRECISION),
                    ));
                }
            }
            if by_name.insert(dim.name.clone(), ordinal).is_some() {
                return Err(mismatch(&dim.name, "duplicate dimension name"));
            }
        }
        let interners = vec![FxHashMap::default(); dims.len()];
        Ok(Self { dims, by_name, interners })
    }

    pub(crate) fn declared(&self) -> &[ContextDimension] {
        &self.dims
    }

    pub(crate) fn token_count(&self) -> usize {
        self.interners.iter().map(FxHashMap::len).sum()
    }

    /// Encode one entry's raw context values into per-dimension sorted
    /// token id sets, interning new tokens as they appear.
    pub(crate) fn encode_entry(
        &mut self,
        contexts: &HashMap<String, RawContext>,
    ) -> Result<Vec<Vec<u32>>> {
        let mut per_dim: Vec<Vec<u32>> = vec![Vec::new(); self.dims.len()];
        for (name, raw) in contexts {
            let Some(&ordinal) = self.by_name.get(name) else {
                return Err(Error::UnknownDimension(name.clone()));
            };
            let tokens = encode_raw(&self.dims[ordinal], raw)?;
            let interner = &mut self.interners[ordinal];
            let ids = &mut per_dim[ordinal];
            for token in tokens {
                let next = interner.len() as u32;
                let id = *interner.entry(token).or_insert(next);
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            ids.sort_unstable();
        }
        Ok(per_dim)
    }

    /// Resolve a request's constraints into accepted token-id sets, keeping
    /// the maximum boost when expansions land on the same token.
    pub(crate) fn resolve(
        &self,
        contexts: &HashMap<String, Vec<QueryContext>>,
    ) -> Result<ResolvedContexts> {
        let mut slots: Vec<Option<FxHashMap<u32, u32>>> = vec![None; self.dims.len()];
        for (name, query_contexts) in contexts {
            let Some(&ordinal) = self.by_name.get(name) else {
                return Err(Error::UnknownDimension(name.clone()));
            };
            let accepted = slots[ordinal].get_or_insert_with(FxHashMap::default);
            for qc in query_contexts {
                if qc.boost == 0 {
                    return Err(Error::Pattern(format!(
                        "boost on dimension '{name}' must be positive"
                    )));
                }
                for token in self.expand_query(ordinal, &qc.value)? {
                    // Tokens the index never saw cannot match any entry.
                    if let Some(&id) = self.interners[ordinal].get(token.as_str()) {
                        let slot = accepted.entry(id).or_insert(qc.boost);
                        if qc.boost > *slot {
                            *slot = qc.boost;
                        }
                    }
                }
            }
        }
        Ok(ResolvedContexts { slots })
    }

    fn expand_query(&self, ordinal: usize, value: &str) -> Result<Vec<String>> {
        let dim = &self.dims[ordinal];
        match &dim.kind {
            DimensionKind::Category => {
                let token = value.trim();
                if token.is_empty() {
                    return Err(Error::Pattern(format!(
                        "empty context value on dimension '{}'",
                        dim.name
                    )));
                }
                Ok(vec![token.to_string()])
            }
            DimensionKind::Geo { precision } => {
                let cell = query_cell(&dim.name, value, *precision)?;
                let mut out = suggest_geo::neighbors(&cell);
                out.push(cell);
                Ok(out)
            }
        }
    }
}

fn encode_raw(dim: &ContextDimension, raw: &RawContext) -> Result<Vec<String>> {
    match (&dim.kind, raw) {
        (DimensionKind::Category, RawContext::Point(_)) => {
            Err(mismatch(&dim.name, "category dimension takes string values, got a geo point"))
        }
        (DimensionKind::Category, raw) => {
            let mut out = Vec::new();
            for value in raw_strings(raw) {
                let token = value.trim();
                if token.is_empty() {
                    return Err(mismatch(&dim.name, "empty category value"));
                }
                out.push(token.to_string());
            }
            Ok(out)
        }
        (DimensionKind::Geo { precision }, RawContext::Point(point)) => {
            if !point.is_valid() {
                return Err(mismatch(
                    &dim.name,
                    format!("point ({}, {}) outside WGS84 bounds", point.lat, point.lon),
                ));
            }
            Ok(vec![suggest_geo::encode(point.lat, point.lon, *precision)])
        }
        (DimensionKind::Geo { precision }, raw) => {
            let mut out = Vec::new();
            for value in raw_strings(raw) {
                let cell = value.trim();
                if !suggest_geo::is_valid_cell(cell) {
                    return Err(mismatch(&dim.name, format!("'{cell}' is not a geohash cell")));
                }
                if cell.len() < *precision {
                    return Err(mismatch(
                        &dim.name,
                        format!(
                            "cell '{cell}' is shorter than the declared precision {precision}"
                        ),
                    ));
                }
                out.push(cell[..*precision].to_string());
            }
            Ok(out)
        }
    }
}

fn raw_strings(raw: &RawContext) -> Vec<&str> {
    match raw {
        RawContext::Value(value) => vec![value.as_str()],
        RawContext::Values(values) => values.iter().map(String::as_str).collect(),
        RawContext::Point(_) => Vec::new(),
    }
}

/// A geo query value is either a geohash cell or a `lat,lon` point; both
/// reduce to the cell the build-time encoder would have produced.
fn query_cell(dimension: &str, value: &str, precision: usize) -> Result<String> {
    let value = value.trim();
    if let Some((lat, lon)) = parse_point(value) {
        let point = suggest_core::types::GeoPoint::new(lat, lon);
        if !point.is_valid() {
            return Err(Error::Pattern(format!(
                "point ({lat}, {lon}) on dimension '{dimension}' outside WGS84 bounds"
            )));
        }
        return Ok(suggest_geo::encode(lat, lon, precision));
    }
    if suggest_geo::is_valid_cell(value) {
        // Cells shorter than the declared precision expand at their own
        // length; longer ones are truncated like the encoder does.
        if value.len() > precision {
            Ok(value[..precision].to_string())
        } else {
            Ok(value.to_string())
        }
    } else {
        Err(Error::Pattern(format!(
            "'{value}' on dimension '{dimension}' is neither a geohash cell nor a 'lat,lon' point"
        )))
    }
}

fn parse_point(value: &str) -> Option<(f64, f64)> {
    let (lat, lon) = value.split_once(',')?;
    Some((lat.trim().parse().ok()?, lon.trim().parse().ok()?))
}

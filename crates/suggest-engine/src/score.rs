//! Score combination across context dimensions.
//!
//! Within one dimension an entry matches via its best-boosted token (max,
//! never sum); across dimensions the matched boosts add up, and the final
//! score is the entry weight times that combined multiplier. A query with
//! no constraints keeps every weight unchanged (multiplier 1).

use crate::context::ResolvedContexts;

/// Filter and boost in one pass.
///
/// Returns `None` when the entry misses any constrained dimension (it is
/// not a candidate at all), otherwise the combined multiplier.
pub(crate) fn context_multiplier(
    entry_contexts: &[Vec<u32>],
    resolved: &ResolvedContexts,
) -> Option<u64> {
    let mut constrained = false;
    let mut sum = 0u64;
    for (dim, accepted) in resolved.slots().iter().enumerate() {
        let Some(accepted) = accepted else { continue };
        constrained = true;
        let mut best: Option<u32> = None;
        for token in &entry_contexts[dim] {
            if let Some(&boost) = accepted.get(token) {
                best = Some(best.map_or(boost, |b| b.max(boost)));
            }
        }
        sum += u64::from(best?);
    }
    if constrained {
        Some(sum)
    } else {
        Some(1)
    }
}

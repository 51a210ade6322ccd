//! End-to-end scenarios over category-tagged indexes: build, finalize,
//! then match with prefix/regex/fuzzy patterns under context constraints.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use suggest_core::error::Error;
use suggest_core::types::{
    ContextDimension, EntryInput, QueryContext, Ranked, SuggestRequest, Suggestion,
};
use suggest_engine::{merge, CompletionIndex, QueryControl};

fn texts(results: &[Suggestion]) -> Vec<&str> {
    results.iter().map(|s| s.text.as_str()).collect()
}

fn scores(results: &[Suggestion]) -> Vec<u64> {
    results.iter().map(|s| s.score).collect()
}

/// Ten entries `suggestion0..9`, weight `i + 1`, `cat = cat{i % 2}` and,
/// when asked, `type = type{i % 4}`.
fn category_index(with_type: bool) -> CompletionIndex {
    let mut dims = vec![ContextDimension::category("cat")];
    if with_type {
        dims.push(ContextDimension::category("type"));
    }
    let mut index = CompletionIndex::new(dims).expect("index");
    for i in 0..10u32 {
        let mut entry = EntryInput::new(format!("suggestion{i}"), i + 1)
            .context("cat", format!("cat{}", i % 2));
        if with_type {
            entry = entry.context("type", format!("type{}", i % 4));
        }
        index.insert(entry).expect("insert");
    }
    index.finalize().expect("finalize");
    index
}

#[test]
fn prefix_without_constraints_ranks_by_weight() {
    let index = category_index(true);
    let results = index.search(&SuggestRequest::prefix("sugg", 5)).expect("search");
    assert_eq!(
        texts(&results),
        ["suggestion9", "suggestion8", "suggestion7", "suggestion6", "suggestion5"]
    );
    // Without constraints the score is exactly the weight.
    assert_eq!(scores(&results), [10, 9, 8, 7, 6]);
}

#[test]
fn prefix_is_byte_exact() {
    let index = category_index(false);
    let results = index.search(&SuggestRequest::prefix("suggestion1", 10)).expect("search");
    assert_eq!(texts(&results), ["suggestion1"]);
    let results = index.search(&SuggestRequest::prefix("Sugg", 10)).expect("search");
    assert!(results.is_empty());
    // The empty pattern matches everything.
    let results = index.search(&SuggestRequest::prefix("", 20)).expect("search");
    assert_eq!(results.len(), 10);
}

#[test]
fn single_context_filtering() {
    let index = category_index(false);
    let request =
        SuggestRequest::prefix("sugg", 5).context("cat", [QueryContext::new("cat0")]);
    let results = index.search(&request).expect("search");
    assert_eq!(
        texts(&results),
        ["suggestion8", "suggestion6", "suggestion4", "suggestion2", "suggestion0"]
    );
}

#[test]
fn single_context_boosting() {
    let index = category_index(false);
    let request = SuggestRequest::prefix("sugg", 5).context(
        "cat",
        [QueryContext::boosted("cat0", 3), QueryContext::new("cat1")],
    );
    let results = index.search(&request).expect("search");
    assert_eq!(
        texts(&results),
        ["suggestion8", "suggestion6", "suggestion4", "suggestion9", "suggestion2"]
    );
    assert_eq!(scores(&results), [27, 21, 15, 10, 9]);
}

#[test]
fn multi_context_filtering() {
    let index = category_index(true);

    let request =
        SuggestRequest::prefix("sugg", 5).context("cat", [QueryContext::new("cat0")]);
    let results = index.search(&request).expect("search");
    assert_eq!(
        texts(&results),
        ["suggestion8", "suggestion6", "suggestion4", "suggestion2", "suggestion0"]
    );

    let request = SuggestRequest::prefix("sugg", 5)
        .context("type", [QueryContext::new("type2"), QueryContext::new("type1")]);
    let results = index.search(&request).expect("search");
    assert_eq!(
        texts(&results),
        ["suggestion9", "suggestion6", "suggestion5", "suggestion2", "suggestion1"]
    );

    // AND across dimensions: only cat0 entries whose type is 1 or 2 remain.
    let request = SuggestRequest::prefix("sugg", 5)
        .context("cat", [QueryContext::new("cat0")])
        .context("type", [QueryContext::new("type2"), QueryContext::new("type1")]);
    let results = index.search(&request).expect("search");
    assert_eq!(texts(&results), ["suggestion6", "suggestion2"]);
}

#[test]
fn multi_context_boosting_adds_across_dimensions() {
    let index = category_index(true);
    let request = SuggestRequest::prefix("sugg", 5)
        .context("cat", [QueryContext::boosted("cat0", 3), QueryContext::new("cat1")])
        .context("type", [QueryContext::boosted("type2", 2), QueryContext::boosted("type1", 4)]);
    let results = index.search(&request).expect("search");
    assert_eq!(
        texts(&results),
        ["suggestion9", "suggestion6", "suggestion5", "suggestion2", "suggestion1"]
    );
    // weight × (catBoost + typeBoost), never the product.
    assert_eq!(scores(&results), [50, 35, 30, 15, 10]);
}

#[test]
fn query_context_order_never_matters() {
    let index = category_index(true);
    let cat = [QueryContext::boosted("cat0", 3), QueryContext::new("cat1")];
    let typ = [QueryContext::boosted("type2", 2), QueryContext::boosted("type1", 4)];

    let cat_first = SuggestRequest::prefix("sugg", 5)
        .context("cat", cat.clone())
        .context("type", typ.clone());
    let type_first =
        SuggestRequest::prefix("sugg", 5).context("type", typ).context("cat", cat);

    let a = index.search(&cat_first).expect("search");
    let b = index.search(&type_first).expect("search");
    assert_eq!(a, b);
}

#[test]
fn entries_missing_a_constrained_dimension_are_excluded() {
    let mut index = CompletionIndex::new(vec![
        ContextDimension::category("cat"),
        ContextDimension::category("type"),
    ])
    .expect("index");
    for i in 0..10u32 {
        let mut entry = EntryInput::new(format!("suggestion{i}"), i + 1);
        if i % 2 == 0 {
            entry = entry.context("cat", "tagged");
        }
        index.insert(entry).expect("insert");
    }
    index.finalize().expect("finalize");

    // Unconstrained queries see every entry, tagged or not.
    let results = index.search(&SuggestRequest::prefix("sugg", 5)).expect("search");
    assert_eq!(
        texts(&results),
        ["suggestion9", "suggestion8", "suggestion7", "suggestion6", "suggestion5"]
    );

    // Constrained queries drop entries with no value on that dimension,
    // whatever K is.
    let request =
        SuggestRequest::prefix("sugg", 100).context("cat", [QueryContext::new("tagged")]);
    let results = index.search(&request).expect("search");
    assert_eq!(results.len(), 5);
    assert!(texts(&results).iter().all(|t| {
        let i: u32 = t.trim_start_matches("suggestion").parse().expect("ordinal");
        i % 2 == 0
    }));
}

#[test]
fn several_category_dimensions() {
    let dims: Vec<ContextDimension> =
        (0..4).map(|c| ContextDimension::category(format!("type{c}"))).collect();
    let mut index = CompletionIndex::new(dims).expect("index");
    for i in 0..20u32 {
        let mut entry = EntryInput::new(format!("suggestion{i:02}"), 20 - i);
        for c in 0..4 {
            entry = entry.context(format!("type{c}"), format!("type{c}{}", i % 4));
        }
        index.insert(entry).expect("insert");
    }
    index.finalize().expect("finalize");

    let results = index.search(&SuggestRequest::prefix("sugg", 5)).expect("search");
    assert_eq!(
        texts(&results),
        ["suggestion00", "suggestion01", "suggestion02", "suggestion03", "suggestion04"]
    );

    // Constraining all four dimensions keeps only i % 4 == 1.
    let mut request = SuggestRequest::prefix("sugg", 10);
    for c in 0..4 {
        request = request.context(format!("type{c}"), [QueryContext::new(format!("type{c}1"))]);
    }
    let results = index.search(&request).expect("search");
    assert_eq!(
        texts(&results),
        ["suggestion01", "suggestion05", "suggestion09", "suggestion13", "suggestion17"]
    );
}

#[test]
fn regex_matches_full_surfaces_only() {
    let mut index =
        CompletionIndex::new(vec![ContextDimension::category("cat")]).expect("index");
    for i in 0..10u32 {
        index
            .insert(
                EntryInput::new(format!("sugg{i}estion"), i + 1)
                    .context("cat", format!("cat{}", i % 2)),
            )
            .expect("insert");
    }
    index.finalize().expect("finalize");

    let results = index.search(&SuggestRequest::regex("sugg.*estion", 5)).expect("search");
    assert_eq!(
        texts(&results),
        ["sugg9estion", "sugg8estion", "sugg7estion", "sugg6estion", "sugg5estion"]
    );

    let results = index.search(&SuggestRequest::regex("sugg[0-4]estion", 10)).expect("search");
    assert_eq!(
        texts(&results),
        ["sugg4estion", "sugg3estion", "sugg2estion", "sugg1estion", "sugg0estion"]
    );

    // A regex matching only a prefix of the surface is not a match.
    let results = index.search(&SuggestRequest::regex("sugg.*es", 10)).expect("search");
    assert!(results.is_empty());

    // Context filtering applies to regex traversal as well.
    let request = SuggestRequest::regex("sugg.*estion", 10)
        .context("cat", [QueryContext::new("cat0")]);
    let results = index.search(&request).expect("search");
    assert_eq!(
        texts(&results),
        ["sugg8estion", "sugg6estion", "sugg4estion", "sugg2estion", "sugg0estion"]
    );
}

#[test]
fn regex_rejects_invalid_patterns() {
    let index = category_index(false);
    let err = index.search(&SuggestRequest::regex("sugg[", 5)).expect_err("bad regex");
    assert!(matches!(err, Error::Pattern(_)));
}

#[test]
fn fuzzy_matches_within_the_edit_budget() {
    let mut index =
        CompletionIndex::new(vec![ContextDimension::category("cat")]).expect("index");
    for i in 0..10u32 {
        index
            .insert(
                EntryInput::new(format!("sugxgestion{i}"), i + 1)
                    .context("cat", format!("cat{}", i % 2)),
            )
            .expect("insert");
    }
    index.insert(EntryInput::new("nowhere near", 100)).expect("insert");
    index.finalize().expect("finalize");

    // One inserted 'x' against the "sugg" prefix costs one edit.
    let results = index.search(&SuggestRequest::fuzzy("sugg", 1, 5)).expect("search");
    assert_eq!(
        texts(&results),
        [
            "sugxgestion9",
            "sugxgestion8",
            "sugxgestion7",
            "sugxgestion6",
            "sugxgestion5"
        ]
    );

    // With a zero budget nothing survives.
    let results = index.search(&SuggestRequest::fuzzy("sugg", 0, 5)).expect("search");
    assert!(results.is_empty());
}

#[test]
fn fuzzy_counts_a_transposition_as_one_edit() {
    let mut index = CompletionIndex::new(Vec::new()).expect("index");
    index.insert(EntryInput::new("usggestion", 1)).expect("insert");
    index.insert(EntryInput::new("szzggestion", 1)).expect("insert");
    index.finalize().expect("finalize");

    let results = index.search(&SuggestRequest::fuzzy("sugg", 1, 10)).expect("search");
    assert_eq!(texts(&results), ["usggestion"]);

    // Two substitutions fit a budget of two.
    let results = index.search(&SuggestRequest::fuzzy("sugg", 2, 10)).expect("search");
    assert_eq!(results.len(), 2);
}

#[test]
fn fuzzy_rejects_budgets_above_two() {
    let index = category_index(false);
    let err = index.search(&SuggestRequest::fuzzy("sugg", 3, 5)).expect_err("bad budget");
    assert!(matches!(err, Error::Pattern(_)));
}

/// Optimal-string-alignment distance, written independently of the engine.
fn osa_distance(a: &[u8], b: &[u8]) -> u32 {
    let (n, m) = (a.len(), b.len());
    let mut rows: Vec<Vec<u32>> = vec![vec![0; m + 1]; n + 1];
    for (i, row) in rows.iter_mut().enumerate() {
        row[0] = i as u32;
    }
    for j in 0..=m {
        rows[0][j] = j as u32;
    }
    for i in 1..=n {
        for j in 1..=m {
            let cost = u32::from(a[i - 1] != b[j - 1]);
            let mut best =
                (rows[i - 1][j] + 1).min(rows[i][j - 1] + 1).min(rows[i - 1][j - 1] + cost);
            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                best = best.min(rows[i - 2][j - 2] + 1);
            }
            rows[i][j] = best;
        }
    }
    rows[n][m]
}

#[test]
fn fuzzy_results_always_pass_an_independent_distance_check() {
    let words = [
        "sugar", "suggest", "suggestion", "suggestions", "segment", "sigma", "stage",
        "usggest", "sugxg", "zzz",
    ];
    let mut index = CompletionIndex::new(Vec::new()).expect("index");
    for (i, word) in words.iter().enumerate() {
        index.insert(EntryInput::new(*word, i as u32 + 1)).expect("insert");
    }
    index.finalize().expect("finalize");

    for pattern in ["sugg", "suggset", "sig"] {
        for max_edits in 0..=2u8 {
            let results = index
                .search(&SuggestRequest::fuzzy(pattern, max_edits, 100))
                .expect("search");
            for result in &results {
                let surface = result.text.as_bytes();
                let within = (0..=surface.len()).any(|end| {
                    osa_distance(pattern.as_bytes(), &surface[..end]) <= u32::from(max_edits)
                });
                assert!(
                    within,
                    "'{}' has no prefix within {max_edits} edits of '{pattern}'",
                    result.text
                );
            }
        }
    }
}

#[test]
fn duplicate_surfaces_keep_the_higher_score() {
    let mut index = CompletionIndex::new(Vec::new()).expect("index");
    index.insert(EntryInput::new("duplicate", 3)).expect("insert");
    index.insert(EntryInput::new("duplicate", 7)).expect("insert");
    index.insert(EntryInput::new("distinct", 5)).expect("insert");
    index.finalize().expect("finalize");

    let results = index.search(&SuggestRequest::prefix("d", 10)).expect("search");
    assert_eq!(texts(&results), ["duplicate", "distinct"]);
    assert_eq!(scores(&results), [7, 5]);
}

#[test]
fn equal_scores_rank_by_insertion_order() {
    let mut index = CompletionIndex::new(Vec::new()).expect("index");
    index.insert(EntryInput::new("pear", 5)).expect("insert");
    index.insert(EntryInput::new("peach", 5)).expect("insert");
    index.insert(EntryInput::new("pecan", 5)).expect("insert");
    index.finalize().expect("finalize");

    let results = index.search(&SuggestRequest::prefix("pe", 10)).expect("search");
    assert_eq!(texts(&results), ["pear", "peach", "pecan"]);
}

#[test]
fn build_state_errors() {
    let mut index = CompletionIndex::new(Vec::new()).expect("index");
    index.insert(EntryInput::new("ok", 1)).expect("insert");

    // Queries are refused until finalize.
    let err = index.search(&SuggestRequest::prefix("o", 5)).expect_err("not finalized");
    assert!(matches!(err, Error::BuildState(_)));

    index.finalize().expect("finalize");

    let err = index.insert(EntryInput::new("late", 1)).expect_err("finalized");
    assert!(matches!(err, Error::BuildState(_)));
    let err = index.finalize().expect_err("double finalize");
    assert!(matches!(err, Error::BuildState(_)));

    // And the index still answers queries.
    let results = index.search(&SuggestRequest::prefix("o", 5)).expect("search");
    assert_eq!(texts(&results), ["ok"]);
}

#[test]
fn bulk_load_collects_rejections_without_aborting() {
    let mut index =
        CompletionIndex::new(vec![ContextDimension::category("cat")]).expect("index");
    let entries = vec![
        EntryInput::new("good", 2).context("cat", "a"),
        EntryInput::new("unknown dim", 1).context("color", "red"),
        EntryInput::new("bad kind", 1).context("cat", suggest_core::types::GeoPoint::new(1.0, 2.0)),
        EntryInput::new("zero weight", 0),
        EntryInput::new("", 1),
        EntryInput::new("also good", 9),
    ];
    let report = index.insert_all(entries).expect("bulk load");
    assert_eq!(report.accepted, 2);
    assert_eq!(report.rejections.len(), 4);
    assert!(matches!(report.rejections[0].error, Error::UnknownDimension(_)));
    assert!(matches!(report.rejections[1].error, Error::ContextTypeMismatch { .. }));
    assert!(matches!(report.rejections[2].error, Error::InvalidEntry(_)));
    assert!(matches!(report.rejections[3].error, Error::InvalidEntry(_)));

    index.finalize().expect("finalize");
    let results = index.search(&SuggestRequest::prefix("", 10)).expect("search");
    assert_eq!(results.len(), 2);
}

#[test]
fn query_validation_errors() {
    let index = category_index(false);

    let request = SuggestRequest::prefix("sugg", 5).context("color", [QueryContext::new("red")]);
    assert!(matches!(index.search(&request), Err(Error::UnknownDimension(_))));

    let mut request = SuggestRequest::prefix("sugg", 5);
    request.size = 0;
    assert!(matches!(index.search(&request), Err(Error::Pattern(_))));

    let request =
        SuggestRequest::prefix("sugg", 5).context("cat", [QueryContext::boosted("cat0", 0)]);
    assert!(matches!(index.search(&request), Err(Error::Pattern(_))));
}

fn wide_index() -> CompletionIndex {
    let mut index = CompletionIndex::new(Vec::new()).expect("index");
    for i in 0..800u32 {
        index.insert(EntryInput::new(format!("entry{i}"), i + 1)).expect("insert");
    }
    index.finalize().expect("finalize");
    index
}

#[test]
fn cancellation_flag_aborts_the_query() {
    let index = wide_index();
    let flag = Arc::new(AtomicBool::new(true));
    let control = QueryControl::with_flag(Arc::clone(&flag));
    let err = index
        .search_with_control(&SuggestRequest::prefix("", 1000), &control)
        .expect_err("cancelled");
    assert!(matches!(err, Error::Cancelled));

    // Lowering the flag lets the same query finish.
    flag.store(false, Ordering::Relaxed);
    let results = index
        .search_with_control(&SuggestRequest::prefix("", 1000), &control)
        .expect("search");
    assert_eq!(results.len(), 800);
}

#[test]
fn expired_deadline_aborts_the_query() {
    let index = wide_index();
    let control = QueryControl::with_deadline(Instant::now());
    let err = index
        .search_with_control(&SuggestRequest::prefix("", 1000), &control)
        .expect_err("cancelled");
    assert!(matches!(err, Error::Cancelled));
}

#[test]
fn merge_combines_segments_with_the_selector_tie_break() {
    let mut seg_a = CompletionIndex::new(Vec::new()).expect("index");
    seg_a.insert(EntryInput::new("alpha", 30)).expect("insert");
    seg_a.insert(EntryInput::new("shared", 10)).expect("insert");
    seg_a.finalize().expect("finalize");

    let mut seg_b = CompletionIndex::new(Vec::new()).expect("index");
    seg_b.insert(EntryInput::new("beta", 20)).expect("insert");
    seg_b.insert(EntryInput::new("shared", 25)).expect("insert");
    seg_b.finalize().expect("finalize");

    let control = QueryControl::default();
    let a = seg_a.search_ranked(&SuggestRequest::prefix("", 10), &control).expect("a");
    let mut b = seg_b.search_ranked(&SuggestRequest::prefix("", 10), &control).expect("b");
    // Give the second segment a disjoint order range.
    for item in &mut b {
        item.order += 1_000;
    }

    let merged = merge(&[a, b], 10);
    assert_eq!(
        merged.iter().map(|s| s.text.as_str()).collect::<Vec<_>>(),
        ["alpha", "shared", "beta"]
    );
    // The duplicate surface kept its higher-scoring occurrence.
    assert_eq!(merged[1].score, 25);
}

#[test]
fn ranked_results_expose_insertion_order() {
    let index = category_index(false);
    let ranked: Vec<Ranked> = index
        .search_ranked(&SuggestRequest::prefix("sugg", 3), &QueryControl::default())
        .expect("search");
    assert_eq!(ranked[0].order, 9);
    assert_eq!(ranked[0].text, "suggestion9");
}

#[test]
fn requests_and_entries_parse_from_json() {
    let request: SuggestRequest = serde_json::from_str(
        r#"{
            "pattern": "sugg",
            "mode": { "type": "fuzzy", "max_edits": 1 },
            "contexts": { "cat": [ { "value": "cat0", "boost": 3 }, { "value": "cat1" } ] }
        }"#,
    )
    .expect("request json");
    assert_eq!(request.size, 5);
    assert_eq!(request.contexts["cat"][1].boost, 1);

    let entry: EntryInput = serde_json::from_str(
        r#"{
            "surface": "timmy's tea shop",
            "weight": 7,
            "contexts": {
                "cat": ["shop", "tea"],
                "type": "retail",
                "geo": { "lat": 51.5, "lon": -0.12 }
            }
        }"#,
    )
    .expect("entry json");
    assert_eq!(entry.contexts.len(), 3);

    let mut index = CompletionIndex::new(vec![
        ContextDimension::category("cat"),
        ContextDimension::category("type"),
        ContextDimension::geo("geo", 6),
    ])
    .expect("index");
    index.insert(entry).expect("insert");
    index.finalize().expect("finalize");
    let results = index.search(&SuggestRequest::prefix("timmy", 5)).expect("search");
    assert_eq!(scores(&results), [7]);
}

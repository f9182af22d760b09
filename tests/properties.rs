//! Property-based tests for the pure parts of the pipeline.

use std::collections::HashSet;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use asset_miner::cancel::CancelToken;
use asset_miner::classify::{evaluate, heuristic, Classifier};
use asset_miner::materialize::function_name;
use asset_miner::models::{ComplexityTier, ExtractedQuery};
use asset_miner::params::ParameterExtractor;
use asset_miner::registry::merge::plan;
use asset_miner::registry::Disposition;
use asset_miner::test_utils::FakeLlm;
use asset_miner::timestamp::parse_timestamp;
use asset_miner::utils::normalize_question;

fn arb_sql_fragment() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("SELECT a FROM t".to_string()),
        Just(" JOIN u ON t.id = u.id".to_string()),
        Just(" WHERE x IN (SELECT y FROM v)".to_string()),
        Just(" GROUP BY a".to_string()),
        Just(", ROW_NUMBER() OVER (PARTITION BY b)".to_string()),
        Just("WITH c AS (SELECT 1) ".to_string()),
        "[a-z_ ]{0,20}",
    ]
}

fn arb_sql() -> impl Strategy<Value = String> {
    prop::collection::vec(arb_sql_fragment(), 0..6).prop_map(|parts| parts.concat())
}

proptest! {
    #[test]
    fn heuristic_is_deterministic(sql in ".{0,300}") {
        prop_assert_eq!(heuristic::analyze(&sql), heuristic::analyze(&sql));
    }

    #[test]
    fn heuristic_flags_are_consistent_with_tier(sql in arb_sql()) {
        let analysis = heuristic::analyze(&sql);
        let advanced = analysis.has_window_functions
            || analysis.has_ctes
            || analysis.join_count >= 3
            || analysis.has_subqueries;
        prop_assert_eq!(analysis.tier == ComplexityTier::Complex, advanced);
        prop_assert_eq!(analysis.has_joins, analysis.join_count > 0);
        if analysis.tier == ComplexityTier::Simple {
            prop_assert!(!analysis.has_joins && !analysis.has_aggregations);
        }
    }

    #[test]
    fn retention_is_monotone_in_threshold(sqls in prop::collection::vec(arb_sql(), 1..6)) {
        let queries: Vec<ExtractedQuery> = sqls
            .iter()
            .enumerate()
            .map(|(i, sql)| ExtractedQuery {
                question: format!("question {i}"),
                sql: sql.clone(),
                execution_time_ms: None,
                message_id: format!("m{i}"),
                conversation_id: "c1".to_string(),
            })
            .collect();
        let retained = |threshold: ComplexityTier| -> HashSet<String> {
            let llm = FakeLlm::new();
            evaluate(
                &Classifier::new(&llm),
                &ParameterExtractor::new(&llm),
                &queries,
                threshold,
                &CancelToken::new(),
            )
            .unwrap()
            .candidates
            .into_iter()
            .map(|c| c.question)
            .collect()
        };
        let simple = retained(ComplexityTier::Simple);
        let moderate = retained(ComplexityTier::Moderate);
        let complex = retained(ComplexityTier::Complex);
        prop_assert_eq!(simple.len(), queries.len());
        prop_assert!(complex.is_subset(&moderate));
        prop_assert!(moderate.is_subset(&simple));
    }

    #[test]
    fn function_names_are_valid_identifiers(question in ".{0,200}") {
        let name = function_name(&question);
        prop_assert!(name.starts_with("genie_"));
        let suffix = &name["genie_".len()..];
        prop_assert!(suffix.chars().count() <= 50);
        prop_assert!(suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
        prop_assert!(!suffix.starts_with(|c: char| c.is_ascii_digit()));
    }

    #[test]
    fn function_name_ignores_case_and_spacing(words in prop::collection::vec("[a-zA-Z]{1,8}", 1..8)) {
        let spaced = words.join("   ");
        let upper = words.join(" ").to_uppercase();
        prop_assert_eq!(function_name(&spaced), function_name(&upper));
    }

    #[test]
    fn normalization_is_idempotent(question in ".{0,120}") {
        let once = normalize_question(&question);
        prop_assert_eq!(normalize_question(&once), once);
    }

    #[test]
    fn merge_plan_never_writes_a_key_twice(
        existing in prop::collection::vec("[a-d]", 0..4),
        batch in prop::collection::vec("[a-f]", 0..10),
        force in any::<bool>(),
    ) {
        let merge = plan(existing.iter().cloned(), &batch, force);
        let written: Vec<&String> = merge.writing().map(|i| &batch[i]).collect();
        let unique: HashSet<&String> = written.iter().copied().collect();
        prop_assert_eq!(unique.len(), written.len());
        for (key, disposition) in batch.iter().zip(&merge.dispositions) {
            if existing.contains(key) && !force {
                let skipped = matches!(disposition, Disposition::Existing { .. } | Disposition::BatchDuplicate);
                prop_assert!(skipped);
            }
        }
    }

    #[test]
    fn relative_days_subtract_exactly(days in 0i64..3650) {
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap();
        let parsed = parse_timestamp(&format!("{days}d"), now).unwrap();
        prop_assert_eq!(parsed, now.timestamp_millis() - days * 86_400_000);
    }
}

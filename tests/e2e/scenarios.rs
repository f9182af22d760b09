//! Whole-pipeline scenarios against in-memory collaborators.

use asset_miner::llm::Purpose;
use asset_miner::models::ComplexityTier;
use asset_miner::test_utils::FakeStore;
use serde_json::json;

use super::fixture::{Scenario, CTE_SQL, SIMPLE_SQL};

// =============================================================================
// Happy path and idempotence
// =============================================================================

#[test]
fn creates_examples_functions_and_registrations() {
    let mut scenario = Scenario::new();
    scenario
        .conversation("Revenue by region for recent orders", CTE_SQL)
        .conversation("List every order", SIMPLE_SQL);

    let report = scenario.run(&scenario.options());

    assert!(report.is_success(), "{:?}", report.errors);
    assert_eq!(report.total_conversations, 2);
    assert_eq!(report.total_messages, 4);
    assert_eq!(report.queries_extracted, 2);
    assert_eq!(report.complex_queries, 1);
    assert_eq!(report.examples_created, 1);
    assert_eq!(report.functions_created, 1);
    assert_eq!(report.functions_registered, 1);
    assert_eq!(scenario.example_count(), 1);
    assert_eq!(scenario.function_count(), 1);

    let doc = scenario.store.document().unwrap();
    assert_eq!(
        doc["instructions"]["sql_functions"][0]["identifier"],
        "main.assets.genie_revenue_by_region_for_recent"
    );
}

#[test]
fn second_run_adds_nothing_and_reports_existing() {
    let mut scenario = Scenario::new();
    scenario.conversation("Revenue by region for recent orders", CTE_SQL);

    let first = scenario.run(&scenario.options());
    assert!(first.is_success(), "{:?}", first.errors);
    let puts_after_first = scenario.store.put_count();

    let second = scenario.run(&scenario.options());
    assert_eq!(second.examples_created, 0);
    assert_eq!(second.functions_registered, 0);
    assert_eq!(scenario.example_count(), 1);
    assert_eq!(scenario.function_count(), 1);
    assert_eq!(scenario.store.put_count(), puts_after_first);
    assert!(second.errors.iter().any(|e| e.contains("already exists")));
    assert!(second.errors.iter().any(|e| e.contains("already registered")));
}

#[test]
fn force_replaces_registration_in_place() {
    let mut scenario = Scenario::new();
    scenario.conversation("Revenue by region for recent orders", CTE_SQL);
    scenario.run(&scenario.options());
    let first_id = scenario.store.document().unwrap()["instructions"]["sql_functions"][0]["id"].clone();

    let mut options = scenario.options();
    options.force = true;
    let report = scenario.run(&options);

    assert_eq!(report.functions_registered, 1);
    assert_eq!(scenario.function_count(), 1);
    let second_id = scenario.store.document().unwrap()["instructions"]["sql_functions"][0]["id"].clone();
    assert_ne!(first_id, second_id);
    assert_eq!(report.examples_created, 1);
    assert_eq!(scenario.example_count(), 1);
    assert!(report.is_success(), "{:?}", report.errors);
}

// =============================================================================
// Dry run
// =============================================================================

#[test]
fn dry_run_writes_nothing_and_reports_would_create() {
    let mut scenario = Scenario::new();
    for question in [
        "Revenue by region for recent orders",
        "Top customers by lifetime value",
        "Monthly churn by plan tier",
        "Average basket size per store",
        "Repeat purchase rate by cohort",
    ] {
        scenario.conversation(question, CTE_SQL);
    }
    scenario.conversation("List every order", SIMPLE_SQL);
    scenario.conversation("Show all customers", "SELECT * FROM customers");

    let mut options = scenario.options();
    options.dry_run = true;
    let report = scenario.run(&options);

    assert!(report.is_success(), "{:?}", report.errors);
    assert_eq!(report.queries_extracted, 7);
    assert_eq!(report.complex_queries, 5);
    assert_eq!(report.examples_created, 5);
    assert_eq!(report.functions_created, 5);
    assert_eq!(report.functions_registered, 5);
    assert!(scenario.engine.submitted().is_empty());
    assert_eq!(scenario.store.put_count(), 0);
    assert!(scenario.store.document().is_none());
}

#[test]
fn dry_run_separates_new_from_already_registered() {
    let mut scenario = Scenario::new();
    scenario.store = FakeStore::with_document(json!({
        "version": 1,
        "instructions": {"example_question_sqls": [
            {"id": "0a", "question": ["Monthly churn by plan tier"], "sql": ["SELECT 1"]},
            {"id": "0b", "question": ["Average basket size per store"], "sql": ["SELECT 2"]}
        ]}
    }));
    for question in [
        "Revenue by region for recent orders",
        "Top customers by lifetime value",
        "Monthly churn by plan tier",
        "Average basket size per store",
        "Repeat purchase rate by cohort",
        "Late deliveries by carrier",
        "Refund rate by category",
    ] {
        scenario.conversation(question, CTE_SQL);
    }

    let mut options = scenario.options();
    options.dry_run = true;
    options.create_functions = false;
    options.register_functions = false;
    let report = scenario.run(&options);

    assert_eq!(report.complex_queries, 7);
    assert_eq!(report.examples_created, 5);
    assert_eq!(report.errors.len(), 2);
    assert!(report.errors.iter().all(|e| e.contains("already exists")));
    assert_eq!(scenario.store.put_count(), 0);
    assert_eq!(scenario.example_count(), 2);
}

// =============================================================================
// Function creation
// =============================================================================

#[test]
fn corrected_statement_succeeds_on_third_attempt() {
    let mut scenario = Scenario::new();
    scenario.conversation("Revenue by region for recent orders", CTE_SQL);
    scenario
        .engine
        .fail_next_matching("CREATE", vec!["PARSE_SYNTAX_ERROR".into(), "UNRESOLVED_COLUMN".into()]);
    scenario
        .llm
        .push_generation(Purpose::SqlCorrection, Ok("CREATE OR REPLACE FUNCTION main.assets.fix_one() RETURNS TABLE RETURN SELECT 1".into()));
    scenario
        .llm
        .push_generation(Purpose::SqlCorrection, Ok("CREATE OR REPLACE FUNCTION main.assets.fix_two() RETURNS TABLE RETURN SELECT 2".into()));

    let report = scenario.run(&scenario.options());

    assert!(report.is_success(), "{:?}", report.errors);
    assert_eq!(scenario.engine.count_matching("CREATE"), 3);
    assert_eq!(report.functions_created, 1);
}

#[test]
fn exhausted_retries_are_reported_and_not_registered() {
    let mut scenario = Scenario::new();
    scenario.conversation("Revenue by region for recent orders", CTE_SQL);
    scenario.engine.fail_matching("CREATE", "PERMISSION_DENIED");

    let report = scenario.run(&scenario.options());

    assert_eq!(report.functions_created, 0);
    assert_eq!(report.functions_registered, 0);
    assert_eq!(report.examples_created, 1);
    assert_eq!(scenario.function_count(), 0);
    assert!(report.errors.iter().any(|e| e.contains("PERMISSION_DENIED")));
}

#[test]
fn shared_function_name_creates_one_function() {
    let mut scenario = Scenario::new();
    scenario
        .conversation("Top customers by revenue this year", CTE_SQL)
        .conversation("Top customers by revenue this quarter", CTE_SQL);

    let report = scenario.run(&scenario.options());

    assert_eq!(report.complex_queries, 2);
    assert_eq!(report.examples_created, 2);
    assert_eq!(report.functions_created, 1);
    assert_eq!(scenario.engine.count_matching("CREATE"), 1);
}

#[test]
fn missing_warehouse_fails_functions_only() {
    let mut scenario = Scenario::new();
    scenario.conversation("Revenue by region for recent orders", CTE_SQL);
    let mut options = scenario.options();
    options.warehouse_id = None;

    let report = scenario.run(&options);

    assert_eq!(report.examples_created, 1);
    assert_eq!(report.functions_created, 0);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("No execution target configured"));
    assert!(scenario.engine.submitted().is_empty());
}

// =============================================================================
// Extraction and thresholds
// =============================================================================

#[test]
fn duplicate_questions_are_extracted_once() {
    let mut scenario = Scenario::new();
    scenario
        .conversation("Revenue by region for recent orders", CTE_SQL)
        .conversation("  revenue BY region   for recent orders ", CTE_SQL);

    let report = scenario.run(&scenario.options());

    assert_eq!(report.queries_extracted, 1);
    assert_eq!(report.examples_created, 1);
}

#[test]
fn lower_threshold_admits_more_candidates() {
    let mut scenario = Scenario::new();
    scenario
        .conversation("Revenue by region for recent orders", CTE_SQL)
        .conversation("Orders per region", "SELECT region, COUNT(*) FROM orders GROUP BY region")
        .conversation("List every order", SIMPLE_SQL);

    let mut options = scenario.options();
    options.dry_run = true;
    let counts: Vec<usize> = [ComplexityTier::Complex, ComplexityTier::Moderate, ComplexityTier::Simple]
        .into_iter()
        .map(|threshold| {
            options.threshold = threshold;
            scenario.run(&options).complex_queries
        })
        .collect();

    assert_eq!(counts, vec![1, 2, 3]);
}

#[test]
fn toggles_skip_steps() {
    let mut scenario = Scenario::new();
    scenario.conversation("Revenue by region for recent orders", CTE_SQL);
    let mut options = scenario.options();
    options.create_examples = false;
    options.register_functions = false;

    let report = scenario.run(&options);

    assert!(report.is_success(), "{:?}", report.errors);
    assert_eq!(report.examples_created, 0);
    assert_eq!(report.functions_created, 1);
    assert_eq!(report.functions_registered, 0);
    assert_eq!(scenario.store.put_count(), 0);
}

// =============================================================================
// Cancellation
// =============================================================================

#[test]
fn cancelled_run_reports_cancellation() {
    let mut scenario = Scenario::new();
    scenario.conversation("Revenue by region for recent orders", CTE_SQL);
    scenario.cancel.cancel();

    let report = scenario.run(&scenario.options());

    assert_eq!(report.queries_extracted, 1);
    assert_eq!(report.examples_created, 0);
    assert!(report.errors.iter().any(|e| e == "Operation cancelled"));
    assert!(scenario.engine.submitted().is_empty());
    assert_eq!(scenario.store.put_count(), 0);
}

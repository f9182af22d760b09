//! Criterion benchmarks for the per-query hot paths.
//!
//! Every extracted query goes through the heuristic when the classifier is
//! down, and every candidate through name derivation and the merge planner.

use std::hint::black_box;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use asset_miner::classify::heuristic;
use asset_miner::materialize::function_name;
use asset_miner::registry::merge::plan;
use asset_miner::utils::normalize_question;

const COMPLEX_SQL: &str = "WITH recent AS (SELECT * FROM orders WHERE order_date >= '2024-01-01') \
    SELECT c.region, p.category, SUM(r.amount) AS revenue, \
    ROW_NUMBER() OVER (PARTITION BY c.region ORDER BY SUM(r.amount) DESC) AS rank \
    FROM recent r JOIN customers c ON r.customer_id = c.id \
    JOIN products p ON r.product_id = p.id JOIN stores s ON r.store_id = s.id \
    GROUP BY c.region, p.category";

// =============================================================================
// Heuristic Classification Benchmarks
// =============================================================================

fn heuristic_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("heuristic_analyze");

    for repeat in [1, 10, 50] {
        let sql = COMPLEX_SQL.repeat(repeat);
        group.throughput(Throughput::Bytes(sql.len() as u64));
        group.bench_with_input(BenchmarkId::new("sql_size", sql.len()), &sql, |b, sql| {
            b.iter(|| heuristic::analyze(black_box(sql)));
        });
    }

    group.bench_function("simple_select", |b| {
        b.iter(|| heuristic::analyze(black_box("SELECT id, name FROM customers WHERE region = 'EU'")));
    });

    group.finish();
}

// =============================================================================
// Naming and Dedup Benchmarks
// =============================================================================

fn naming_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("naming");
    let question = "What were the top 10 customers by revenue in each region during Q3 2024?";

    group.bench_function("function_name", |b| {
        b.iter(|| function_name(black_box(question)));
    });
    group.bench_function("normalize_question", |b| {
        b.iter(|| normalize_question(black_box(question)));
    });

    let existing: Vec<String> = (0..1000).map(|i| format!("question number {i}")).collect();
    let batch: Vec<String> = (500..600).map(|i| format!("question number {i}")).collect();
    group.throughput(Throughput::Elements(batch.len() as u64));
    group.bench_function("merge_plan_1000x100", |b| {
        b.iter(|| plan(black_box(existing.iter().cloned()), black_box(&batch), false));
    });

    group.finish();
}

criterion_group!(benches, heuristic_benchmarks, naming_benchmarks);
criterion_main!(benches);

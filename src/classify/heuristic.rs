//! Keyword-based complexity classification.
//!
//! A pure function of the SQL text. Used whenever the structured classifier
//! cannot produce an answer, so it must never fail.

use crate::models::{ComplexityAnalysis, ComplexityTier};

const WINDOW_KEYWORDS: [&str; 8] = [
    "OVER(",
    "OVER (",
    "PARTITION BY",
    "ROW_NUMBER",
    "RANK(",
    "DENSE_RANK",
    "LAG(",
    "LEAD(",
];

const AGGREGATION_KEYWORDS: [&str; 6] = ["GROUP BY", "SUM(", "COUNT(", "AVG(", "MAX(", "MIN("];

pub const COMPLEX_REASONING: &str =
    "Query contains advanced SQL features (window functions, CTEs, multiple JOINs, or subqueries)";
pub const MODERATE_REASONING: &str = "Query contains JOINs or aggregations";
pub const SIMPLE_REASONING: &str = "Simple query with basic SELECT/WHERE operations";

/// Classify `sql` by keyword inspection of its upper-cased text.
#[must_use]
pub fn analyze(sql: &str) -> ComplexityAnalysis {
    let upper = sql.to_uppercase();

    let join_count = u32::try_from(upper.matches(" JOIN ").count()).unwrap_or(u32::MAX);
    let has_joins = join_count > 0;
    let has_subqueries = upper
        .find("FROM")
        .is_some_and(|from| upper[from..].contains("SELECT"));
    let has_ctes = upper.trim().starts_with("WITH ");
    let has_window_functions = WINDOW_KEYWORDS.iter().any(|kw| upper.contains(kw));
    let has_aggregations = AGGREGATION_KEYWORDS.iter().any(|kw| upper.contains(kw));

    let (tier, reasoning) = if has_window_functions || has_ctes || join_count >= 3 || has_subqueries
    {
        (ComplexityTier::Complex, COMPLEX_REASONING)
    } else if has_joins || has_aggregations {
        (ComplexityTier::Moderate, MODERATE_REASONING)
    } else {
        (ComplexityTier::Simple, SIMPLE_REASONING)
    };

    ComplexityAnalysis {
        tier,
        reasoning: reasoning.to_string(),
        has_joins,
        has_subqueries,
        has_ctes,
        has_window_functions,
        has_aggregations,
        join_count,
    }
}

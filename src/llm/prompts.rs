//! Fixed prompts and user-message builders.

use crate::models::Candidate;
use crate::utils::take_chars;

pub const COMPLEXITY_SYSTEM_PROMPT: &str = "You are an expert SQL analyst. Your task is to analyze SQL queries and determine their complexity.

Classify queries into one of three complexity levels:
- SIMPLE: Basic SELECT with simple WHERE clauses, no JOINs or subqueries
- MODERATE: Contains JOINs, GROUP BY, or simple aggregations
- COMPLEX: Contains multiple JOINs, subqueries, CTEs, window functions, or complex aggregations

When analyzing, identify:
1. Number of JOIN operations
2. Presence of subqueries (in SELECT, FROM, or WHERE clauses)
3. Use of CTEs (WITH clauses)
4. Window functions (OVER, PARTITION BY, ROW_NUMBER, RANK, etc.)
5. Complex aggregations (GROUP BY with HAVING, multiple aggregate functions)
6. Set operations (UNION, INTERSECT, EXCEPT)

A query should be classified as COMPLEX if it has:
- 3 or more JOINs, OR
- Any CTEs with multiple references, OR
- Window functions, OR
- Nested subqueries, OR
- Complex business logic that would benefit from being a reusable asset

Respond with a single JSON object with the keys: complexity (\"simple\", \"moderate\" or \"complex\"), reasoning, has_joins, has_subqueries, has_ctes, has_window_functions, has_aggregations, join_count.";

pub const PARAMETER_EXTRACTION_PROMPT: &str = "You are an expert SQL analyst. Your task is to identify literal values in SQL queries that should be parameterized for reusability.

Identify values that are likely to change between executions:
1. Dates and time periods: specific dates, date ranges, week numbers, months, years
2. Entity identifiers: customer IDs, names, site names, region names, product codes
3. Thresholds and limits: numeric thresholds, LIMIT values, TOP N values
4. Status values: status codes, categories that might be filtered differently

DO NOT parameterize:
- Table names or column names
- SQL keywords or operators
- Aggregate functions
- Constant business logic values that are unlikely to change

For each parameter:
1. Create a descriptive snake_case name (e.g., start_date, customer_name, min_threshold)
2. Determine the parameter type, which MUST be one of: String, Date, Date and Time, Decimal, Integer
3. Use the original value as the default value
4. Write a clear description of what the parameter represents

In the parameterized SQL:
- Replace literal values with named parameter markers using a colon prefix: :parameter_name
- Maintain proper SQL syntax
- Keep the query structure intact

Example:
Original: SELECT * FROM orders WHERE order_date >= '2024-01-01' AND customer = 'ACME Corp' AND amount > 1000
Parameterized: SELECT * FROM orders WHERE order_date >= :start_date AND customer = :customer_name AND amount > :min_amount

Respond with a single JSON object: {\"parameters\": [{\"name\", \"type\", \"original_value\", \"description\", \"default_value\"}], \"parameterized_sql\", \"reasoning\"}.";

pub const USAGE_GUIDANCE_PROMPT: &str = "You are a data analyst helping users understand when to use a SQL query.

Given a question and its SQL query, generate concise usage guidance that explains:
1. When this query is relevant (what business scenarios)
2. What the query returns
3. If parameterized, how to customize the parameters

Keep the guidance to 2-4 sentences. Be specific and actionable.
Do NOT repeat the question. Focus on practical guidance.";

pub const FUNCTION_DESCRIPTION_PROMPT: &str = "Generate a clear, concise 1-2 sentence description of what this SQL function does. \
Focus on the business value and what data it returns. \
Do NOT include the example question. \
Do NOT use markdown or special formatting. \
Write in plain text suitable for a function comment.";

pub const SQL_CORRECTION_PROMPT: &str = "You are an expert SQL developer. A CREATE FUNCTION statement failed with an error.
Analyze the error and provide a corrected SQL statement.

Correct catalog function syntax examples:

Example 1 - Function with CTE:
CREATE OR REPLACE FUNCTION catalog.schema.func_name(param1 INT)
RETURNS TABLE
LANGUAGE SQL
COMMENT 'Description'
RETURN
  WITH cte_name AS (
    SELECT col1 FROM table WHERE id = param1
  )
  SELECT * FROM cte_name

Example 2 - Simple function:
CREATE OR REPLACE FUNCTION catalog.schema.func_name()
RETURNS TABLE
LANGUAGE SQL
COMMENT 'Description'
RETURN SELECT col1, col2 FROM table

Common mistakes to avoid:
1. Don't use RETURN (SELECT ...) - no parentheses after RETURN
2. Don't use AS instead of RETURN
3. Don't add trailing semicolons inside the function body
4. Parameters cannot be used directly in LIMIT clauses (use WHERE with row_number instead)
5. Invalid parameter types - use valid SQL types (STRING, INT, DOUBLE, DATE, TIMESTAMP, etc.)
6. Invalid DEFAULT values for parameters

Provide ONLY the corrected CREATE FUNCTION statement. No explanation needed.";

#[must_use]
pub fn classification_message(sql: &str) -> String {
    format!("Analyze this SQL query:\n\n```sql\n{sql}\n```")
}

#[must_use]
pub fn extraction_message(sql: &str, question: &str) -> String {
    format!(
        "Extract parameters from this SQL query.\n\nOriginal question: {question}\n\nSQL:\n```sql\n{sql}\n```"
    )
}

#[must_use]
pub fn usage_guidance_message(candidate: &Candidate) -> String {
    let mut message = format!(
        "Question: {}\n\nSQL:\n```sql\n{}\n```",
        candidate.question,
        candidate.sql_to_use()
    );
    if !candidate.parameters.is_empty() {
        let params = candidate
            .parameters
            .iter()
            .map(|p| format!("{} ({}): {}", p.name, p.declared_type.display_name(), p.description))
            .collect::<Vec<_>>()
            .join(", ");
        message.push_str("\n\nParameters: ");
        message.push_str(&params);
    }
    message
}

#[must_use]
pub fn function_description_message(candidate: &Candidate) -> String {
    format!(
        "Question: {}\n\nSQL:\n{}",
        candidate.question,
        take_chars(&candidate.sql, 500)
    )
}

#[must_use]
pub fn correction_message(failed_statement: &str, error: &str) -> String {
    format!(
        "Original SQL that failed:\n```sql\n{failed_statement}\n```\n\nError message:\n{error}\n\nProvide the corrected CREATE FUNCTION statement:"
    )
}

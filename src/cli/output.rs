//! Report rendering for the terminal and for machines.

use std::fmt::Write as _;

use colored::Colorize;
use serde::Serialize;

use crate::error::Result;
use crate::models::Report;

/// Errors listed before the remainder is summarized.
pub const MAX_LISTED_ERRORS: usize = 5;

#[derive(Serialize)]
struct JsonReport<'a> {
    success: bool,
    #[serde(flatten)]
    report: &'a Report,
}

pub fn render_json(report: &Report) -> Result<String> {
    Ok(serde_json::to_string_pretty(&JsonReport {
        success: report.is_success(),
        report,
    })?)
}

pub fn render_human(report: &Report, dry_run: bool) -> String {
    let mut out = String::new();
    let title = if dry_run { "Run summary (dry run)" } else { "Run summary" };
    let _ = writeln!(out, "{}", title.bold());

    let rows = [
        ("Conversations scanned", report.total_conversations),
        ("Messages scanned", report.total_messages),
        ("Queries extracted", report.queries_extracted),
        ("Candidates", report.complex_queries),
        ("Examples created", report.examples_created),
        ("Functions created", report.functions_created),
        ("Functions registered", report.functions_registered),
    ];
    for (label, value) in rows {
        let _ = writeln!(out, "  {label:<22} {value}");
    }

    if report.errors.is_empty() {
        let _ = writeln!(out, "{} Completed without errors", "✓".green().bold());
        return out;
    }

    let _ = writeln!(
        out,
        "{} {} error(s)",
        "✗".red().bold(),
        report.errors.len()
    );
    for error in report.errors.iter().take(MAX_LISTED_ERRORS) {
        let _ = writeln!(out, "  - {error}");
    }
    if report.errors.len() > MAX_LISTED_ERRORS {
        let _ = writeln!(
            out,
            "  {}",
            format!("... and {} more", report.errors.len() - MAX_LISTED_ERRORS).dimmed()
        );
    }
    out
}

//! Text and SQL formatting utilities

use sqlformat::{FormatOptions, Indent, QueryParams};

/// Truncate a string to a maximum length, ending with `...` when cut.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    if max_len < 3 {
        return "...".to_string();
    }
    let trimmed = s.chars().take(max_len - 3).collect::<String>();
    format!("{trimmed}...")
}

/// Take at most `max_len` characters, without any marker.
pub fn take_chars(s: &str, max_len: usize) -> String {
    s.chars().take(max_len).collect()
}

/// Normalize a question for duplicate detection: lowercase, whitespace collapsed.
pub fn normalize_question(question: &str) -> String {
    question
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reformat SQL for readability: upper-case keywords, two-space indent.
pub fn format_sql(sql: &str) -> String {
    let options = FormatOptions {
        indent: Indent::Spaces(2),
        uppercase: true,
        ..FormatOptions::default()
    };
    let formatted = sqlformat::format(sql, &QueryParams::None, options);
    if formatted.trim().is_empty() {
        sql.to_string()
    } else {
        formatted
    }
}

/// Split text into registry lines; every line but the last keeps its newline.
pub fn to_lines(text: &str) -> Vec<String> {
    let parts: Vec<&str> = text.split('\n').collect();
    let last = parts.len().saturating_sub(1);
    parts
        .into_iter()
        .enumerate()
        .map(|(idx, line)| {
            if idx < last {
                format!("{line}\n")
            } else {
                line.to_string()
            }
        })
        .collect()
}

/// Extract the body of a fenced code block, preferring a ```sql fence.
///
/// Returns the trimmed input when no complete fence is present.
pub fn unwrap_code_fence(text: &str) -> String {
    let text = text.trim();
    for opener in ["```sql", "```json", "```"] {
        if let Some(start) = text.find(opener) {
            let body_start = start + opener.len();
            if let Some(len) = text[body_start..].find("```") {
                if len > 0 {
                    return text[body_start..body_start + len].trim().to_string();
                }
            }
        }
    }
    text.to_string()
}

/// Format milliseconds since the epoch as an RFC 3339 UTC string.
pub fn format_epoch_millis(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map_or_else(|| millis.to_string(), |dt| dt.to_rfc3339())
}

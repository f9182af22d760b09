//! Shared helpers.

pub mod format;

pub use format::{
    format_epoch_millis, format_sql, normalize_question, take_chars, to_lines,
    truncate_string, unwrap_code_fence,
};

//! Statement guards
//!
//! Structural checks on composed SQL: read-only enforcement, row-cap
//! detection and injection, identifier quoting. These obligations live in
//! code rather than in any model prompt.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AppError, Result};

static FORBIDDEN_VERBS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(insert|update|delete|drop|alter|create|truncate|grant|revoke|merge|copy|vacuum|call|execute|begin|commit|rollback)\b",
    )
    .expect("forbidden-verb pattern compiles")
});

static ROW_LIMIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(limit\s+\d+|fetch\s+first\s+\d+)\b").expect("row-limit pattern compiles")
});

/// Reject anything that is not a single read-only statement
pub fn assert_read_only(sql: &str) -> Result<()> {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return Err(AppError::Query("empty statement".to_string()));
    }

    let lowered = trimmed.to_ascii_lowercase();
    if !(lowered.starts_with("select") || lowered.starts_with("with")) {
        return Err(AppError::ForbiddenOperation(format!(
            "only SELECT statements are allowed, got: {}",
            trimmed.split_whitespace().next().unwrap_or_default()
        )));
    }

    if let Some(m) = FORBIDDEN_VERBS.find(&lowered) {
        return Err(AppError::ForbiddenOperation(format!(
            "statement contains forbidden verb: {}",
            m.as_str().to_uppercase()
        )));
    }

    // One statement per call; a separator anywhere means more than one.
    if trimmed.contains(';') {
        return Err(AppError::ForbiddenOperation(
            "statement separators are not allowed".to_string(),
        ));
    }

    Ok(())
}

/// Whether the statement already carries a row-limiting clause
pub fn has_row_limit(sql: &str) -> bool {
    ROW_LIMIT.is_match(sql)
}

/// Inject a row cap unless one is already present
pub fn ensure_row_limit(sql: &str, cap: u64) -> String {
    if has_row_limit(sql) {
        sql.trim_end().to_string()
    } else {
        format!("{} LIMIT {}", sql.trim_end(), cap)
    }
}

/// Remove a terminating statement separator
pub fn strip_trailing_separator(sql: &str) -> String {
    sql.trim_end().trim_end_matches(';').trim_end().to_string()
}

/// Quote an identifier, preserving case
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

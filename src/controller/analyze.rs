//! Result analysis
//!
//! Plausibility inspection of an executed result set. Runs on every turn
//! before the answer is presented: row count against expectation, null
//! density, duplicate rows, and anything that smells like a data-quality
//! problem.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::tools::QueryResult;

/// Null occurrences of one result column
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnNulls {
    pub column: String,
    pub null_count: usize,
}

/// Outcome of the analyze stage
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResultAnalysis {
    pub row_count: usize,
    /// The row cap the statement carried, if any
    pub expected_limit: Option<u64>,
    /// The result filled the cap; more rows may exist
    pub hit_row_cap: bool,
    /// Columns containing nulls
    pub null_counts: Vec<ColumnNulls>,
    /// Fully identical rows
    pub duplicate_rows: usize,
    /// Human-readable observations
    pub notes: Vec<String>,
}

/// Inspect an executed result set
pub fn analyze_result(result: &QueryResult, expected_limit: Option<u64>) -> ResultAnalysis {
    let row_count = result.row_count();
    let hit_row_cap = expected_limit.map(|l| row_count as u64 >= l).unwrap_or(false);

    let mut nulls: BTreeMap<String, usize> = BTreeMap::new();
    let mut seen = HashSet::new();
    let mut duplicate_rows = 0;

    for row in &result.rows {
        for (column, value) in row {
            if value.is_null() {
                *nulls.entry(column.clone()).or_insert(0) += 1;
            }
        }
        let fingerprint = serde_json::to_string(row).unwrap_or_default();
        if !seen.insert(fingerprint) {
            duplicate_rows += 1;
        }
    }

    let null_counts: Vec<ColumnNulls> = nulls
        .into_iter()
        .map(|(column, null_count)| ColumnNulls { column, null_count })
        .collect();

    let mut notes = Vec::new();
    if row_count == 0 {
        notes.push(
            "The query returned no rows; the filters may be too narrow or the data absent."
                .to_string(),
        );
    }
    if hit_row_cap {
        notes.push(format!(
            "The result filled the row cap of {}; more rows may exist.",
            expected_limit.unwrap_or_default()
        ));
    }
    for c in &null_counts {
        notes.push(format!(
            "Column {} contains {} null value(s); aggregates ignore them.",
            c.column, c.null_count
        ));
    }
    if duplicate_rows > 0 {
        notes.push(format!(
            "{} fully duplicated row(s); consider whether the grain of the query is right.",
            duplicate_rows
        ));
    }

    ResultAnalysis {
        row_count,
        expected_limit,
        hit_row_cap,
        null_counts,
        duplicate_rows,
        notes,
    }
}

/// Render the analysis narrative shown to the analyst
pub fn narrative(analysis: &ResultAnalysis) -> String {
    let mut lines = vec![format!("The query returned {} row(s).", analysis.row_count)];
    for note in &analysis.notes {
        lines.push(note.clone());
    }
    if analysis.notes.is_empty() {
        lines.push("No anomalies stood out: no nulls, no duplicates, row count within bounds.".to_string());
    }
    lines.join(" ")
}

//! SQL composition
//!
//! Renders exactly one PostgreSQL statement from a structured plan and a
//! resolved join specification. Identifiers are quoted to preserve case,
//! no terminating separator is emitted, a row cap is injected unless the
//! analyst asked for everything, and joins without aggregation deduplicate
//! through DISTINCT.

use crate::error::{AppError, Result};
use crate::schema::JoinHop;
use crate::tools::guards;

use super::plan::{ColumnRef, FilterOp, OrderKey, QueryPlan};

fn qualified(column: &ColumnRef) -> String {
    format!(
        "{}.{}",
        guards::quote_ident(&column.table),
        guards::quote_ident(&column.column)
    )
}

fn literal(value: &serde_json::Value) -> Result<String> {
    match value {
        serde_json::Value::String(s) => Ok(format!("'{}'", s.replace('\'', "''"))),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(if *b { "TRUE" } else { "FALSE" }.to_string()),
        other => Err(AppError::Validation(format!(
            "unsupported filter literal: {}",
            other
        ))),
    }
}

/// Render the statement for a plan and its join hops
pub fn render(plan: &QueryPlan, hops: &[JoinHop], default_row_limit: u64) -> Result<String> {
    let primary = plan
        .tables
        .first()
        .ok_or_else(|| AppError::Validation("plan names no tables".to_string()))?;

    // Projection
    let mut select_list: Vec<String> = plan.columns.iter().map(qualified).collect();
    for agg in &plan.aggregates {
        let expr = match &agg.column {
            Some(column) => format!("{}({})", agg.func.as_sql(), qualified(column)),
            None => "COUNT(*)".to_string(),
        };
        select_list.push(format!("{} AS {}", expr, guards::quote_ident(&agg.alias)));
    }
    if select_list.is_empty() {
        select_list.push("*".to_string());
    }

    let distinct = if plan.involves_join() && !plan.is_aggregation() {
        "DISTINCT "
    } else {
        ""
    };

    let mut sql = format!(
        "SELECT {}{} FROM {}",
        distinct,
        select_list.join(", "),
        guards::quote_ident(primary)
    );

    // Joins, in resolution order
    for hop in hops {
        let on: Vec<String> = hop
            .columns
            .iter()
            .map(|(source, target)| {
                format!(
                    "{}.{} = {}.{}",
                    guards::quote_ident(&hop.source_table),
                    guards::quote_ident(source),
                    guards::quote_ident(&hop.target_table),
                    guards::quote_ident(target)
                )
            })
            .collect();
        sql.push_str(&format!(
            " JOIN {} ON {}",
            guards::quote_ident(&hop.target_table),
            on.join(" AND ")
        ));
    }

    // Filters, with null guards where the operator would silently
    // misclassify null rows
    let mut predicates: Vec<String> = Vec::new();
    for filter in &plan.filters {
        let column = qualified(&filter.column);
        if filter.value.is_null() {
            match filter.op {
                FilterOp::Eq => predicates.push(format!("{} IS NULL", column)),
                FilterOp::Ne => predicates.push(format!("{} IS NOT NULL", column)),
                _ => {
                    return Err(AppError::Validation(
                        "null literals only combine with equality operators".to_string(),
                    ));
                }
            }
            continue;
        }

        predicates.push(format!(
            "{} {} {}",
            column,
            filter.op.as_sql(),
            literal(&filter.value)?
        ));
        if filter.op.needs_null_guard() {
            predicates.push(format!("{} IS NOT NULL", column));
        }
    }
    if !predicates.is_empty() {
        sql.push_str(&format!(" WHERE {}", predicates.join(" AND ")));
    }

    // Aggregation groups by every plain projection
    if plan.is_aggregation() && !plan.columns.is_empty() {
        let keys: Vec<String> = plan.columns.iter().map(qualified).collect();
        sql.push_str(&format!(" GROUP BY {}", keys.join(", ")));
    }

    if !plan.order_by.is_empty() {
        let keys: Vec<String> = plan
            .order_by
            .iter()
            .map(|o| {
                let key = match &o.key {
                    OrderKey::Alias(alias) => guards::quote_ident(alias),
                    OrderKey::Column(column) => qualified(column),
                };
                format!("{}{}", key, if o.descending { " DESC" } else { "" })
            })
            .collect();
        sql.push_str(&format!(" ORDER BY {}", keys.join(", ")));
    }

    let sql = guards::strip_trailing_separator(&sql);
    if plan.all_rows {
        Ok(sql)
    } else {
        Ok(guards::ensure_row_limit(
            &sql,
            plan.row_limit.unwrap_or(default_row_limit),
        ))
    }
}

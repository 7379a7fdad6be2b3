//! Statement validation
//!
//! Confirms every identifier a plan references against the authoritative
//! `describe_table` schemas, correcting casing in place, and re-checks the
//! structural obligations on the rendered statement before execution.

use std::collections::HashMap;

use crate::error::{AppError, Result};
use crate::tools::{guards, TableSchema, ToolExecutor};

use super::plan::{ColumnRef, OrderKey, QueryPlan};

/// Confirm and case-correct every identifier in the plan
///
/// Missing schemas are described on demand and cached in `schemas`
/// (keyed by upper-cased table name). A column the warehouse does not
/// know fails validation; the controller loops back to composition.
pub async fn confirm_identifiers(
    plan: &mut QueryPlan,
    schemas: &mut HashMap<String, TableSchema>,
    tools: &dyn ToolExecutor,
) -> Result<()> {
    for table in &mut plan.tables {
        let key = table.to_ascii_uppercase();
        if !schemas.contains_key(&key) {
            let schema = tools.describe_table(table).await?;
            schemas.insert(key.clone(), schema);
        }
        *table = schemas[&key].table_name.clone();
    }

    let tables = plan.tables.clone();
    let fix = |column: &mut ColumnRef| -> Result<()> {
        let table = tables
            .iter()
            .find(|t| t.eq_ignore_ascii_case(&column.table))
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "column {}.{} references a table outside the plan",
                    column.table, column.column
                ))
            })?;
        let schema = &schemas[&table.to_ascii_uppercase()];
        let confirmed = schema.column(&column.column).ok_or_else(|| {
            AppError::Validation(format!(
                "column {} not found in table {}",
                column.column, schema.table_name
            ))
        })?;
        column.table = schema.table_name.clone();
        column.column = confirmed.name.clone();
        Ok(())
    };

    for column in &mut plan.columns {
        fix(column)?;
    }
    for aggregate in &mut plan.aggregates {
        if let Some(column) = &mut aggregate.column {
            fix(column)?;
        }
    }
    for filter in &mut plan.filters {
        fix(&mut filter.column)?;
    }
    for order in &mut plan.order_by {
        if let OrderKey::Column(column) = &mut order.key {
            fix(column)?;
        }
    }

    Ok(())
}

/// Structural checks on the rendered statement
pub fn validate_statement(sql: &str, all_rows: bool) -> Result<()> {
    guards::assert_read_only(sql)?;
    if !all_rows && !guards::has_row_limit(sql) {
        return Err(AppError::Validation(
            "statement carries no row cap and the user did not ask for all rows".to_string(),
        ));
    }
    Ok(())
}

/// Fallback join inference: identically named, identically typed columns
///
/// Used only when the semantic model declares no relationship path. Pairs
/// come out in the first table's column declaration order, which is the
/// deterministic tie-break when several candidates exist.
pub fn match_columns(a: &TableSchema, b: &TableSchema) -> Vec<(String, String)> {
    a.columns
        .iter()
        .filter_map(|col| {
            b.column(&col.name)
                .filter(|other| other.data_type.eq_ignore_ascii_case(&col.data_type))
                .map(|other| (col.name.clone(), other.name.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::plan::{Aggregate, AggregateFunc};
    use crate::models::knowledge::KnowledgeSnippet;
    use crate::models::turn::ToolCall;
    use crate::tools::{ColumnSchema, QueryResult};
    use async_trait::async_trait;

    fn schema(table: &str, columns: &[(&str, &str, bool)]) -> TableSchema {
        TableSchema {
            table_name: table.to_string(),
            columns: columns
                .iter()
                .map(|(name, data_type, nullable)| ColumnSchema {
                    name: name.to_string(),
                    data_type: data_type.to_string(),
                    nullable: *nullable,
                })
                .collect(),
        }
    }

    struct DescribeOnly;

    #[async_trait]
    impl ToolExecutor for DescribeOnly {
        async fn describe_table(&self, name: &str) -> Result<TableSchema> {
            match name.to_ascii_uppercase().as_str() {
                "FACT_SALES" => Ok(schema(
                    "FACT_SALES",
                    &[("sale_id", "bigint", false), ("Total_Amount", "numeric", true)],
                )),
                other => Err(AppError::NotFound(format!("table not found: {}", other))),
            }
        }

        async fn run_query(&self, _sql: &str, _limit: Option<u64>) -> Result<QueryResult> {
            unreachable!("validation never executes")
        }

        async fn search_knowledge_base(&self, _topic: &str) -> Result<Vec<KnowledgeSnippet>> {
            Ok(Vec::new())
        }

        async fn get_tool_call_history(&self, _n: usize) -> Result<Vec<ToolCall>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_casing_is_corrected_from_schema() {
        let mut plan = QueryPlan {
            tables: vec!["fact_sales".into()],
            aggregates: vec![Aggregate {
                func: AggregateFunc::Sum,
                column: Some(ColumnRef::new("fact_sales", "total_amount")),
                alias: "total".into(),
            }],
            ..Default::default()
        };
        let mut schemas = HashMap::new();

        confirm_identifiers(&mut plan, &mut schemas, &DescribeOnly)
            .await
            .unwrap();

        assert_eq!(plan.tables[0], "FACT_SALES");
        let column = plan.aggregates[0].column.as_ref().unwrap();
        assert_eq!(column.table, "FACT_SALES");
        assert_eq!(column.column, "Total_Amount");
    }

    #[tokio::test]
    async fn test_unknown_column_fails_validation() {
        let mut plan = QueryPlan {
            tables: vec!["FACT_SALES".into()],
            columns: vec![ColumnRef::new("FACT_SALES", "imaginary")],
            ..Default::default()
        };
        let mut schemas = HashMap::new();

        let err = confirm_identifiers(&mut plan, &mut schemas, &DescribeOnly)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_statement_must_carry_cap_unless_all_rows() {
        let uncapped = "SELECT * FROM \"FACT_SALES\"";
        assert!(validate_statement(uncapped, false).is_err());
        assert!(validate_statement(uncapped, true).is_ok());
        assert!(validate_statement("SELECT * FROM \"FACT_SALES\" LIMIT 10", false).is_ok());
    }

    #[test]
    fn test_match_columns_requires_name_and_type() {
        let a = schema(
            "FACT_INVENTORY",
            &[
                ("product_id", "bigint", false),
                ("store_id", "bigint", false),
                ("quantity", "numeric", true),
            ],
        );
        let b = schema(
            "FACT_PURCHASE_ORDERS",
            &[
                ("product_id", "bigint", false),
                ("store_id", "varchar", false),
                ("order_qty", "numeric", true),
            ],
        );

        // store_id differs in type, quantity has no counterpart.
        assert_eq!(
            match_columns(&a, &b),
            vec![("product_id".to_string(), "product_id".to_string())]
        );
    }

    #[test]
    fn test_match_columns_none_when_nothing_aligns() {
        let a = schema("A", &[("x", "bigint", false)]);
        let b = schema("B", &[("y", "bigint", false)]);
        assert!(match_columns(&a, &b).is_empty());
    }
}

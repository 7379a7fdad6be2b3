//! Query planning collaborators
//!
//! `QueryPlanner` is the boundary to the language-understanding layer: it
//! proposes candidate tables for a question and turns the gathered context
//! into a structured plan. `KeywordPlanner` is the deterministic built-in
//! used for hermetic runs and tests; production deployments plug in an
//! LLM-backed implementation against the same trait.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Result;
use crate::models::semantic::SemanticModel;

use super::plan::{
    Aggregate, AggregateFunc, ColumnRef, OrderBy, OrderKey, PlanningContext, QueryPlan,
};

/// Language-understanding collaborator contract
#[async_trait]
pub trait QueryPlanner: Send + Sync {
    /// Propose candidate tables for a question, best first.
    ///
    /// An empty proposal sends the controller to clarification.
    async fn identify_tables(&self, question: &str, model: &SemanticModel) -> Result<Vec<String>>;

    /// Build a structured plan from the gathered context.
    async fn build_plan(&self, ctx: &PlanningContext) -> Result<QueryPlan>;

    /// Rebuild a plan after a validation or execution failure.
    async fn repair_plan(
        &self,
        ctx: &PlanningContext,
        prior_sql: &str,
        error: &str,
    ) -> Result<QueryPlan>;
}

static EXPLICIT_LIMIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:top|first)\s+(\d+)\b").expect("limit pattern compiles"));

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "are", "our", "all", "any", "show", "what", "which", "who",
    "how", "per", "between", "across", "into", "over", "their", "them", "this", "that", "have",
    "has", "most", "more", "than", "list", "give",
];

const NUMERIC_TYPES: &[&str] = &[
    "numeric", "decimal", "double", "double precision", "float", "real", "money", "bigint",
    "int", "integer", "smallint",
];

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(|t| t.to_ascii_lowercase())
        .filter(|t| t.len() >= 3 && !STOPWORDS.contains(&t.as_str()))
        .collect()
}

fn token_matches(question_token: &str, word: &str) -> bool {
    if question_token == word {
        return true;
    }
    // Prefix match absorbs plural/gerund variation (customer/customers,
    // purchase/purchasing).
    let min = question_token.len().min(word.len());
    min >= 4 && (question_token.starts_with(word) || word.starts_with(question_token))
}

fn any_match(question_tokens: &[String], word: &str) -> bool {
    question_tokens.iter().any(|qt| token_matches(qt, word))
}

/// Deterministic keyword planner
///
/// Scores tables by name, description and use-case overlap with the
/// question, then keeps only candidates connected to the selection through
/// declared relationships, the way an analyst walks the semantic model.
pub struct KeywordPlanner;

impl KeywordPlanner {
    pub fn new() -> Self {
        Self
    }

    fn score_table(question_tokens: &[String], table: &crate::models::semantic::TableDef) -> f32 {
        let mut score = 0.0;

        for part in table.table_name.split('_') {
            let part = part.to_ascii_lowercase();
            if part == "dim" || part == "fact" {
                continue;
            }
            if any_match(question_tokens, &part) {
                score += 2.0;
            }
        }

        for word in tokens(&table.table_description) {
            if any_match(question_tokens, &word) {
                score += 1.0;
            }
        }
        for word in tokens(&table.use_case) {
            if any_match(question_tokens, &word) {
                score += 1.0;
            }
        }

        score
    }

    fn related(model: &SemanticModel, a: &str, b: &str) -> bool {
        let direct = model
            .table(a)
            .map(|t| {
                t.relationships
                    .iter()
                    .any(|r| r.related_table.eq_ignore_ascii_case(b))
            })
            .unwrap_or(false);
        let reverse = model
            .table(b)
            .map(|t| {
                t.relationships
                    .iter()
                    .any(|r| r.related_table.eq_ignore_ascii_case(a))
            })
            .unwrap_or(false);
        direct || reverse
    }

    fn wants_all_rows(question: &str) -> bool {
        let q = question.to_ascii_lowercase();
        ["all rows", "all results", "all records", "everything", "without limit", "no limit"]
            .iter()
            .any(|phrase| q.contains(phrase))
    }

    fn aggregate_func(question: &str) -> Option<AggregateFunc> {
        let q = question.to_ascii_lowercase();
        if q.contains("how many") || q.contains("number of") || q.contains("count") {
            Some(AggregateFunc::Count)
        } else if q.contains("average") || q.contains("avg") || q.contains("mean") {
            Some(AggregateFunc::Avg)
        } else if q.contains("total") || q.contains("sum") || EXPLICIT_LIMIT.is_match(&q) {
            // A ranking question implies aggregating the measure.
            Some(AggregateFunc::Sum)
        } else {
            None
        }
    }

    fn is_numeric(data_type: &str) -> bool {
        let t = data_type.to_ascii_lowercase();
        NUMERIC_TYPES.iter().any(|n| t.starts_with(n))
    }

    /// Pick the measure column: a numeric, non-key column, preferring one
    /// whose name overlaps the question.
    fn measure_column(ctx: &PlanningContext, question_tokens: &[String]) -> Option<ColumnRef> {
        if ctx.tables.is_empty() {
            return None;
        }
        let mut fallback = None;
        // Non-primary tables first: measures live on the fact side.
        let ordered: Vec<&str> = ctx.tables[1..]
            .iter()
            .chain(ctx.tables.first())
            .map(|s| s.as_str())
            .collect();

        for table in ordered {
            let Some(schema) = ctx.schema(table) else { continue };
            for column in &schema.columns {
                if !Self::is_numeric(&column.data_type)
                    || column.name.to_ascii_lowercase().ends_with("_id")
                {
                    continue;
                }
                let named = column
                    .name
                    .split('_')
                    .any(|part| any_match(question_tokens, &part.to_ascii_lowercase()));
                if named {
                    return Some(ColumnRef::new(&schema.table_name, &column.name));
                }
                if fallback.is_none() {
                    fallback = Some(ColumnRef::new(&schema.table_name, &column.name));
                }
            }
        }
        fallback
    }

    /// Group keys from the primary table: its key column plus a readable
    /// name-ish column when one exists.
    fn group_columns(ctx: &PlanningContext) -> Vec<ColumnRef> {
        let Some(primary) = ctx.tables.first() else {
            return Vec::new();
        };
        let Some(schema) = ctx.schema(primary) else {
            return Vec::new();
        };

        let mut keys = Vec::new();
        if let Some(id) = schema
            .columns
            .iter()
            .find(|c| c.name.to_ascii_lowercase().ends_with("_id"))
        {
            keys.push(ColumnRef::new(&schema.table_name, &id.name));
        }
        if let Some(name) = schema
            .columns
            .iter()
            .find(|c| c.name.to_ascii_lowercase().contains("name"))
        {
            keys.push(ColumnRef::new(&schema.table_name, &name.name));
        }
        if keys.is_empty() {
            if let Some(first) = schema.columns.first() {
                keys.push(ColumnRef::new(&schema.table_name, &first.name));
            }
        }
        keys
    }

    fn plain_projection(ctx: &PlanningContext) -> Vec<ColumnRef> {
        let Some(primary) = ctx.tables.first() else {
            return Vec::new();
        };
        let Some(schema) = ctx.schema(primary) else {
            return Vec::new();
        };
        schema
            .columns
            .iter()
            .take(8)
            .map(|c| ColumnRef::new(&schema.table_name, &c.name))
            .collect()
    }
}

impl Default for KeywordPlanner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueryPlanner for KeywordPlanner {
    async fn identify_tables(&self, question: &str, model: &SemanticModel) -> Result<Vec<String>> {
        let question_tokens = tokens(question);

        let mut scored: Vec<(usize, f32)> = model
            .tables
            .iter()
            .enumerate()
            .map(|(i, table)| (i, Self::score_table(&question_tokens, table)))
            .filter(|(_, score)| *score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        // Walk the candidates best-first, keeping only tables the semantic
        // model connects to the selection; unrelated lookalikes drop out.
        let mut selected: Vec<String> = Vec::new();
        for (i, _) in scored {
            let name = model.tables[i].table_name.clone();
            if selected.is_empty()
                || selected.iter().any(|s| Self::related(model, s, &name))
            {
                selected.push(name);
            }
            if selected.len() == 3 {
                break;
            }
        }

        Ok(selected)
    }

    async fn build_plan(&self, ctx: &PlanningContext) -> Result<QueryPlan> {
        let question_tokens = tokens(&ctx.question);
        let all_rows = Self::wants_all_rows(&ctx.question);
        let row_limit = EXPLICIT_LIMIT
            .captures(&ctx.question)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u64>().ok());

        let mut plan = QueryPlan {
            tables: ctx.tables.clone(),
            row_limit,
            all_rows,
            ..Default::default()
        };

        match Self::aggregate_func(&ctx.question) {
            Some(func) => {
                let column = if func == AggregateFunc::Count {
                    None
                } else {
                    Self::measure_column(ctx, &question_tokens)
                };
                let alias = match &column {
                    Some(c) => format!("{}_{}", func.as_sql().to_ascii_lowercase(), c.column.to_ascii_lowercase()),
                    None => "row_count".to_string(),
                };
                plan.columns = Self::group_columns(ctx);
                plan.aggregates.push(Aggregate {
                    func,
                    column,
                    alias: alias.clone(),
                });
                let q = ctx.question.to_ascii_lowercase();
                let ascending = q.contains("lowest") || q.contains("bottom") || q.contains("ascending");
                plan.order_by.push(OrderBy {
                    key: OrderKey::Alias(alias),
                    descending: !ascending,
                });
            }
            None => {
                plan.columns = Self::plain_projection(ctx);
            }
        }

        Ok(plan)
    }

    async fn repair_plan(
        &self,
        ctx: &PlanningContext,
        _prior_sql: &str,
        error: &str,
    ) -> Result<QueryPlan> {
        let mut plan = self.build_plan(ctx).await?;

        // Drop whatever identifier the executor complained about; if that
        // changes nothing, fall back to the plainest possible statement.
        let error_lower = error.to_ascii_lowercase();
        let before = plan.clone();
        plan.columns
            .retain(|c| !error_lower.contains(&c.column.to_ascii_lowercase()));
        plan.aggregates.retain(|a| {
            a.column
                .as_ref()
                .map(|c| !error_lower.contains(&c.column.to_ascii_lowercase()))
                .unwrap_or(true)
        });
        let surviving = plan.aggregates.clone();
        plan.order_by.retain(|o| match &o.key {
            OrderKey::Alias(alias) => plan_has_alias(&surviving, alias),
            OrderKey::Column(c) => !error_lower.contains(&c.column.to_ascii_lowercase()),
        });

        if plan == before {
            plan = QueryPlan {
                tables: ctx.tables.first().cloned().into_iter().collect(),
                ..Default::default()
            };
        }
        Ok(plan)
    }
}

fn plan_has_alias(aggregates: &[Aggregate], alias: &str) -> bool {
    aggregates.iter().any(|a| a.alias == alias)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ColumnSchema, TableSchema};
    use std::collections::HashMap;

    const RETAIL: &str = include_str!("../../semantic_model.json");

    fn retail_model() -> SemanticModel {
        SemanticModel::from_str(RETAIL).unwrap()
    }

    fn schema(table: &str, columns: &[(&str, &str)]) -> TableSchema {
        TableSchema {
            table_name: table.to_string(),
            columns: columns
                .iter()
                .map(|(name, data_type)| ColumnSchema {
                    name: name.to_string(),
                    data_type: data_type.to_string(),
                    nullable: true,
                })
                .collect(),
        }
    }

    fn top_customers_context() -> PlanningContext {
        let mut schemas = HashMap::new();
        schemas.insert(
            "DIM_CUSTOMER".to_string(),
            schema(
                "DIM_CUSTOMER",
                &[("customer_id", "bigint"), ("customer_name", "text")],
            ),
        );
        schemas.insert(
            "FACT_SALES".to_string(),
            schema(
                "FACT_SALES",
                &[
                    ("sale_id", "bigint"),
                    ("customer_id", "bigint"),
                    ("total_amount", "numeric"),
                ],
            ),
        );
        PlanningContext {
            question: "Who are the top 5 customers by total purchase amount?".to_string(),
            tables: vec!["DIM_CUSTOMER".to_string(), "FACT_SALES".to_string()],
            snippets: Vec::new(),
            schemas,
            default_row_limit: 100,
        }
    }

    #[tokio::test]
    async fn test_identifies_customer_and_sales_tables() {
        let planner = KeywordPlanner::new();
        let tables = planner
            .identify_tables(
                "Who are the top 5 customers by total purchase amount?",
                &retail_model(),
            )
            .await
            .unwrap();

        assert_eq!(tables[0], "DIM_CUSTOMER");
        assert!(tables.contains(&"FACT_SALES".to_string()));
        // FACT_PURCHASE_ORDERS mentions "purchase" but has no declared
        // relationship to the customer dimension.
        assert!(!tables.contains(&"FACT_PURCHASE_ORDERS".to_string()));
    }

    #[tokio::test]
    async fn test_unrelated_question_identifies_nothing() {
        let planner = KeywordPlanner::new();
        let tables = planner
            .identify_tables("What is the meaning of life?", &retail_model())
            .await
            .unwrap();
        assert!(tables.is_empty());
    }

    #[tokio::test]
    async fn test_top_n_builds_ranked_aggregation() {
        let planner = KeywordPlanner::new();
        let plan = planner.build_plan(&top_customers_context()).await.unwrap();

        assert_eq!(plan.row_limit, Some(5));
        assert!(!plan.all_rows);
        assert_eq!(plan.aggregates.len(), 1);
        assert_eq!(plan.aggregates[0].func, AggregateFunc::Sum);
        assert_eq!(
            plan.aggregates[0].column,
            Some(ColumnRef::new("FACT_SALES", "total_amount"))
        );
        assert!(plan.columns.contains(&ColumnRef::new("DIM_CUSTOMER", "customer_id")));
        assert!(matches!(&plan.order_by[0].key, OrderKey::Alias(_)));
        assert!(plan.order_by[0].descending);
    }

    #[tokio::test]
    async fn test_all_rows_request_is_honored() {
        let mut ctx = top_customers_context();
        ctx.question = "Show me all rows from the customer table".to_string();
        ctx.tables = vec!["DIM_CUSTOMER".to_string()];

        let planner = KeywordPlanner::new();
        let plan = planner.build_plan(&ctx).await.unwrap();
        assert!(plan.all_rows);
        assert!(plan.aggregates.is_empty());
    }

    #[tokio::test]
    async fn test_repair_drops_offending_column() {
        let planner = KeywordPlanner::new();
        let ctx = top_customers_context();
        let plan = planner
            .repair_plan(&ctx, "SELECT ...", "column total_amount does not exist")
            .await
            .unwrap();

        assert!(plan.aggregates.is_empty());
        assert!(plan.order_by.is_empty());
    }
}

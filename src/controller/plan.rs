//! Structured query plans
//!
//! The language-understanding collaborator produces a `QueryPlan`; the
//! controller renders and validates it. Keeping the plan structured is
//! what lets row caps, quoting and grouping be enforced in code.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::knowledge::KnowledgeSnippet;
use crate::tools::TableSchema;

/// A table-qualified column reference
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table: &str, column: &str) -> Self {
        Self {
            table: table.to_string(),
            column: column.to_string(),
        }
    }
}

/// Aggregate functions the composer can render
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AggregateFunc {
    Sum,
    Count,
    Avg,
    Min,
    Max,
}

impl AggregateFunc {
    pub fn as_sql(&self) -> &'static str {
        match self {
            AggregateFunc::Sum => "SUM",
            AggregateFunc::Count => "COUNT",
            AggregateFunc::Avg => "AVG",
            AggregateFunc::Min => "MIN",
            AggregateFunc::Max => "MAX",
        }
    }
}

/// One aggregate projection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Aggregate {
    pub func: AggregateFunc,
    /// None renders COUNT(*)
    pub column: Option<ColumnRef>,
    pub alias: String,
}

/// Filter comparison operators
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
}

impl FilterOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Ne => "<>",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
            FilterOp::Like => "LIKE",
        }
    }

    /// Operators that silently drop null rows the analyst probably wanted
    pub fn needs_null_guard(&self) -> bool {
        matches!(self, FilterOp::Ne)
    }
}

/// One filter predicate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Filter {
    pub column: ColumnRef,
    pub op: FilterOp,
    pub value: serde_json::Value,
}

/// Sort key of an ORDER BY entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum OrderKey {
    /// An aggregate alias from the projection
    Alias(String),
    /// A plain column
    Column(ColumnRef),
}

/// One ORDER BY entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderBy {
    pub key: OrderKey,
    pub descending: bool,
}

/// A structured query plan
///
/// `tables[0]` is the primary table the FROM clause starts at. Grouping is
/// implied: when aggregates are present, every plain projection becomes a
/// GROUP BY key.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct QueryPlan {
    pub tables: Vec<String>,
    pub columns: Vec<ColumnRef>,
    pub aggregates: Vec<Aggregate>,
    pub filters: Vec<Filter>,
    pub order_by: Vec<OrderBy>,
    /// Explicit row limit, e.g. from "top 5"
    pub row_limit: Option<u64>,
    /// The user explicitly asked for the unbounded result set
    pub all_rows: bool,
}

impl QueryPlan {
    pub fn is_aggregation(&self) -> bool {
        !self.aggregates.is_empty()
    }

    pub fn involves_join(&self) -> bool {
        self.tables.len() > 1
    }
}

/// Everything the planner sees when building or repairing a plan
#[derive(Debug, Clone)]
pub struct PlanningContext {
    pub question: String,
    /// Candidate tables confirmed against the semantic model
    pub tables: Vec<String>,
    /// Retrieved rules and sample queries; rules are binding
    pub snippets: Vec<KnowledgeSnippet>,
    /// Described schemas keyed by upper-cased table name
    pub schemas: HashMap<String, TableSchema>,
    pub default_row_limit: u64,
}

impl PlanningContext {
    /// Described schema for a table, case-insensitively
    pub fn schema(&self, table: &str) -> Option<&TableSchema> {
        self.schemas.get(&table.to_ascii_uppercase())
    }

    /// The binding rules among the retrieved snippets
    pub fn rules(&self) -> impl Iterator<Item = &KnowledgeSnippet> {
        self.snippets.iter().filter(|s| s.is_rule())
    }
}

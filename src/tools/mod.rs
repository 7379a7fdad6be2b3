//! Tool contract module
//!
//! The operations the query controller may invoke against its
//! collaborators: describing warehouse tables, running read-only queries,
//! searching the knowledge base, and reading back the tool-call history.
//! Every invocation is a suspension point and is recorded on the session.

pub mod backend;
pub mod executor;
pub mod guards;

pub use backend::HttpWarehouse;
pub use executor::{ToolCallRecorder, WarehouseTools};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::knowledge::KnowledgeSnippet;
use crate::models::turn::ToolCall;

/// One column of a described table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnSchema {
    /// Column name in authoritative casing
    pub name: String,
    /// Warehouse data type
    pub data_type: String,
    /// Whether the column is nullable
    pub nullable: bool,
}

/// Described table schema
///
/// The authoritative source of identifier casing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableSchema {
    pub table_name: String,
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    /// Find a column case-insensitively
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// One result row, column name to value
pub type QueryRow = serde_json::Map<String, serde_json::Value>;

/// An executed query's ordered rows
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QueryResult {
    pub rows: Vec<QueryRow>,
}

impl QueryResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// SQL warehouse collaborator
///
/// Each `execute` is an atomic, already-completed read; nothing stays
/// pending past a cancelled turn.
#[async_trait]
pub trait SqlBackend: Send + Sync {
    async fn describe_table(&self, name: &str) -> Result<TableSchema>;
    async fn execute(&self, sql: &str) -> Result<Vec<QueryRow>>;
}

/// History collaborator backing `get_tool_call_history`
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// The `n` most recent persisted tool calls of the current session,
    /// most recent last.
    async fn recent_tool_calls(&self, n: usize) -> Result<Vec<ToolCall>>;
}

/// The tool contract consumed by the query controller
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Column schema of a table; `NotFound` for unknown tables.
    async fn describe_table(&self, name: &str) -> Result<TableSchema>;

    /// Execute a single read-only statement.
    ///
    /// Statements carrying data- or schema-modification verbs are rejected
    /// with `ForbiddenOperation` before submission. `row_limit` is the cap
    /// the caller already injected at composition time; it is recorded,
    /// not re-applied.
    async fn run_query(&self, sql: &str, row_limit: Option<u64>) -> Result<QueryResult>;

    /// Retrieve knowledge snippets for a table name or free-text topic.
    async fn search_knowledge_base(&self, topic: &str) -> Result<Vec<KnowledgeSnippet>>;

    /// The `n` most recent tool calls of the current session, most recent
    /// last, never crossing sessions.
    async fn get_tool_call_history(&self, n: usize) -> Result<Vec<ToolCall>>;
}

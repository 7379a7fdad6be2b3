//! Production tool executor
//!
//! Bridges the tool contract to the warehouse backend, the knowledge
//! index and the session history, recording every invocation.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::Result;
use crate::knowledge::KnowledgeIndex;
use crate::models::knowledge::KnowledgeSnippet;
use crate::models::turn::ToolCall;
use crate::tools::{guards, HistorySource, QueryResult, SqlBackend, TableSchema, ToolExecutor};

/// Shared, append-only record of the current turn's tool calls
#[derive(Clone, Default)]
pub struct ToolCallRecorder {
    calls: Arc<Mutex<Vec<ToolCall>>>,
}

impl ToolCallRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: ToolCall) {
        self.calls.lock().push(call);
    }

    /// Calls recorded so far, oldest first
    pub fn snapshot(&self) -> Vec<ToolCall> {
        self.calls.lock().clone()
    }

    /// Move all recorded calls out, e.g. into the finished turn
    pub fn drain(&self) -> Vec<ToolCall> {
        std::mem::take(&mut *self.calls.lock())
    }
}

/// Tool executor bound to one session
pub struct WarehouseTools {
    backend: Arc<dyn SqlBackend>,
    knowledge: Arc<dyn KnowledgeIndex>,
    history: Arc<dyn HistorySource>,
    recorder: ToolCallRecorder,
    top_k: usize,
}

impl WarehouseTools {
    pub fn new(
        backend: Arc<dyn SqlBackend>,
        knowledge: Arc<dyn KnowledgeIndex>,
        history: Arc<dyn HistorySource>,
        recorder: ToolCallRecorder,
        top_k: usize,
    ) -> Self {
        Self {
            backend,
            knowledge,
            history,
            recorder,
            top_k,
        }
    }

    fn record(&self, tool_name: &str, arguments: Vec<(String, String)>, summary: &str) {
        debug!(tool = tool_name, summary = summary, "tool call");
        self.recorder
            .record(ToolCall::new(tool_name, arguments, summary));
    }
}

#[async_trait]
impl ToolExecutor for WarehouseTools {
    async fn describe_table(&self, name: &str) -> Result<TableSchema> {
        let result = self.backend.describe_table(name).await;
        let summary = match &result {
            Ok(schema) => format!("{} columns", schema.columns.len()),
            Err(e) => format!("error: {}", e),
        };
        self.record(
            "describe_table",
            vec![("table".to_string(), name.to_string())],
            &summary,
        );
        result
    }

    async fn run_query(&self, sql: &str, row_limit: Option<u64>) -> Result<QueryResult> {
        let mut arguments = vec![("sql".to_string(), sql.to_string())];
        if let Some(limit) = row_limit {
            arguments.push(("row_limit".to_string(), limit.to_string()));
        }

        if let Err(e) = guards::assert_read_only(sql) {
            self.record("run_query", arguments, &format!("rejected: {}", e));
            return Err(e);
        }

        let result = self.backend.execute(sql).await;
        let summary = match &result {
            Ok(rows) => format!("{} rows", rows.len()),
            Err(e) => format!("error: {}", e),
        };
        self.record("run_query", arguments, &summary);

        result.map(|rows| QueryResult { rows })
    }

    async fn search_knowledge_base(&self, topic: &str) -> Result<Vec<KnowledgeSnippet>> {
        let result = self.knowledge.search(topic, self.top_k).await;
        let summary = match &result {
            Ok(snippets) => format!("{} snippets", snippets.len()),
            Err(e) => format!("error: {}", e),
        };
        self.record(
            "search_knowledge_base",
            vec![("topic".to_string(), topic.to_string())],
            &summary,
        );
        result
    }

    async fn get_tool_call_history(&self, n: usize) -> Result<Vec<ToolCall>> {
        // Persisted history first, then this turn's pending records;
        // the tail of the merge is the n most recent, most recent last.
        let persisted = self.history.recent_tool_calls(n).await?;
        let pending = self.recorder.snapshot();

        let mut merged = persisted;
        merged.extend(pending);
        let skip = merged.len().saturating_sub(n);
        let recent: Vec<ToolCall> = merged.into_iter().skip(skip).collect();

        self.record(
            "get_tool_call_history",
            vec![("num_calls".to_string(), n.to_string())],
            &format!("{} calls", recent.len()),
        );
        Ok(recent)
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message role within a turn
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User message
    User,
    /// Assistant response
    Assistant,
}

/// One named argument of a tool invocation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolArgument {
    pub name: String,
    pub value: String,
}

/// A recorded tool invocation
///
/// Append-only; the most recent records are recoverable for follow-up
/// repair via the tool-call history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Invoked tool name
    pub tool_name: String,
    /// Arguments in invocation order
    pub arguments: Vec<ToolArgument>,
    /// Condensed result or error text
    pub result_summary: String,
    /// Invocation time
    pub timestamp: DateTime<Utc>,
}

impl ToolCall {
    /// Record a tool invocation
    pub fn new(tool_name: &str, arguments: Vec<(String, String)>, result_summary: &str) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            arguments: arguments
                .into_iter()
                .map(|(name, value)| ToolArgument { name, value })
                .collect(),
            result_summary: result_summary.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// First argument value for a given name, if recorded
    pub fn argument(&self, name: &str) -> Option<&str> {
        self.arguments
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }
}

/// Conversation turn entity
///
/// One user message or one assistant response, with the tool calls the
/// assistant made while producing it. Turns form an append-only log
/// ordered by `turn_number`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Turn identifier
    pub id: String,
    /// Owning session
    pub session_id: String,
    /// Position in the session log
    pub turn_number: u64,
    /// Message role
    pub role: Role,
    /// Message content
    pub content: String,
    /// Tool calls made during this turn; empty for user turns
    pub tool_calls: Vec<ToolCall>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Turn {
    /// Create a user turn
    pub fn user(session_id: &str, turn_number: u64, content: &str) -> Self {
        Self::new(session_id, turn_number, Role::User, content)
    }

    /// Create an assistant turn
    pub fn assistant(session_id: &str, turn_number: u64, content: &str) -> Self {
        Self::new(session_id, turn_number, Role::Assistant, content)
    }

    fn new(session_id: &str, turn_number: u64, role: Role, content: &str) -> Self {
        Self {
            id: format!("turn_{}_{}", session_id, Uuid::new_v4()),
            session_id: session_id.to_string(),
            turn_number,
            role,
            content: content.to_string(),
            tool_calls: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Append a tool-call record
    pub fn record_tool_call(&mut self, call: ToolCall) {
        self.tool_calls.push(call);
    }
}

//! Chat DTOs

use serde::{Deserialize, Serialize};

use crate::controller::ChatEvent;

/// Inbound chat message
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Must be "user"
    pub role: String,
    /// The question text
    pub content: String,
    /// Owning user; defaults to "default"
    pub user_id: Option<String>,
    /// Model override in `provider:model` form
    pub model: Option<String>,
    /// Debug override
    pub debug: Option<bool>,
}

/// One tool-call notification on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallEventDto {
    pub tool_name: String,
    pub summary: String,
}

/// One element of the chat stream
///
/// Carries a content delta, tool-call events, or only the terminal
/// marker on the closing element. Consumers apply elements in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatStreamEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_delta: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tool_call_events: Vec<ToolCallEventDto>,
    pub terminal: bool,
}

impl From<ChatEvent> for ChatStreamEvent {
    fn from(event: ChatEvent) -> Self {
        match event {
            ChatEvent::ContentDelta { content } => Self {
                content_delta: Some(content),
                tool_call_events: Vec::new(),
                terminal: false,
            },
            ChatEvent::ToolCall { tool_name, summary } => Self {
                content_delta: None,
                tool_call_events: vec![ToolCallEventDto { tool_name, summary }],
                terminal: false,
            },
            ChatEvent::Terminal => Self {
                content_delta: None,
                tool_call_events: Vec::new(),
                terminal: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_mapping() {
        let delta: ChatStreamEvent = ChatEvent::ContentDelta {
            content: "hello".into(),
        }
        .into();
        assert_eq!(delta.content_delta.as_deref(), Some("hello"));
        assert!(!delta.terminal);

        let call: ChatStreamEvent = ChatEvent::ToolCall {
            tool_name: "run_query".into(),
            summary: "5 rows".into(),
        }
        .into();
        assert_eq!(call.tool_call_events.len(), 1);

        let terminal: ChatStreamEvent = ChatEvent::Terminal.into();
        assert!(terminal.terminal);
        assert!(terminal.content_delta.is_none());
        assert!(terminal.tool_call_events.is_empty());
    }
}

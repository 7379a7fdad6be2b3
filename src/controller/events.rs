//! Chat event stream
//!
//! Ordered events emitted while a turn is processed: content deltas and
//! tool-call notifications, closed by a terminal marker. Consumers apply
//! them in emission order.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// One event of the response stream
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A chunk of answer text
    ContentDelta { content: String },
    /// A tool invocation notification
    ToolCall { tool_name: String, summary: String },
    /// End of turn
    Terminal,
}

/// Sending half of a turn's event stream
///
/// A dropped receiver means the caller abandoned the turn; sends become
/// no-ops and the controller runs to completion, leaving only recorded
/// tool calls behind.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<ChatEvent>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<ChatEvent>) -> Self {
        Self { tx }
    }

    /// A sink with a detached receiver, for callers that only want the
    /// final outcome.
    pub fn detached() -> Self {
        let (tx, _rx) = mpsc::channel(1);
        Self { tx }
    }

    pub async fn content(&self, content: &str) {
        let _ = self
            .tx
            .send(ChatEvent::ContentDelta {
                content: content.to_string(),
            })
            .await;
    }

    pub async fn tool_call(&self, tool_name: &str, summary: &str) {
        let _ = self
            .tx
            .send(ChatEvent::ToolCall {
                tool_name: tool_name.to_string(),
                summary: summary.to_string(),
            })
            .await;
    }

    pub async fn terminal(&self) {
        let _ = self.tx.send(ChatEvent::Terminal).await;
    }
}

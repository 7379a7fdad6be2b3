//! Session DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::session::{Session, SessionSummary};
use crate::models::turn::{Role, ToolCall, Turn};

/// Session detail response
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub model_id: String,
    pub debug: bool,
    pub turn_count: u64,
}

impl From<Session> for SessionResponse {
    fn from(s: Session) -> Self {
        Self {
            id: s.id,
            user_id: s.user_id,
            name: s.name,
            created_at: s.created_at,
            last_active_at: s.last_active_at,
            model_id: s.model_id,
            debug: s.debug,
            turn_count: s.turn_count,
        }
    }
}

/// Session listing response
#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionSummary>,
}

/// Listing query parameters
#[derive(Debug, Deserialize)]
pub struct ListSessionsParams {
    pub user_id: Option<String>,
}

/// Rename request
#[derive(Debug, Deserialize)]
pub struct RenameSessionRequest {
    pub name: String,
}

/// One turn of the conversation history
#[derive(Debug, Serialize)]
pub struct TurnResponse {
    pub turn_number: u64,
    pub role: Role,
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub created_at: DateTime<Utc>,
}

impl From<Turn> for TurnResponse {
    fn from(t: Turn) -> Self {
        Self {
            turn_number: t.turn_number,
            role: t.role,
            content: t.content,
            tool_calls: t.tool_calls,
            created_at: t.created_at,
        }
    }
}

/// Tool-call history query parameters
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub n: Option<usize>,
}

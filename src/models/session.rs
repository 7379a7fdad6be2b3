use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session entity
///
/// Root of a conversation: owns its turns (stored separately, ordered by
/// turn number) and carries the model selection and debug flag in effect.
/// Sessions are never deleted by this service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session identifier
    pub id: String,

    /// Owning user
    pub user_id: String,

    /// Display name, user-renameable
    pub name: String,

    /// Creation time
    pub created_at: DateTime<Utc>,

    /// Last activity time
    pub last_active_at: DateTime<Utc>,

    /// Current model identifier in `provider:model` form
    pub model_id: String,

    /// Debug mode
    pub debug: bool,

    /// Number of turns appended so far
    pub turn_count: u64,
}

impl Session {
    /// Create a new session
    pub fn new(user_id: &str, model_id: &str, debug: bool) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: "New analysis".to_string(),
            created_at: now,
            last_active_at: now,
            model_id: model_id.to_string(),
            debug,
            turn_count: 0,
        }
    }

    /// Create a session with a caller-chosen identifier
    pub fn with_id(id: &str, user_id: &str, model_id: &str, debug: bool) -> Self {
        Self {
            id: id.to_string(),
            ..Self::new(user_id, model_id, debug)
        }
    }

    /// Update the last-activity time
    pub fn touch(&mut self) {
        self.last_active_at = Utc::now();
    }

    /// Whether the stored configuration matches the requested one
    pub fn matches_config(&self, model_id: &str, debug: bool) -> bool {
        self.model_id == model_id && self.debug == debug
    }
}

/// Condensed session listing entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub turn_count: u64,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            name: session.name.clone(),
            created_at: session.created_at,
            last_active_at: session.last_active_at,
            turn_count: session.turn_count,
        }
    }
}

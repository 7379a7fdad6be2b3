//! Session service
//!
//! Session lifecycle and the append-only turn log. Appends are serialized
//! per session so two turns of the same session can never interleave;
//! independent sessions proceed concurrently.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::{AppError, Result};
use crate::models::session::{Session, SessionSummary};
use crate::models::turn::{ToolCall, Turn};
use crate::storage::repository::Repository;

const TURN_PAGE: usize = 1000;

/// Session service trait
#[async_trait]
pub trait SessionService: Send + Sync {
    /// Load a session by id, or create it.
    ///
    /// Idempotent: an existing id with unchanged model/debug configuration
    /// returns the stored session untouched; a configuration change is
    /// applied in place rather than forking a new session.
    async fn load_or_create(
        &self,
        session_id: Option<&str>,
        user_id: &str,
        model_id: &str,
        debug: bool,
    ) -> Result<Session>;

    /// Fetch a session by id
    async fn get_by_id(&self, id: &str) -> Result<Option<Session>>;

    /// Append a turn to the session log.
    ///
    /// The turn number is assigned here, under the session lock.
    async fn append_turn(&self, session_id: &str, turn: Turn) -> Result<Turn>;

    /// Rename a session
    async fn rename(&self, session_id: &str, new_name: &str) -> Result<Session>;

    /// Session summaries of one user, most recently active first
    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionSummary>>;

    /// Turns of a session in log order
    async fn turns(&self, session_id: &str, limit: usize, offset: usize) -> Result<Vec<Turn>>;

    /// The n most recent tool calls of a session, most recent last
    async fn tool_call_history(&self, session_id: &str, n: usize) -> Result<Vec<ToolCall>>;
}

/// Session service implementation
pub struct SessionServiceImpl {
    sessions: Arc<dyn Repository<Session>>,
    turns: Arc<dyn Repository<Turn>>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SessionServiceImpl {
    pub fn new(sessions: Arc<dyn Repository<Session>>, turns: Arc<dyn Repository<Turn>>) -> Self {
        Self {
            sessions,
            turns,
            locks: DashMap::new(),
        }
    }

    fn session_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // A turn that cannot be durably recorded is fatal for the interaction.
    fn fatal(e: AppError) -> AppError {
        match e {
            AppError::Database(m) => AppError::SessionUnavailable(m),
            other => other,
        }
    }
}

#[async_trait]
impl SessionService for SessionServiceImpl {
    async fn load_or_create(
        &self,
        session_id: Option<&str>,
        user_id: &str,
        model_id: &str,
        debug: bool,
    ) -> Result<Session> {
        if let Some(id) = session_id {
            if let Some(mut existing) = self.sessions.get_by_id(id).await.map_err(Self::fatal)? {
                if existing.matches_config(model_id, debug) {
                    return Ok(existing);
                }
                info!(session = id, model = model_id, "session configuration changed");
                existing.model_id = model_id.to_string();
                existing.debug = debug;
                existing.touch();
                self.sessions
                    .update(id, &existing)
                    .await
                    .map_err(Self::fatal)?;
                return Ok(existing);
            }

            let session = Session::with_id(id, user_id, model_id, debug);
            return self.sessions.create(&session).await.map_err(Self::fatal);
        }

        let session = Session::new(user_id, model_id, debug);
        self.sessions.create(&session).await.map_err(Self::fatal)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Session>> {
        self.sessions.get_by_id(id).await.map_err(Self::fatal)
    }

    async fn append_turn(&self, session_id: &str, mut turn: Turn) -> Result<Turn> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;

        let mut session = self
            .sessions
            .get_by_id(session_id)
            .await
            .map_err(Self::fatal)?
            .ok_or_else(|| AppError::NotFound(format!("session not found: {}", session_id)))?;

        let next = self
            .turns
            .max_turn_number(session_id)
            .await
            .map_err(Self::fatal)?
            + 1;
        turn.session_id = session_id.to_string();
        turn.turn_number = next;

        let created = self.turns.create(&turn).await.map_err(Self::fatal)?;

        session.turn_count = next;
        session.touch();
        self.sessions
            .update(session_id, &session)
            .await
            .map_err(Self::fatal)?;

        Ok(created)
    }

    async fn rename(&self, session_id: &str, new_name: &str) -> Result<Session> {
        let mut session = self
            .sessions
            .get_by_id(session_id)
            .await
            .map_err(Self::fatal)?
            .ok_or_else(|| AppError::NotFound(format!("session not found: {}", session_id)))?;

        session.name = new_name.to_string();
        session.touch();
        self.sessions
            .update(session_id, &session)
            .await
            .map_err(Self::fatal)?;
        Ok(session)
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionSummary>> {
        let sessions = self
            .sessions
            .list_by_user(user_id, TURN_PAGE, 0)
            .await
            .map_err(Self::fatal)?;
        Ok(sessions.iter().map(SessionSummary::from).collect())
    }

    async fn turns(&self, session_id: &str, limit: usize, offset: usize) -> Result<Vec<Turn>> {
        self.turns
            .list_by_session(session_id, limit, offset)
            .await
            .map_err(Self::fatal)
    }

    async fn tool_call_history(&self, session_id: &str, n: usize) -> Result<Vec<ToolCall>> {
        let turns = self
            .turns
            .list_by_session(session_id, TURN_PAGE, 0)
            .await
            .map_err(Self::fatal)?;

        let all: Vec<ToolCall> = turns.into_iter().flat_map(|t| t.tool_calls).collect();
        let skip = all.len().saturating_sub(n);
        Ok(all.into_iter().skip(skip).collect())
    }
}

/// Create the session service
pub fn create_session_service(
    sessions: Arc<dyn Repository<Session>>,
    turns: Arc<dyn Repository<Turn>>,
) -> Arc<dyn SessionService> {
    Arc::new(SessionServiceImpl::new(sessions, turns))
}

/// Session-scoped history adapter for the tool contract
pub struct SessionHistory {
    service: Arc<dyn SessionService>,
    session_id: String,
}

impl SessionHistory {
    pub fn new(service: Arc<dyn SessionService>, session_id: &str) -> Self {
        Self {
            service,
            session_id: session_id.to_string(),
        }
    }
}

#[async_trait]
impl crate::tools::HistorySource for SessionHistory {
    async fn recent_tool_calls(&self, n: usize) -> Result<Vec<ToolCall>> {
        self.service.tool_call_history(&self.session_id, n).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::turn::ToolCall;
    use crate::storage::memory::{MemorySessionRepository, MemoryTurnRepository};

    fn service() -> Arc<dyn SessionService> {
        create_session_service(
            Arc::new(MemorySessionRepository::new()),
            Arc::new(MemoryTurnRepository::new()),
        )
    }

    #[tokio::test]
    async fn test_load_or_create_is_idempotent() {
        let service = service();

        let first = service
            .load_or_create(Some("s1"), "analyst", "openai:gpt-4o-mini", false)
            .await
            .unwrap();
        let second = service
            .load_or_create(Some("s1"), "analyst", "openai:gpt-4o-mini", false)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.created_at, second.created_at);
    }

    #[tokio::test]
    async fn test_config_change_updates_in_place() {
        let service = service();

        service
            .load_or_create(Some("s1"), "analyst", "openai:gpt-4o-mini", false)
            .await
            .unwrap();
        let switched = service
            .load_or_create(Some("s1"), "analyst", "anthropic:claude-sonnet", true)
            .await
            .unwrap();

        assert_eq!(switched.id, "s1");
        assert_eq!(switched.model_id, "anthropic:claude-sonnet");
        assert!(switched.debug);
    }

    #[tokio::test]
    async fn test_append_assigns_sequential_turn_numbers() {
        let service = service();
        service
            .load_or_create(Some("s1"), "analyst", "openai:gpt-4o-mini", false)
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service
                    .append_turn("s1", Turn::user("s1", 0, &format!("question {}", i)))
                    .await
                    .unwrap()
            }));
        }

        let mut numbers: Vec<u64> = Vec::new();
        for handle in handles {
            numbers.push(handle.await.unwrap().turn_number);
        }
        numbers.sort();
        assert_eq!(numbers, (1..=8).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn test_tool_call_history_is_session_scoped() {
        let service = service();
        for sid in ["s1", "s2"] {
            service
                .load_or_create(Some(sid), "analyst", "openai:gpt-4o-mini", false)
                .await
                .unwrap();
        }

        let mut turn = Turn::assistant("s1", 0, "answer");
        turn.record_tool_call(ToolCall::new("describe_table", vec![], "8 columns"));
        turn.record_tool_call(ToolCall::new("run_query", vec![], "5 rows"));
        service.append_turn("s1", turn).await.unwrap();

        let mut other = Turn::assistant("s2", 0, "other answer");
        other.record_tool_call(ToolCall::new("search_knowledge_base", vec![], "2 snippets"));
        service.append_turn("s2", other).await.unwrap();

        let history = service.tool_call_history("s1", 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|c| c.tool_name != "search_knowledge_base"));

        // Most recent last, bounded by n.
        let last = service.tool_call_history("s1", 1).await.unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].tool_name, "run_query");
    }

    #[tokio::test]
    async fn test_rename() {
        let service = service();
        service
            .load_or_create(Some("s1"), "analyst", "openai:gpt-4o-mini", false)
            .await
            .unwrap();

        let renamed = service.rename("s1", "Store margins").await.unwrap();
        assert_eq!(renamed.name, "Store margins");

        let err = service.rename("missing", "x").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}

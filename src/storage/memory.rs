//! In-memory repositories
//!
//! Backing store for tests and hermetic runs. Same contract as the
//! durable backend, state lives in process memory only.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::Result;
use crate::models::session::Session;
use crate::models::turn::Turn;
use crate::storage::repository::Repository;

/// In-memory session repository
#[derive(Default)]
pub struct MemorySessionRepository {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository<Session> for MemorySessionRepository {
    async fn create(&self, session: &Session) -> Result<Session> {
        self.sessions
            .write()
            .insert(session.id.clone(), session.clone());
        Ok(session.clone())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.read().get(id).cloned())
    }

    async fn update(&self, id: &str, session: &Session) -> Result<Option<Session>> {
        let mut sessions = self.sessions.write();
        if !sessions.contains_key(id) {
            return Ok(None);
        }
        sessions.insert(id.to_string(), session.clone());
        Ok(Some(session.clone()))
    }

    async fn list(&self, limit: usize, start: usize) -> Result<Vec<Session>> {
        let mut all: Vec<Session> = self.sessions.read().values().cloned().collect();
        all.sort_by(|a, b| b.last_active_at.cmp(&a.last_active_at));
        Ok(all.into_iter().skip(start).take(limit).collect())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.sessions.read().len() as u64)
    }

    async fn list_by_user(&self, user_id: &str, limit: usize, start: usize) -> Result<Vec<Session>> {
        let mut mine: Vec<Session> = self
            .sessions
            .read()
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.last_active_at.cmp(&a.last_active_at));
        Ok(mine.into_iter().skip(start).take(limit).collect())
    }
}

/// In-memory turn repository
#[derive(Default)]
pub struct MemoryTurnRepository {
    turns: RwLock<Vec<Turn>>,
}

impl MemoryTurnRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository<Turn> for MemoryTurnRepository {
    async fn create(&self, turn: &Turn) -> Result<Turn> {
        self.turns.write().push(turn.clone());
        Ok(turn.clone())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Turn>> {
        Ok(self.turns.read().iter().find(|t| t.id == id).cloned())
    }

    async fn update(&self, id: &str, turn: &Turn) -> Result<Option<Turn>> {
        let mut turns = self.turns.write();
        match turns.iter_mut().find(|t| t.id == id) {
            Some(slot) => {
                *slot = turn.clone();
                Ok(Some(turn.clone()))
            }
            None => Ok(None),
        }
    }

    async fn list(&self, limit: usize, start: usize) -> Result<Vec<Turn>> {
        Ok(self
            .turns
            .read()
            .iter()
            .skip(start)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.turns.read().len() as u64)
    }

    async fn list_by_session(
        &self,
        session_id: &str,
        limit: usize,
        start: usize,
    ) -> Result<Vec<Turn>> {
        let mut mine: Vec<Turn> = self
            .turns
            .read()
            .iter()
            .filter(|t| t.session_id == session_id)
            .cloned()
            .collect();
        mine.sort_by_key(|t| t.turn_number);
        Ok(mine.into_iter().skip(start).take(limit).collect())
    }

    async fn count_by_session(&self, session_id: &str) -> Result<u64> {
        Ok(self
            .turns
            .read()
            .iter()
            .filter(|t| t.session_id == session_id)
            .count() as u64)
    }

    async fn max_turn_number(&self, session_id: &str) -> Result<u64> {
        Ok(self
            .turns
            .read()
            .iter()
            .filter(|t| t.session_id == session_id)
            .map(|t| t.turn_number)
            .max()
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_session_round_trip() {
        let repo = MemorySessionRepository::new();
        let session = Session::with_id("s1", "analyst", "openai:gpt-4o-mini", false);

        repo.create(&session).await.unwrap();
        let loaded = repo.get_by_id("s1").await.unwrap().unwrap();
        assert_eq!(loaded.user_id, "analyst");

        assert!(repo.get_by_id("unknown").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_turns_list_in_turn_number_order() {
        let repo = MemoryTurnRepository::new();
        repo.create(&Turn::user("s1", 2, "second")).await.unwrap();
        repo.create(&Turn::user("s1", 1, "first")).await.unwrap();
        repo.create(&Turn::user("other", 1, "elsewhere")).await.unwrap();

        let turns = repo.list_by_session("s1", 100, 0).await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].content, "first");
        assert_eq!(turns[1].content, "second");

        assert_eq!(repo.max_turn_number("s1").await.unwrap(), 2);
        assert_eq!(repo.max_turn_number("empty").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_by_user_filters() {
        let repo = MemorySessionRepository::new();
        repo.create(&Session::with_id("a", "alice", "openai:gpt-4o-mini", false))
            .await
            .unwrap();
        repo.create(&Session::with_id("b", "bob", "openai:gpt-4o-mini", false))
            .await
            .unwrap();

        let sessions = repo.list_by_user("alice", 10, 0).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, "a");
    }
}

//! Repository contract
//!
//! Generic async CRUD over stored entities, with session- and user-scoped
//! listing for the entities that need it. Deletion is deliberately absent:
//! sessions and turns form an append-only history.

use async_trait::async_trait;

use crate::error::Result;

/// Repository trait
#[async_trait]
pub trait Repository<T: Clone + Send + Sync>: Send + Sync {
    /// Create an entity
    async fn create(&self, entity: &T) -> Result<T>;

    /// Fetch an entity by id
    async fn get_by_id(&self, id: &str) -> Result<Option<T>>;

    /// Update an entity in place
    async fn update(&self, id: &str, entity: &T) -> Result<Option<T>>;

    /// List entities, newest first
    async fn list(&self, limit: usize, start: usize) -> Result<Vec<T>>;

    /// Count all entities
    async fn count(&self) -> Result<u64>;

    // === user-scoped methods (sessions) ===

    async fn list_by_user(&self, _user_id: &str, limit: usize, start: usize) -> Result<Vec<T>> {
        self.list(limit, start).await
    }

    // === session-scoped methods (turns) ===

    /// List entities of one session ordered by turn number
    async fn list_by_session(
        &self,
        _session_id: &str,
        _limit: usize,
        _start: usize,
    ) -> Result<Vec<T>> {
        Ok(vec![])
    }

    /// Count entities of one session
    async fn count_by_session(&self, _session_id: &str) -> Result<u64> {
        Ok(0)
    }

    /// Highest turn number recorded for one session, 0 when empty
    async fn max_turn_number(&self, _session_id: &str) -> Result<u64> {
        Ok(0)
    }
}

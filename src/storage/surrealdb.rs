//! SurrealDB storage backend
//!
//! Connection pool plus session/turn repositories. Entities are stored
//! under a `data` envelope so the application identifier stays a plain
//! string independent of the record id.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use surrealdb::{
    Surreal,
    engine::any::{Any, connect},
    opt::auth::Root,
};
use tokio::sync::Mutex;

use crate::config::config::DatabaseConfig;
use crate::error::{AppError, Result};
use crate::models::session::Session;
use crate::models::turn::Turn;
use crate::storage::repository::Repository;

/// SurrealDB connection pool
#[derive(Clone)]
pub struct SurrealPool {
    db: Arc<Mutex<Option<Surreal<Any>>>>,
    config: DatabaseConfig,
}

impl SurrealPool {
    /// Connect and authenticate
    pub async fn new(config: DatabaseConfig) -> Result<Self> {
        let db: Surreal<Any> = connect(&config.url).await?;

        db.signin(Root {
            username: &config.username,
            password: &config.password,
        })
        .await?;

        db.use_ns(&config.namespace).use_db(&config.database).await?;

        Ok(Self {
            db: Arc::new(Mutex::new(Some(db))),
            config,
        })
    }

    /// The inner database handle
    pub async fn inner(&self) -> Result<Surreal<Any>> {
        let guard = self.db.lock().await;
        guard
            .as_ref()
            .cloned()
            .ok_or_else(|| AppError::SessionUnavailable("database connection closed".into()))
    }

    /// Connection configuration
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Close the connection
    pub async fn close(&self) {
        let mut guard = self.db.lock().await;
        *guard = None;
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    data: T,
}

async fn upsert<T: Serialize + 'static>(
    db: &Surreal<Any>,
    table: &'static str,
    id: &str,
    entity: &T,
) -> Result<()> {
    let data = serde_json::to_value(entity)?;
    db.query("UPSERT type::thing($table, $id) SET data = $data RETURN NONE")
        .bind(("table", table))
        .bind(("id", id.to_string()))
        .bind(("data", data))
        .await?;
    Ok(())
}

async fn fetch<T: DeserializeOwned>(
    db: &Surreal<Any>,
    table: &'static str,
    id: &str,
) -> Result<Option<T>> {
    let mut response = db
        .query("SELECT data FROM type::thing($table, $id)")
        .bind(("table", table))
        .bind(("id", id.to_string()))
        .await?;
    let rows: Vec<Envelope<T>> = response.take(0)?;
    Ok(rows.into_iter().next().map(|e| e.data))
}

/// Session repository on SurrealDB
#[derive(Clone)]
pub struct SurrealSessionRepository {
    pool: SurrealPool,
}

impl SurrealSessionRepository {
    pub fn new(pool: SurrealPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository<Session> for SurrealSessionRepository {
    async fn create(&self, session: &Session) -> Result<Session> {
        let db = self.pool.inner().await?;
        upsert(&db, "session", &session.id, session).await?;
        Ok(session.clone())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Session>> {
        let db = self.pool.inner().await?;
        fetch(&db, "session", id).await
    }

    async fn update(&self, id: &str, session: &Session) -> Result<Option<Session>> {
        let db = self.pool.inner().await?;
        if fetch::<Session>(&db, "session", id).await?.is_none() {
            return Ok(None);
        }
        upsert(&db, "session", id, session).await?;
        Ok(Some(session.clone()))
    }

    async fn list(&self, limit: usize, start: usize) -> Result<Vec<Session>> {
        let db = self.pool.inner().await?;
        let mut response = db
            .query("SELECT data FROM session ORDER BY data.last_active_at DESC LIMIT $limit START $start")
            .bind(("limit", limit))
            .bind(("start", start))
            .await?;
        let rows: Vec<Envelope<Session>> = response.take(0)?;
        Ok(rows.into_iter().map(|e| e.data).collect())
    }

    async fn count(&self) -> Result<u64> {
        let db = self.pool.inner().await?;
        let mut response = db.query("SELECT count() FROM session GROUP ALL").await?;
        let rows: Vec<serde_json::Value> = response.take(0)?;
        Ok(rows
            .first()
            .and_then(|v| v.get("count"))
            .and_then(|c| c.as_u64())
            .unwrap_or(0))
    }

    async fn list_by_user(&self, user_id: &str, limit: usize, start: usize) -> Result<Vec<Session>> {
        let db = self.pool.inner().await?;
        let mut response = db
            .query(
                "SELECT data FROM session \
                 WHERE data.user_id = $user_id \
                 ORDER BY data.last_active_at DESC \
                 LIMIT $limit START $start",
            )
            .bind(("user_id", user_id.to_string()))
            .bind(("limit", limit))
            .bind(("start", start))
            .await?;
        let rows: Vec<Envelope<Session>> = response.take(0)?;
        Ok(rows.into_iter().map(|e| e.data).collect())
    }
}

/// Turn repository on SurrealDB
#[derive(Clone)]
pub struct SurrealTurnRepository {
    pool: SurrealPool,
}

impl SurrealTurnRepository {
    pub fn new(pool: SurrealPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository<Turn> for SurrealTurnRepository {
    async fn create(&self, turn: &Turn) -> Result<Turn> {
        let db = self.pool.inner().await?;
        upsert(&db, "turn", &turn.id, turn).await?;
        Ok(turn.clone())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Turn>> {
        let db = self.pool.inner().await?;
        fetch(&db, "turn", id).await
    }

    async fn update(&self, id: &str, turn: &Turn) -> Result<Option<Turn>> {
        let db = self.pool.inner().await?;
        if fetch::<Turn>(&db, "turn", id).await?.is_none() {
            return Ok(None);
        }
        upsert(&db, "turn", id, turn).await?;
        Ok(Some(turn.clone()))
    }

    async fn list(&self, limit: usize, start: usize) -> Result<Vec<Turn>> {
        let db = self.pool.inner().await?;
        let mut response = db
            .query("SELECT data FROM turn ORDER BY data.created_at DESC LIMIT $limit START $start")
            .bind(("limit", limit))
            .bind(("start", start))
            .await?;
        let rows: Vec<Envelope<Turn>> = response.take(0)?;
        Ok(rows.into_iter().map(|e| e.data).collect())
    }

    async fn count(&self) -> Result<u64> {
        let db = self.pool.inner().await?;
        let mut response = db.query("SELECT count() FROM turn GROUP ALL").await?;
        let rows: Vec<serde_json::Value> = response.take(0)?;
        Ok(rows
            .first()
            .and_then(|v| v.get("count"))
            .and_then(|c| c.as_u64())
            .unwrap_or(0))
    }

    async fn list_by_session(
        &self,
        session_id: &str,
        limit: usize,
        start: usize,
    ) -> Result<Vec<Turn>> {
        let db = self.pool.inner().await?;
        let mut response = db
            .query(
                "SELECT data FROM turn \
                 WHERE data.session_id = $session_id \
                 ORDER BY data.turn_number ASC \
                 LIMIT $limit START $start",
            )
            .bind(("session_id", session_id.to_string()))
            .bind(("limit", limit))
            .bind(("start", start))
            .await?;
        let rows: Vec<Envelope<Turn>> = response.take(0)?;
        Ok(rows.into_iter().map(|e| e.data).collect())
    }

    async fn count_by_session(&self, session_id: &str) -> Result<u64> {
        let db = self.pool.inner().await?;
        let mut response = db
            .query("SELECT count() FROM turn WHERE data.session_id = $session_id GROUP ALL")
            .bind(("session_id", session_id.to_string()))
            .await?;
        let rows: Vec<serde_json::Value> = response.take(0)?;
        Ok(rows
            .first()
            .and_then(|v| v.get("count"))
            .and_then(|c| c.as_u64())
            .unwrap_or(0))
    }

    async fn max_turn_number(&self, session_id: &str) -> Result<u64> {
        let db = self.pool.inner().await?;
        let mut response = db
            .query(
                "SELECT data FROM turn \
                 WHERE data.session_id = $session_id \
                 ORDER BY data.turn_number DESC \
                 LIMIT 1",
            )
            .bind(("session_id", session_id.to_string()))
            .await?;
        let rows: Vec<Envelope<Turn>> = response.take(0)?;
        Ok(rows.first().map(|e| e.data.turn_number).unwrap_or(0))
    }
}

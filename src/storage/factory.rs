//! Storage factory module
//!
//! Creates the repository pair for the configured backend.

use std::sync::Arc;

use tracing::info;

use crate::config::config::DatabaseConfig;
use crate::error::{AppError, Result};
use crate::models::session::Session;
use crate::models::turn::Turn;
use crate::storage::memory::{MemorySessionRepository, MemoryTurnRepository};
use crate::storage::repository::Repository;

#[cfg(feature = "surrealdb")]
use crate::storage::surrealdb::{SurrealPool, SurrealSessionRepository, SurrealTurnRepository};

/// The repository pair the session service runs on
pub struct StorageHandles {
    pub sessions: Arc<dyn Repository<Session>>,
    pub turns: Arc<dyn Repository<Turn>>,
}

/// Storage factory
pub struct StorageFactory;

impl StorageFactory {
    /// Create repositories for the configured backend
    pub async fn create(config: &DatabaseConfig) -> Result<StorageHandles> {
        match config.backend.as_str() {
            "memory" => {
                info!("using in-memory session store");
                Ok(StorageHandles {
                    sessions: Arc::new(MemorySessionRepository::new()),
                    turns: Arc::new(MemoryTurnRepository::new()),
                })
            }
            #[cfg(feature = "surrealdb")]
            "surrealdb" => {
                let pool = SurrealPool::new(config.clone()).await?;
                info!("connected session store at {}", config.url);
                Ok(StorageHandles {
                    sessions: Arc::new(SurrealSessionRepository::new(pool.clone())),
                    turns: Arc::new(SurrealTurnRepository::new(pool)),
                })
            }
            #[cfg(not(feature = "surrealdb"))]
            "surrealdb" => Err(AppError::Config(
                "surrealdb backend requested but the 'surrealdb' feature is not enabled".into(),
            )),
            other => Err(AppError::Config(format!(
                "unknown storage backend: {}",
                other
            ))),
        }
    }
}

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Request timeout in seconds
    pub request_timeout: u64,
    /// Maximum request body size in bytes
    pub max_request_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            request_timeout: 30,
            max_request_size: 10 * 1024 * 1024,
        }
    }
}

/// Session store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Storage backend: "surrealdb" or "memory"
    pub backend: String,
    /// SurrealDB connection address
    pub url: String,
    /// Namespace
    pub namespace: String,
    /// Database name
    pub database: String,
    /// Username
    pub username: String,
    /// Password
    pub password: String,
    /// Connection timeout in seconds
    pub connection_timeout: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: "memory".into(),
            url: "ws://localhost:8000".into(),
            namespace: "retailiq".into(),
            database: "sessions".into(),
            username: "root".into(),
            password: "root".into(),
            connection_timeout: 30,
        }
    }
}

/// Warehouse gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    /// SQL gateway base URL
    pub url: String,
    /// Request timeout in seconds
    pub timeout: u64,
    /// Directory holding the CSV extracts for bulk loads
    pub data_dir: PathBuf,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:7070".into(),
            timeout: 60,
            data_dir: PathBuf::from("data"),
        }
    }
}

/// Knowledge retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Directory holding table rules and sample queries
    pub knowledge_dir: PathBuf,
    /// Snippets returned per search
    pub top_k: usize,
    /// Embedding backend: "remote" or "simple"
    pub backend: String,
    /// Remote embedding server address
    pub remote_url: String,
    /// Remote embedding model name
    pub model_name: String,
    /// Embedding dimension
    pub dimension: usize,
    /// Remote request timeout in seconds
    pub timeout: u64,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            knowledge_dir: PathBuf::from("knowledge"),
            top_k: 5,
            backend: "simple".into(),
            remote_url: "http://localhost:11434".into(),
            model_name: "nomic-embed-text".into(),
            dimension: 384,
            timeout: 60,
        }
    }
}

/// Model selection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Default model identifier in `provider:model` form
    pub default_model: String,
    /// Debug mode (tool-call events included in chat streams)
    pub debug: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            default_model: "openai:gpt-4o-mini".into(),
            debug: false,
        }
    }
}

/// Query construction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Row cap injected when the user did not ask for all rows
    pub default_row_limit: u64,
    /// Per-stage retry budget in the controller
    pub max_retries: u32,
    /// Tool calls recovered for follow-up repair
    pub history_window: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_row_limit: 100,
            max_retries: 2,
            history_window: 3,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Structured (JSON) log format
    pub structured: bool,
    /// Log file directory
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            structured: false,
            log_dir: None,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Session store configuration
    pub database: DatabaseConfig,
    /// Warehouse gateway configuration
    pub warehouse: WarehouseConfig,
    /// Server configuration
    pub server: ServerConfig,
    /// Knowledge retrieval configuration
    pub knowledge: KnowledgeConfig,
    /// Model selection configuration
    pub model: ModelConfig,
    /// Query construction configuration
    pub query: QueryConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Semantic model document path
    pub semantic_model_path: PathBuf,
    /// Application name
    pub app_name: String,
    /// Environment
    pub environment: String,
}

impl AppConfig {
    /// Development configuration: in-memory store, hermetic embeddings
    pub fn development() -> Self {
        Self {
            app_name: "retailiq".into(),
            environment: "development".into(),
            semantic_model_path: PathBuf::from("semantic_model.json"),
            ..Default::default()
        }
    }
}

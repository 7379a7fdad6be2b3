use crate::config::config::AppConfig;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use std::path::PathBuf;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the default locations
    ///
    /// Search order:
    /// 1. ./retailiq.toml
    /// 2. Environment variables prefixed with RETAILIQ_
    pub fn load() -> Result<AppConfig, figment::Error> {
        let figment = Figment::new()
            .merge(Toml::file("retailiq.toml"))
            .merge(Env::prefixed("RETAILIQ_").split("_").global());

        figment.extract()
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: PathBuf) -> Result<AppConfig, figment::Error> {
        let figment = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("RETAILIQ_").split("_").global());

        figment.extract()
    }

    /// Validate a loaded configuration
    pub fn validate(config: &AppConfig) -> Result<(), ConfigValidationError> {
        if config.server.port == 0 {
            return Err(ConfigValidationError::InvalidPort);
        }

        if config.database.backend == "surrealdb" && config.database.url.is_empty() {
            return Err(ConfigValidationError::MissingDatabaseUrl);
        }

        if config.query.default_row_limit == 0 {
            return Err(ConfigValidationError::InvalidRowLimit);
        }

        if config.semantic_model_path.as_os_str().is_empty() {
            return Err(ConfigValidationError::MissingSemanticModel);
        }

        Ok(())
    }
}

/// Configuration validation errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigValidationError {
    #[error("server port must be greater than 0")]
    InvalidPort,

    #[error("database url is not configured")]
    MissingDatabaseUrl,

    #[error("default row limit must be greater than 0")]
    InvalidRowLimit,

    #[error("semantic model path is not configured")]
    MissingSemanticModel,
}

/// Default configuration file path
pub fn default_config_path() -> PathBuf {
    PathBuf::from("retailiq.toml")
}

/// Check whether the configuration file exists
pub fn config_exists() -> bool {
    default_config_path().exists()
}

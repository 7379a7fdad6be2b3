//! Model provider selection
//!
//! `provider:model` identifiers parse into a closed provider enumeration;
//! unknown tags fail at configuration time, not at call time. The factory
//! maps each tag to a backend-descriptor constructor; the descriptor is
//! what the language-understanding collaborator consumes to reach its
//! model endpoint.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Supported model providers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    OpenAi,
    Google,
    Anthropic,
    Groq,
}

impl ModelProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelProvider::OpenAi => "openai",
            ModelProvider::Google => "google",
            ModelProvider::Anthropic => "anthropic",
            ModelProvider::Groq => "groq",
        }
    }
}

impl FromStr for ModelProvider {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "openai" => Ok(ModelProvider::OpenAi),
            "google" => Ok(ModelProvider::Google),
            "anthropic" => Ok(ModelProvider::Anthropic),
            "groq" => Ok(ModelProvider::Groq),
            other => Err(AppError::UnsupportedProvider(other.to_string())),
        }
    }
}

impl std::fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed `provider:model` identifier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelId {
    pub provider: ModelProvider,
    pub model_name: String,
}

impl ModelId {
    /// Parse an identifier such as `openai:gpt-4o-mini`
    pub fn parse(identifier: &str) -> Result<Self> {
        let (provider, model_name) = identifier.split_once(':').ok_or_else(|| {
            AppError::UnsupportedProvider(format!(
                "model identifier must be provider:model, got: {}",
                identifier
            ))
        })?;

        if model_name.is_empty() {
            return Err(AppError::UnsupportedProvider(format!(
                "model identifier has no model name: {}",
                identifier
            )));
        }

        Ok(Self {
            provider: ModelProvider::from_str(provider)?,
            model_name: model_name.to_string(),
        })
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.provider, self.model_name)
    }
}

/// Connection descriptor for one model backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackendDescriptor {
    pub provider: ModelProvider,
    pub model_name: String,
    pub api_base: String,
}

type BackendConstructor = fn(&str) -> BackendDescriptor;

fn openai_backend(model_name: &str) -> BackendDescriptor {
    BackendDescriptor {
        provider: ModelProvider::OpenAi,
        model_name: model_name.to_string(),
        api_base: "https://api.openai.com/v1".to_string(),
    }
}

fn google_backend(model_name: &str) -> BackendDescriptor {
    BackendDescriptor {
        provider: ModelProvider::Google,
        model_name: model_name.to_string(),
        api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
    }
}

fn anthropic_backend(model_name: &str) -> BackendDescriptor {
    BackendDescriptor {
        provider: ModelProvider::Anthropic,
        model_name: model_name.to_string(),
        api_base: "https://api.anthropic.com/v1".to_string(),
    }
}

fn groq_backend(model_name: &str) -> BackendDescriptor {
    BackendDescriptor {
        provider: ModelProvider::Groq,
        model_name: model_name.to_string(),
        api_base: "https://api.groq.com/openai/v1".to_string(),
    }
}

/// Constructor for a provider tag
pub fn backend_constructor(provider: ModelProvider) -> BackendConstructor {
    match provider {
        ModelProvider::OpenAi => openai_backend,
        ModelProvider::Google => google_backend,
        ModelProvider::Anthropic => anthropic_backend,
        ModelProvider::Groq => groq_backend,
    }
}

/// Build the backend descriptor for a parsed model identifier
pub fn create_backend(model_id: &ModelId) -> BackendDescriptor {
    backend_constructor(model_id.provider)(&model_id.model_name)
}

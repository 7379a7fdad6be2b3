//! Semantic model document
//!
//! The declarative description of warehouse tables and their relationships,
//! consumed at startup. The serde shape mirrors the document format exactly,
//! including the `Use Case` key.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{AppError, Result};

/// Relationship cardinality between two tables
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Cardinality {
    #[serde(rename = "one-to-many")]
    OneToMany,
    #[serde(rename = "many-to-one")]
    ManyToOne,
    #[serde(rename = "many-to-many")]
    ManyToMany,
}

impl std::fmt::Display for Cardinality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Cardinality::OneToMany => "one-to-many",
            Cardinality::ManyToOne => "many-to-one",
            Cardinality::ManyToMany => "many-to-many",
        };
        f.write_str(s)
    }
}

/// A declared relationship, directed from the owning table to `related_table`
///
/// `join_columns` maps source column to target column in declaration order;
/// the declared pairs are authoritative over any name-based guess.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipDef {
    pub related_table: String,
    pub relationship_type: Cardinality,
    pub join_columns: IndexMap<String, String>,
    #[serde(default)]
    pub description: String,
}

/// One table entry of the semantic model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDef {
    pub table_name: String,
    pub table_description: String,
    #[serde(rename = "Use Case")]
    pub use_case: String,
    #[serde(default)]
    pub relationships: Vec<RelationshipDef>,
}

/// The semantic model document
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SemanticModel {
    pub tables: Vec<TableDef>,
}

impl SemanticModel {
    /// Parse a semantic model from its JSON text
    pub fn from_str(text: &str) -> Result<Self> {
        let model: SemanticModel = serde_json::from_str(text)?;
        Ok(model)
    }

    /// Load a semantic model document from disk
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!(
                "cannot read semantic model {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_str(&text)
    }

    /// Find a table entry by name, case-insensitively
    pub fn table(&self, name: &str) -> Option<&TableDef> {
        self.tables
            .iter()
            .find(|t| t.table_name.eq_ignore_ascii_case(name))
    }

    /// Table names in declaration order
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.table_name.as_str()).collect()
    }
}

//! Knowledge document ingestion
//!
//! Reads table rules, sample queries and reference notes from a directory.
//! Supported formats: .md, .sql, .txt, .json. Table association is
//! inferred from the file stem; documents load in filename order so
//! retrieval tie-breaks stay stable across runs.

use std::path::Path;

use tracing::{info, warn};

use crate::error::Result;
use crate::models::knowledge::SnippetKind;

/// A loaded knowledge document
#[derive(Debug, Clone)]
pub struct KnowledgeDocument {
    /// Source file name
    pub source: String,
    /// Full document text
    pub content: String,
    /// Table this document is about, when the file stem names one
    pub associated_table: Option<String>,
    /// Document kind
    pub kind: SnippetKind,
}

const FORMATS: &[&str] = &["md", "sql", "txt", "json"];

fn classify(stem: &str, extension: &str) -> SnippetKind {
    if stem.contains("rule") {
        SnippetKind::Rule
    } else if extension == "sql" || stem.contains("quer") || stem.contains("sample") {
        SnippetKind::SampleQuery
    } else {
        SnippetKind::Reference
    }
}

fn associate_table(stem: &str, table_names: &[String]) -> Option<String> {
    let stem_lower = stem.to_ascii_lowercase();
    table_names
        .iter()
        .find(|name| stem_lower.starts_with(&name.to_ascii_lowercase()))
        .cloned()
}

/// Load all knowledge documents under a directory
///
/// A missing directory yields an empty set with a warning; a single
/// unreadable file is skipped, the rest still load.
pub fn load_knowledge_dir(dir: &Path, table_names: &[String]) -> Result<Vec<KnowledgeDocument>> {
    if !dir.is_dir() {
        warn!("knowledge directory {} not found, starting without documents", dir.display());
        return Ok(Vec::new());
    }

    let mut paths: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .map(|e| FORMATS.contains(&e))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!("skipping unreadable knowledge file {}: {}", path.display(), e);
                continue;
            }
        };

        let source = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let stem = path
            .file_stem()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        documents.push(KnowledgeDocument {
            source,
            content,
            associated_table: associate_table(&stem, table_names),
            kind: classify(&stem, &extension),
        });
    }

    info!("loaded {} knowledge documents from {}", documents.len(), dir.display());
    Ok(documents)
}

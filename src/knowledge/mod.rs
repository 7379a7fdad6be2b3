//! Knowledge retrieval module
//!
//! Similarity search over auxiliary documents: table rules, sample
//! queries, reference notes. A thin interface over an embedding backend;
//! unavailability degrades to an empty result set so a turn never fails
//! for lack of snippets.

pub mod docs;
pub mod embedding;
pub mod index;

pub use docs::{KnowledgeDocument, load_knowledge_dir};
pub use embedding::{EmbeddingModel, HashEmbeddingModel, RemoteEmbeddingModel, create_embedding_model};
pub use index::DocumentKnowledgeIndex;

use async_trait::async_trait;
use tracing::warn;

use crate::error::Result;
use crate::models::knowledge::KnowledgeSnippet;

/// Default number of snippets returned per search
pub const DEFAULT_TOP_K: usize = 5;

/// Knowledge retrieval contract
#[async_trait]
pub trait KnowledgeIndex: Send + Sync {
    /// Search for snippets relevant to a table name or free text.
    ///
    /// Results are ordered by descending relevance score, at most `top_k`
    /// entries; score ties break by document insertion order.
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<KnowledgeSnippet>>;
}

/// Wrapper mapping backend unavailability to an empty result
pub struct FallbackKnowledgeIndex {
    inner: Box<dyn KnowledgeIndex>,
}

impl FallbackKnowledgeIndex {
    pub fn new(inner: Box<dyn KnowledgeIndex>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl KnowledgeIndex for FallbackKnowledgeIndex {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<KnowledgeSnippet>> {
        match self.inner.search(query, top_k).await {
            Ok(snippets) => Ok(snippets),
            Err(e) => {
                warn!("knowledge index unavailable, proceeding without snippets: {}", e);
                Ok(Vec::new())
            }
        }
    }
}

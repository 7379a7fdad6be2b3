//! Document knowledge index
//!
//! Scores knowledge documents against a query by blending embedding
//! similarity with keyword overlap. Holds everything in memory; the
//! document set is small (rules and sample queries per table).

use async_trait::async_trait;
use tracing::warn;

use crate::error::Result;
use crate::knowledge::docs::KnowledgeDocument;
use crate::knowledge::embedding::EmbeddingModel;
use crate::knowledge::KnowledgeIndex;
use crate::models::knowledge::KnowledgeSnippet;

pub struct DocumentKnowledgeIndex {
    documents: Vec<KnowledgeDocument>,
    // None when the embedding backend was unavailable at build time;
    // search then falls back to keyword scoring.
    embeddings: Option<Vec<Vec<f32>>>,
    model: Box<dyn EmbeddingModel>,
}

impl DocumentKnowledgeIndex {
    /// Build the index, embedding every document up front
    ///
    /// An unavailable embedding backend downgrades the index to
    /// keyword-only scoring instead of failing startup.
    pub async fn build(
        documents: Vec<KnowledgeDocument>,
        model: Box<dyn EmbeddingModel>,
    ) -> Self {
        let texts: Vec<&str> = documents.iter().map(|d| d.content.as_str()).collect();
        let embeddings = match model.encode_batch(&texts).await {
            Ok(embeddings) => Some(embeddings),
            Err(e) => {
                warn!("embedding backend unavailable at index build, keyword scoring only: {}", e);
                None
            }
        };

        Self {
            documents,
            embeddings,
            model,
        }
    }

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if na == 0.0 || nb == 0.0 {
            0.0
        } else {
            dot / (na * nb)
        }
    }

    fn keyword_score(content: &str, query: &str) -> f32 {
        let content_lower = content.to_lowercase();
        let mut score = 0.0;
        let mut terms = 0;
        for word in query.split_whitespace() {
            terms += 1;
            if content_lower.contains(&word.to_lowercase()) {
                score += 1.0;
            }
        }
        if terms == 0 { 0.0 } else { score / terms as f32 }
    }

    fn score(&self, i: usize, query: &str, query_embedding: Option<&[f32]>) -> f32 {
        let doc = &self.documents[i];

        let semantic = match (query_embedding, self.embeddings.as_ref()) {
            (Some(q), Some(embeddings)) => Self::cosine(q, &embeddings[i]),
            _ => 0.0,
        };
        let keyword = Self::keyword_score(&doc.content, query);

        // An exact table-name query should always surface that table's
        // rules first.
        let table_boost = match &doc.associated_table {
            Some(table) if table.eq_ignore_ascii_case(query.trim()) => 1.0,
            _ => 0.0,
        };

        semantic + keyword + table_boost
    }
}

#[async_trait]
impl KnowledgeIndex for DocumentKnowledgeIndex {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<KnowledgeSnippet>> {
        if self.documents.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = if self.embeddings.is_some() {
            match self.model.encode(query).await {
                Ok(embedding) => Some(embedding),
                Err(e) => {
                    warn!("query embedding failed, keyword scoring only: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let mut scored: Vec<(usize, f32)> = (0..self.documents.len())
            .map(|i| (i, self.score(i, query, query_embedding.as_deref())))
            .collect();

        // Stable sort: ties keep document insertion order.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| {
                let doc = &self.documents[i];
                KnowledgeSnippet {
                    source_document: doc.source.clone(),
                    content: doc.content.clone(),
                    relevance_score: score,
                    associated_table: doc.associated_table.clone(),
                    kind: doc.kind,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::embedding::HashEmbeddingModel;
    use crate::models::knowledge::SnippetKind;

    fn doc(source: &str, content: &str, table: Option<&str>, kind: SnippetKind) -> KnowledgeDocument {
        KnowledgeDocument {
            source: source.to_string(),
            content: content.to_string(),
            associated_table: table.map(|t| t.to_string()),
            kind,
        }
    }

    async fn index(docs: Vec<KnowledgeDocument>) -> DocumentKnowledgeIndex {
        DocumentKnowledgeIndex::build(docs, Box::new(HashEmbeddingModel::new(64))).await
    }

    #[tokio::test]
    async fn test_table_name_query_surfaces_its_rules_first() {
        let index = index(vec![
            doc("dim_store.md", "Store locations and formats.", Some("DIM_STORE"), SnippetKind::Reference),
            doc(
                "fact_sales_rules.md",
                "Always exclude voided transactions when summing sales.",
                Some("FACT_SALES"),
                SnippetKind::Rule,
            ),
        ])
        .await;

        let snippets = index.search("FACT_SALES", 5).await.unwrap();
        assert_eq!(snippets[0].source_document, "fact_sales_rules.md");
        assert!(snippets[0].relevance_score > snippets.get(1).map(|s| s.relevance_score).unwrap_or(0.0));
    }

    #[tokio::test]
    async fn test_top_k_bounds_results() {
        let docs = (0..8)
            .map(|i| doc(&format!("doc{}.md", i), "inventory stock", None, SnippetKind::Reference))
            .collect();
        let index = index(docs).await;

        let snippets = index.search("inventory", 3).await.unwrap();
        assert_eq!(snippets.len(), 3);
    }

    #[tokio::test]
    async fn test_score_ties_keep_insertion_order() {
        // Identical content scores identically; insertion order must hold.
        let docs = vec![
            doc("a.md", "promotion discount", None, SnippetKind::Reference),
            doc("b.md", "promotion discount", None, SnippetKind::Reference),
            doc("c.md", "promotion discount", None, SnippetKind::Reference),
        ];
        let index = index(docs).await;

        let snippets = index.search("promotion", 5).await.unwrap();
        let sources: Vec<_> = snippets.iter().map(|s| s.source_document.as_str()).collect();
        assert_eq!(sources, vec!["a.md", "b.md", "c.md"]);
    }

    #[tokio::test]
    async fn test_descending_scores() {
        let index = index(vec![
            doc("weak.md", "unrelated text", None, SnippetKind::Reference),
            doc("strong.md", "stockout stockout stockout inventory", None, SnippetKind::Reference),
        ])
        .await;

        let snippets = index.search("stockout inventory", 5).await.unwrap();
        assert!(snippets.windows(2).all(|w| w[0].relevance_score >= w[1].relevance_score));
        assert_eq!(snippets[0].source_document, "strong.md");
    }
}

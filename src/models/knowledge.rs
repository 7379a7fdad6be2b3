use serde::{Deserialize, Serialize};

/// Kind of auxiliary knowledge a snippet carries
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SnippetKind {
    /// Binding table rule; must be honored during query composition
    Rule,
    /// Sample query usable as a reference
    SampleQuery,
    /// Other reference material
    Reference,
}

/// A retrieved knowledge snippet
///
/// Produced by the knowledge index; not persisted by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeSnippet {
    /// Provenance: the document the snippet came from
    pub source_document: String,
    /// Snippet text
    pub content: String,
    /// Retrieval score, higher is more relevant
    pub relevance_score: f32,
    /// Table this snippet is about, when inferable
    pub associated_table: Option<String>,
    /// Snippet kind
    pub kind: SnippetKind,
}

impl KnowledgeSnippet {
    pub fn is_rule(&self) -> bool {
        self.kind == SnippetKind::Rule
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_detection() {
        let snippet = KnowledgeSnippet {
            source_document: "fact_sales_rules.md".to_string(),
            content: "Exclude voided transactions.".to_string(),
            relevance_score: 0.9,
            associated_table: Some("FACT_SALES".to_string()),
            kind: SnippetKind::Rule,
        };
        assert!(snippet.is_rule());
    }
}

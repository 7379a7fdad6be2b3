//! Core data model module
//!
//! Defines the RetailIQ data structures: the semantic model document,
//! sessions, conversation turns with their tool-call records, and
//! knowledge snippets.

pub mod knowledge;
pub mod semantic;
pub mod session;
pub mod turn;

pub use knowledge::{KnowledgeSnippet, SnippetKind};
pub use semantic::{Cardinality, RelationshipDef, SemanticModel, TableDef};
pub use session::{Session, SessionSummary};
pub use turn::{Role, ToolArgument, ToolCall, Turn};

//! Semantic schema graph
//!
//! Static, in-memory model of warehouse tables and their declared
//! relationships, shared read-only across all sessions.

pub mod graph;

pub use graph::{JoinHop, JoinPath, SchemaGraph};

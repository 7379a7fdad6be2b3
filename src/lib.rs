//! RetailIQ - conversational SQL analytics service
//!
//! Turns natural-language questions about a retail data warehouse into
//! validated read-only SQL, executes them, and returns analyzed answers.
//! The semantic schema graph, knowledge retrieval, tool contract and the
//! query-construction state machine live here; language understanding and
//! the warehouse itself are collaborators behind traits.

pub mod api;
pub mod config;
pub mod controller;
pub mod error;
pub mod knowledge;
pub mod loader;
pub mod models;
pub mod observability;
pub mod providers;
pub mod schema;
pub mod services;
pub mod storage;
pub mod tools;

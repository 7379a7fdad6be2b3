//! Storage layer module
//!
//! Persistence for sessions and turns behind a generic repository trait.
//! Backends: SurrealDB for durable deployments (feature `surrealdb`, on
//! by default) and an in-memory store for tests and hermetic runs.

pub mod factory;
pub mod memory;
pub mod repository;

#[cfg(feature = "surrealdb")]
pub mod surrealdb;

pub use factory::{StorageFactory, StorageHandles};
pub use repository::Repository;

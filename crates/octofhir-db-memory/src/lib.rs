//! In-memory resource store backend for the OctoFHIR migration tooling.
//!
//! This crate provides an in-memory implementation of the `ResourceStore` trait
//! from `octofhir-storage`. It answers reads, `identifier`/`url` searches and
//! transaction bundles the way a FHIR server would, which makes it the store of
//! choice for exercising exports and replays without a network.
//!
//! # Example
//!
//! ```ignore
//! use octofhir_db_memory::InMemoryStore;
//! use octofhir_storage::ResourceStore;
//!
//! let store = InMemoryStore::new();
//! store.insert(serde_json::json!({
//!     "resourceType": "Questionnaire",
//!     "id": "q1",
//!     "url": "http://example.org/Questionnaire/intake"
//! })).await?;
//! let found = store.read("Questionnaire", "q1").await?;
//! ```

mod fhir_impl;
pub mod query;
pub mod storage;
mod transaction;

pub use octofhir_storage::{ResourceStore, StorageError};

pub use query::{QueryFilter, SearchQuery};
pub use storage::{InMemoryStore, StorageKey};

/// Creates a new shared in-memory store.
pub fn create_store() -> octofhir_storage::DynStore {
    std::sync::Arc::new(InMemoryStore::new())
}

//! # octofhir-storage
//!
//! Resource store abstraction for the OctoFHIR migration tooling.
//!
//! This crate defines the trait and wire types every store backend must speak.
//! It does not contain any implementations - those are provided by separate crates
//! (`octofhir-db-memory`, and the HTTP store in `octofhir-cli`).
//!
//! ## Overview
//!
//! The main trait is [`ResourceStore`], which defines the three capabilities the
//! exporter and importer depend on:
//! - read by type and id
//! - search by query
//! - execute a transaction bundle

mod error;
mod traits;
mod types;

pub use error::{ErrorCategory, StorageError};
pub use traits::ResourceStore;
pub use types::{
    Bundle, BundleEntry, BundleRequest, BundleResponse, BundleType, HttpVerb, SearchParams,
};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shared store trait object.
pub type DynStore = std::sync::Arc<dyn ResourceStore>;

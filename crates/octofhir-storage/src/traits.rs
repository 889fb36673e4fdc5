//! Store traits for the resource store abstraction layer.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageError;
use crate::types::{Bundle, SearchParams};

/// The remote, typed, reference-linked resource store the migration tooling
/// reads from and replays into.
///
/// Implementations must be thread-safe (`Send + Sync`). Every call is a single
/// blocking I/O round trip from the caller's point of view.
///
/// # Example
///
/// ```ignore
/// use octofhir_storage::{ResourceStore, SearchParams, StorageError};
///
/// async fn find_by_url(store: &dyn ResourceStore, url: &str) -> Result<Vec<Value>, StorageError> {
///     store
///         .search("Questionnaire", &SearchParams::new().with_param("url", url))
///         .await
/// }
/// ```
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Reads a resource by type and ID.
    ///
    /// Returns `None` if the resource does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues, not for missing resources.
    async fn read(&self, resource_type: &str, id: &str) -> Result<Option<Value>, StorageError>;

    /// Searches for resources of a given type, returning the matching resources
    /// in the order the store ranks them.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidResource` for unsupported search parameters.
    /// Returns an error for infrastructure issues.
    async fn search(
        &self,
        resource_type: &str,
        params: &SearchParams,
    ) -> Result<Vec<Value>, StorageError>;

    /// Executes a transaction bundle and returns the store's response bundle.
    ///
    /// Each response entry echoes the submitted `fullUrl` alongside the
    /// concrete resource and its assigned id, where the store supports it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::TransactionError` if the bundle is rejected as a whole.
    async fn batch_execute(&self, bundle: &Bundle) -> Result<Bundle, StorageError>;

    /// Returns the name of this store backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}

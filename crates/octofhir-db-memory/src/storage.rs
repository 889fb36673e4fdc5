use indexmap::IndexMap;
use octofhir_core::generate_id;
use octofhir_storage::StorageError;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

pub type StorageKey = String; // Format: "ResourceType/id"

pub(crate) fn make_storage_key(resource_type: &str, id: &str) -> StorageKey {
    format!("{resource_type}/{id}")
}

/// Extracts resourceType from a JSON Value.
pub(crate) fn extract_resource_type(resource: &Value) -> Result<String, StorageError> {
    resource
        .get("resourceType")
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or_else(|| StorageError::invalid_resource("Missing resourceType field"))
}

/// Extracts id from a JSON Value.
pub(crate) fn extract_id(resource: &Value) -> Option<String> {
    resource.get("id").and_then(|v| v.as_str()).map(String::from)
}

/// In-memory resource store.
///
/// Resources live in an insertion-ordered map keyed by `Type/id`, so searches
/// return matches in a stable order. Transactions take the write lock for
/// their whole duration and are applied atomically.
#[derive(Debug)]
pub struct InMemoryStore {
    pub(crate) data: RwLock<IndexMap<StorageKey, Value>>,
    /// Atomic counter for generating version IDs
    pub(crate) version_counter: AtomicU64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(IndexMap::new()),
            version_counter: AtomicU64::new(1),
        }
    }

    /// Creates a store pre-populated with the given resources.
    ///
    /// Resources without an `id` get a generated one.
    pub fn from_resources(
        resources: impl IntoIterator<Item = Value>,
    ) -> Result<Self, StorageError> {
        let mut store = Self::new();
        let mut data = IndexMap::new();
        for resource in resources {
            let (key, stored) = store.prepare(resource)?;
            data.insert(key, stored);
        }
        store.data = RwLock::new(data);
        Ok(store)
    }

    /// Inserts or replaces a resource, returning the stored copy.
    pub async fn insert(&self, resource: Value) -> Result<Value, StorageError> {
        let (key, stored) = self.prepare(resource)?;
        self.data.write().await.insert(key, stored.clone());
        Ok(stored)
    }

    /// Returns every stored resource of the given type, in insertion order.
    pub async fn resources_of(&self, resource_type: &str) -> Vec<Value> {
        let prefix = format!("{resource_type}/");
        self.data
            .read()
            .await
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(_, resource)| resource.clone())
            .collect()
    }

    /// Returns the number of stored resources.
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }

    /// Generates the next version ID.
    pub(crate) fn next_version(&self) -> String {
        self.version_counter
            .fetch_add(1, Ordering::SeqCst)
            .to_string()
    }

    /// Assigns id and version metadata to a resource about to be stored.
    pub(crate) fn stamp(&self, resource: &mut Value, id: &str) {
        let version_id = self.next_version();
        if let Some(obj) = resource.as_object_mut() {
            obj.insert("id".to_string(), Value::String(id.to_string()));
            let meta = obj
                .entry("meta")
                .or_insert_with(|| Value::Object(Default::default()));
            if let Some(meta) = meta.as_object_mut() {
                meta.insert("versionId".to_string(), Value::String(version_id));
            }
        }
    }

    fn prepare(&self, mut resource: Value) -> Result<(StorageKey, Value), StorageError> {
        if !resource.is_object() {
            return Err(StorageError::invalid_resource("Resource must be a JSON object"));
        }
        let resource_type = extract_resource_type(&resource)?;
        let id = extract_id(&resource).unwrap_or_else(generate_id);
        self.stamp(&mut resource, &id);
        Ok((make_storage_key(&resource_type, &id), resource))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_assigns_id_and_version() {
        let store = InMemoryStore::new();
        let stored = store
            .insert(json!({"resourceType": "Library", "name": "core"}))
            .await
            .unwrap();

        assert!(stored["id"].as_str().is_some());
        assert_eq!(stored["meta"]["versionId"], "1");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_from_resources_keeps_order() {
        let store = InMemoryStore::from_resources(vec![
            json!({"resourceType": "Library", "id": "b"}),
            json!({"resourceType": "Questionnaire", "id": "q"}),
            json!({"resourceType": "Library", "id": "a"}),
        ])
        .unwrap();

        let ids: Vec<_> = store
            .resources_of("Library")
            .await
            .into_iter()
            .map(|r| r["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_insert_rejects_untyped_resource() {
        let store = InMemoryStore::new();
        let err = store.insert(json!({"id": "x"})).await.unwrap_err();
        assert!(err.to_string().contains("Missing resourceType"));
        assert!(store.is_empty().await);
    }
}

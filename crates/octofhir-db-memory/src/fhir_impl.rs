//! Implementation of the ResourceStore trait for InMemoryStore.

use async_trait::async_trait;
use octofhir_storage::{Bundle, ResourceStore, SearchParams, StorageError};
use serde_json::Value;

use crate::query::SearchQuery;
use crate::storage::{InMemoryStore, make_storage_key};

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn read(&self, resource_type: &str, id: &str) -> Result<Option<Value>, StorageError> {
        let key = make_storage_key(resource_type, id);
        Ok(self.data.read().await.get(&key).cloned())
    }

    async fn search(
        &self,
        resource_type: &str,
        params: &SearchParams,
    ) -> Result<Vec<Value>, StorageError> {
        let query = SearchQuery::from_params(resource_type, params)?;
        let data = self.data.read().await;
        let matches = data.values().filter(|r| query.matches(r)).cloned();
        Ok(match query.count {
            Some(count) => matches.take(count).collect(),
            None => matches.collect(),
        })
    }

    async fn batch_execute(&self, bundle: &Bundle) -> Result<Bundle, StorageError> {
        self.execute_bundle(bundle).await
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_store(store: &InMemoryStore) -> &dyn ResourceStore {
        store
    }

    fn seeded() -> InMemoryStore {
        InMemoryStore::from_resources(vec![
            json!({"resourceType": "ValueSet", "id": "v1", "url": "http://x.org/vs/colors", "version": "1"}),
            json!({"resourceType": "ValueSet", "id": "v2", "url": "http://x.org/vs/colors", "version": "2"}),
            json!({"resourceType": "CodeSystem", "id": "c1", "url": "http://x.org/vs/colors"}),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_read() {
        let store = seeded();
        let found = as_store(&store).read("ValueSet", "v1").await.unwrap();
        assert_eq!(found.unwrap()["version"], "1");

        let missing = as_store(&store).read("ValueSet", "nope").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_search_by_url_and_version() {
        let store = seeded();
        let by_url = as_store(&store)
            .search(
                "ValueSet",
                &SearchParams::new().with_param("url", "http://x.org/vs/colors"),
            )
            .await
            .unwrap();
        assert_eq!(by_url.len(), 2);
        assert_eq!(by_url[0]["id"], "v1");

        let by_version = as_store(&store)
            .search(
                "ValueSet",
                &SearchParams::new()
                    .with_param("url", "http://x.org/vs/colors")
                    .with_param("version", "2"),
            )
            .await
            .unwrap();
        assert_eq!(by_version.len(), 1);
        assert_eq!(by_version[0]["id"], "v2");
    }

    #[tokio::test]
    async fn test_search_count() {
        let store = seeded();
        let limited = as_store(&store)
            .search(
                "ValueSet",
                &SearchParams::new()
                    .with_param("url", "http://x.org/vs/colors")
                    .with_count(1),
            )
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_backend_name() {
        assert_eq!(as_store(&InMemoryStore::new()).backend_name(), "memory");
    }
}

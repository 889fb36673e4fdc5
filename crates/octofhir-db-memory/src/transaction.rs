//! Transaction and batch bundle processing for the in-memory store.
//!
//! Processing runs in two passes over the submitted entries. The first pass
//! resolves every request to a concrete `Type/id` (conditional upserts are
//! matched against the current contents); the second pass rewrites local
//! `reference` values that point at entry `fullUrl`s, stamps the resources
//! and stores them.

use std::collections::HashMap;

use indexmap::IndexMap;
use octofhir_core::generate_id;
use octofhir_storage::{
    Bundle, BundleEntry, BundleResponse, BundleType, HttpVerb, StorageError,
};
use serde_json::{Value, json};

use crate::query::SearchQuery;
use crate::storage::{InMemoryStore, StorageKey, extract_resource_type, make_storage_key};

/// Outcome of resolving one entry's request against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PlannedWrite {
    pub resource_type: String,
    pub id: String,
    pub created: bool,
}

/// A single entry that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EntryFailure {
    pub status: &'static str,
    pub message: String,
}

impl EntryFailure {
    fn new(status: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn outcome(&self) -> Value {
        json!({
            "resourceType": "OperationOutcome",
            "issue": [{
                "severity": "error",
                "code": "processing",
                "diagnostics": self.message,
            }]
        })
    }
}

impl InMemoryStore {
    /// Executes a `transaction` (all-or-nothing) or `batch` (per-entry) bundle.
    pub(crate) async fn execute_bundle(&self, bundle: &Bundle) -> Result<Bundle, StorageError> {
        let response_type = match bundle.bundle_type {
            BundleType::Transaction => BundleType::TransactionResponse,
            BundleType::Batch => BundleType::BatchResponse,
            other => {
                return Err(StorageError::invalid_resource(format!(
                    "Expected a transaction or batch bundle, got {other:?}"
                )));
            }
        };
        let atomic = bundle.bundle_type == BundleType::Transaction;

        let mut data = self.data.write().await;

        // Pass 1: resolve every entry to a target.
        let mut planned: Vec<Result<PlannedWrite, EntryFailure>> =
            Vec::with_capacity(bundle.entry.len());
        for entry in &bundle.entry {
            planned.push(plan_entry(&data, entry));
        }

        if atomic {
            if let Some(Err(failure)) = planned.iter().find(|p| p.is_err()) {
                tracing::debug!(status = failure.status, "transaction rolled back");
                return Err(StorageError::transaction_error(failure.message.clone()));
            }
        }

        let aliases: HashMap<&str, String> = bundle
            .entry
            .iter()
            .zip(&planned)
            .filter_map(|(entry, plan)| {
                let full_url = entry.full_url.as_deref()?;
                let plan = plan.as_ref().ok()?;
                Some((full_url, make_storage_key(&plan.resource_type, &plan.id)))
            })
            .collect();

        // Pass 2: apply.
        let mut response_entries = Vec::with_capacity(bundle.entry.len());
        for (entry, plan) in bundle.entry.iter().zip(planned) {
            let response_entry = match plan {
                Ok(plan) => {
                    let mut resource = entry.resource.clone().unwrap_or(Value::Null);
                    rewrite_local_references(&mut resource, &aliases);
                    self.stamp(&mut resource, &plan.id);

                    let version = resource
                        .pointer("/meta/versionId")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    let key = make_storage_key(&plan.resource_type, &plan.id);
                    data.insert(key.clone(), resource.clone());

                    let status = if plan.created { "201 Created" } else { "200 OK" };
                    BundleEntry {
                        full_url: entry.full_url.clone(),
                        resource: Some(resource),
                        request: None,
                        response: Some(
                            BundleResponse::new(status)
                                .with_location(format!("{key}/_history/{version}")),
                        ),
                    }
                }
                Err(failure) => BundleEntry {
                    full_url: entry.full_url.clone(),
                    resource: None,
                    request: None,
                    response: Some(
                        BundleResponse::new(failure.status).with_outcome(failure.outcome()),
                    ),
                },
            };
            response_entries.push(response_entry);
        }

        tracing::debug!(
            entries = response_entries.len(),
            bundle_type = ?bundle.bundle_type,
            "bundle processed"
        );
        Ok(Bundle::new(response_type, response_entries))
    }
}

/// Resolves an entry's request to the `Type/id` it will write.
pub(crate) fn plan_entry(
    data: &IndexMap<StorageKey, Value>,
    entry: &BundleEntry,
) -> Result<PlannedWrite, EntryFailure> {
    let request = entry
        .request
        .as_ref()
        .ok_or_else(|| EntryFailure::new("400 Bad Request", "Entry has no request"))?;
    let resource = entry
        .resource
        .as_ref()
        .filter(|r| r.is_object())
        .ok_or_else(|| EntryFailure::new("400 Bad Request", "Entry has no resource"))?;
    let resource_type = extract_resource_type(resource)
        .map_err(|e| EntryFailure::new("400 Bad Request", e.to_string()))?;

    let (path, query) = match request.url.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (request.url.as_str(), None),
    };
    let mut segments = path.trim_matches('/').split('/');
    let url_type = segments.next().unwrap_or_default();
    let url_id = segments.next();
    if url_type != resource_type {
        return Err(EntryFailure::new(
            "400 Bad Request",
            format!(
                "Request URL {} does not match resource type {resource_type}",
                request.url
            ),
        ));
    }

    match (request.method, url_id, query) {
        (HttpVerb::Post, None, None) => Ok(PlannedWrite {
            resource_type,
            id: generate_id(),
            created: true,
        }),
        (HttpVerb::Put, Some(id), None) => {
            let created = !data.contains_key(&make_storage_key(&resource_type, id));
            Ok(PlannedWrite {
                resource_type,
                id: id.to_string(),
                created,
            })
        }
        (HttpVerb::Put, None, Some(query)) => {
            let search = SearchQuery::from_query_string(&resource_type, query)
                .map_err(|e| EntryFailure::new("400 Bad Request", e.to_string()))?;
            let matches: Vec<&Value> = data.values().filter(|r| search.matches(r)).collect();
            match matches.as_slice() {
                [] => Ok(PlannedWrite {
                    resource_type,
                    id: generate_id(),
                    created: true,
                }),
                [existing] => Ok(PlannedWrite {
                    resource_type,
                    id: existing
                        .get("id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    created: false,
                }),
                _ => Err(EntryFailure::new(
                    "412 Precondition Failed",
                    format!("Multiple matches for conditional update {}", request.url),
                )),
            }
        }
        _ => Err(EntryFailure::new(
            "400 Bad Request",
            format!("Unsupported request {} {}", request.method, request.url),
        )),
    }
}

/// Rewrites `reference` strings that name another entry's `fullUrl`.
///
/// Canonical-valued fields are left untouched.
pub(crate) fn rewrite_local_references(value: &mut Value, aliases: &HashMap<&str, String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if key == "reference" {
                    if let Some(target) = child.as_str().and_then(|s| aliases.get(s)) {
                        *child = Value::String(target.clone());
                        continue;
                    }
                }
                rewrite_local_references(child, aliases);
            }
        }
        Value::Array(items) => {
            for item in items {
                rewrite_local_references(item, aliases);
            }
        }
        _ => {}
    }
}

//! Upsert entries and size-bounded transaction batches.

use octofhir_core::fhir_reference::encode_query_value;
use octofhir_core::{ResourceKind, to_marker};
use octofhir_storage::{Bundle, BundleEntry, BundleRequest, HttpVerb};
use serde_json::Value;

use crate::error::{MigrateError, Result};
use crate::identity::StableIdentity;
use crate::mapping::IdentifierMapping;

/// How the destination applies an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertTarget {
    /// `POST {Kind}`
    Create,
    /// `PUT {Kind}?identifier={system}|{value}`
    Conditional(StableIdentity),
}

/// A rewritten resource ready to be packed.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEntry {
    pub surrogate_id: String,
    pub kind: ResourceKind,
    pub resource: Value,
    pub target: UpsertTarget,
}

impl BatchEntry {
    pub fn new(
        surrogate_id: impl Into<String>,
        kind: ResourceKind,
        resource: Value,
        identity: Option<StableIdentity>,
    ) -> Self {
        Self {
            surrogate_id: surrogate_id.into(),
            kind,
            resource,
            target: identity.map_or(UpsertTarget::Create, UpsertTarget::Conditional),
        }
    }

    pub fn marker(&self) -> String {
        to_marker(&self.surrogate_id)
    }

    pub fn request(&self) -> BundleRequest {
        match &self.target {
            UpsertTarget::Create => BundleRequest::new(HttpVerb::Post, self.kind.as_str()),
            UpsertTarget::Conditional(identity) => BundleRequest::new(
                HttpVerb::Put,
                format!(
                    "{}?identifier={}|{}",
                    self.kind,
                    encode_query_value(&identity.system),
                    encode_query_value(&identity.value)
                ),
            ),
        }
    }

    pub fn to_bundle_entry(&self) -> BundleEntry {
        BundleEntry {
            full_url: Some(self.marker()),
            resource: Some(self.resource.clone()),
            request: Some(self.request()),
            response: None,
        }
    }
}

/// Splits entries, in order, into transaction bundles of at most `max_entries`.
pub fn pack(entries: &[BatchEntry], max_entries: usize) -> Result<Vec<Bundle>> {
    if max_entries == 0 {
        return Err(MigrateError::invalid_options(
            "max_entries_per_bundle must be > 0",
        ));
    }
    Ok(entries
        .chunks(max_entries)
        .map(|chunk| Bundle::transaction(chunk.iter().map(BatchEntry::to_bundle_entry).collect()))
        .collect())
}

/// Mapping sidecar for every conditionally upserted entry.
pub fn identifier_mapping(entries: &[BatchEntry]) -> IdentifierMapping {
    let mut mapping = IdentifierMapping::new();
    for entry in entries {
        if let UpsertTarget::Conditional(identity) = &entry.target {
            mapping.insert(entry.marker(), entry.kind.clone(), identity.clone());
        }
    }
    mapping
}

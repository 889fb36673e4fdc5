//! Post-import resolution of batch-local markers.
//!
//! After a batch has been replayed, the destination's response tells which
//! concrete `Kind/id` every marker became. References that the destination
//! could not resolve itself (canonical-valued fields in particular) still
//! carry markers; [`ImportResolver`] turns them into `Kind/id`.

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use octofhir_core::fhir_reference::{
    FhirReference, is_absolute_url, parse_reference, trailing_reference,
};
use octofhir_core::is_marker;
use octofhir_storage::{Bundle, BundleEntry, ResourceStore, SearchParams};
use serde_json::Value;

use crate::error::{MigrateError, Result};
use crate::fields::{collect_references, rewrite_references};
use crate::mapping::IdentifierMapping;

/// A marker replaced by a concrete reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMarker {
    pub marker: String,
    pub reference: String,
    pub path: String,
}

/// A marker no lookup table could resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedMarker {
    pub marker: String,
    pub path: String,
}

/// The result of resolving one resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub resource: Value,
    pub resolved: Vec<ResolvedMarker>,
    pub unresolved: Vec<UnresolvedMarker>,
}

impl Resolution {
    pub fn is_changed(&self) -> bool {
        !self.resolved.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Lookup tables built from replay responses.
#[derive(Debug, Clone, Default)]
pub struct ImportResolver {
    /// marker -> concrete address
    by_marker: IndexMap<String, FhirReference>,
    /// (kind, `system|value`) -> concrete id
    by_identity: HashMap<(String, String), String>,
}

impl ImportResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_response(response: &Bundle) -> Self {
        let mut resolver = Self::new();
        resolver.absorb(response);
        resolver
    }

    /// Adds the entries of a response bundle to the lookup tables.
    pub fn absorb(&mut self, response: &Bundle) {
        for entry in &response.entry {
            if let (Some(full_url), Some(address)) = (&entry.full_url, entry_address(entry)) {
                if is_marker(full_url) {
                    self.record(full_url.clone(), address);
                }
            }
            if let Some(resource) = &entry.resource {
                self.absorb_resource(resource);
            }
        }
    }

    /// Indexes every identifier of a concrete resource.
    pub fn absorb_resource(&mut self, resource: &Value) {
        let (Some(kind), Some(id)) = (
            resource.get("resourceType").and_then(Value::as_str),
            resource.get("id").and_then(Value::as_str),
        ) else {
            return;
        };
        let identifiers = match resource.get("identifier") {
            Some(Value::Array(items)) => items.as_slice(),
            Some(single @ Value::Object(_)) => std::slice::from_ref(single),
            _ => &[],
        };
        for identifier in identifiers {
            let system = identifier.get("system").and_then(Value::as_str);
            let value = identifier.get("value").and_then(Value::as_str);
            if let (Some(system), Some(value)) = (system, value) {
                self.by_identity
                    .insert((kind.to_string(), format!("{system}|{value}")), id.to_string());
            }
        }
    }

    pub fn record(&mut self, marker: impl Into<String>, address: FhirReference) {
        self.by_marker.insert(marker.into(), address);
    }

    /// Number of markers with a known concrete address.
    pub fn resolved_count(&self) -> usize {
        self.by_marker.len()
    }

    /// Concrete address of a marker: direct table first, identity table second.
    pub fn resolve_marker(&self, marker: &str, mapping: &IdentifierMapping) -> Option<FhirReference> {
        if let Some(address) = self.by_marker.get(marker) {
            return Some(address.clone());
        }
        let mapped = mapping.get(marker)?;
        let kind = mapped.resource_type.to_string();
        let id = self
            .by_identity
            .get(&(kind.clone(), mapped.identifier.token()))?;
        Some(FhirReference::new(kind, id.clone()))
    }

    /// Replaces every resolvable marker in the reference fields of `resource`
    /// with `Kind/id`. Markers that cannot be resolved stay in place.
    pub fn resolve_resource(&self, resource: &Value, mapping: &IdentifierMapping) -> Resolution {
        let mut resolved_body = resource.clone();
        let mut resolved = Vec::new();
        let mut unresolved = Vec::new();

        rewrite_references(&mut resolved_body, |field| {
            if !is_marker(&field.value) {
                return None;
            }
            match self.resolve_marker(&field.value, mapping) {
                Some(address) => {
                    let reference = address.to_relative();
                    resolved.push(ResolvedMarker {
                        marker: field.value.clone(),
                        reference: reference.clone(),
                        path: field.path.clone(),
                    });
                    Some(reference)
                }
                None => {
                    unresolved.push(UnresolvedMarker {
                        marker: field.value.clone(),
                        path: field.path.clone(),
                    });
                    None
                }
            }
        });

        Resolution {
            resource: resolved_body,
            resolved,
            unresolved,
        }
    }

    /// Distinct markers in the reference fields of `resources` that no table
    /// resolves yet, in first-seen order.
    pub fn pending_markers<'r>(
        &self,
        resources: impl IntoIterator<Item = &'r Value>,
        mapping: &IdentifierMapping,
    ) -> Vec<String> {
        let mut pending: IndexSet<String> = IndexSet::new();
        for resource in resources {
            for field in collect_references(resource) {
                if is_marker(&field.value)
                    && !pending.contains(&field.value)
                    && self.resolve_marker(&field.value, mapping).is_none()
                {
                    pending.insert(field.value);
                }
            }
        }
        pending.into_iter().collect()
    }

    /// Searches the destination by stable identity for markers the responses
    /// did not resolve. Returns how many markers became resolvable.
    pub async fn lookup_by_identity(
        &mut self,
        store: &dyn ResourceStore,
        markers: &[String],
        mapping: &IdentifierMapping,
    ) -> Result<usize> {
        let mut found = 0;
        for marker in markers {
            if self.resolve_marker(marker, mapping).is_some() {
                continue;
            }
            let Some(mapped) = mapping.get(marker) else {
                tracing::debug!(%marker, "marker has no mapped identity");
                continue;
            };
            let params = SearchParams::new().with_param("identifier", mapped.identifier.token());
            let hits = match store.search(mapped.resource_type.as_str(), &params).await {
                Ok(hits) => hits,
                Err(e) if e.is_not_found() => Vec::new(),
                Err(e) => return Err(MigrateError::store(e)),
            };
            let Some(hit) = hits
                .into_iter()
                .find(|hit| hit.get("id").and_then(Value::as_str).is_some())
            else {
                tracing::debug!(%marker, identity = %mapped.identifier.token(), "no resource with identity");
                continue;
            };
            if let Some(id) = hit.get("id").and_then(Value::as_str) {
                self.record(
                    marker.clone(),
                    FhirReference::new(mapped.resource_type.as_str(), id),
                );
                found += 1;
            }
            self.absorb_resource(&hit);
        }
        Ok(found)
    }
}

/// Concrete address of a response entry: from the echoed resource, or from
/// `response.location` when the destination does not echo it.
fn entry_address(entry: &BundleEntry) -> Option<FhirReference> {
    if let (Some(kind), Some(id)) = (entry.resource_type(), entry.resource_id()) {
        return Some(FhirReference::new(kind, id));
    }
    let location = entry.response.as_ref()?.location.as_deref()?;
    location_reference(location)
}

/// Parses `Kind/id[/_history/v]`, relative or absolute.
pub fn location_reference(location: &str) -> Option<FhirReference> {
    let path = location.split("/_history/").next().unwrap_or(location);
    if is_absolute_url(path) {
        trailing_reference(path)
    } else {
        parse_reference(path).ok()
    }
}

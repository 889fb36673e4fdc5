//! Replaying exported batches into a destination store.

use indexmap::IndexMap;
use octofhir_storage::{Bundle, BundleEntry, BundleRequest, HttpVerb, ResourceStore};
use serde_json::Value;

use crate::error::{MigrateError, Result};
use crate::mapping::IdentifierMapping;
use crate::resolver::ImportResolver;

/// A response entry with a non-2xx status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFailure {
    /// 1-based batch number. The follow-up patch counts as one past the last batch.
    pub batch: usize,
    pub index: usize,
    pub full_url: Option<String>,
    pub status: String,
    pub diagnostics: Option<String>,
}

/// A marker still present in a stored resource after replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMarker {
    /// `Kind/id` of the resource that carries it.
    pub resource: String,
    pub marker: String,
    pub path: String,
}

#[derive(Debug, Default)]
pub struct ImportReport {
    pub batches: usize,
    pub succeeded: usize,
    pub failures: Vec<EntryFailure>,
    /// `Kind/id` of resources updated with resolved references.
    pub patched: Vec<String>,
    pub unresolved: Vec<PendingMarker>,
    pub resolver: ImportResolver,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.unresolved.is_empty()
    }
}

/// Submits `bundles` in order, then resolves every marker the destination
/// left in place and writes the resolved resources back.
///
/// Batches are sequential; a transport failure aborts the replay and is
/// returned. Per-entry failures are collected in the report.
#[tracing::instrument(skip_all, fields(batches = bundles.len(), backend = store.backend_name()))]
pub async fn replay(
    store: &dyn ResourceStore,
    bundles: &[Bundle],
    mapping: &IdentifierMapping,
) -> Result<ImportReport> {
    let mut report = ImportReport::default();
    let mut returned: IndexMap<String, Value> = IndexMap::new();

    for (position, bundle) in bundles.iter().enumerate() {
        let batch = position + 1;
        let mut response = store
            .batch_execute(bundle)
            .await
            .map_err(MigrateError::store)?;
        echo_full_urls(bundle, &mut response);

        for (index, entry) in response.entry.iter().enumerate() {
            if let Some(failure) = entry_failure(batch, index, entry) {
                tracing::warn!(
                    batch,
                    index,
                    full_url = failure.full_url.as_deref().unwrap_or("-"),
                    status = %failure.status,
                    diagnostics = failure.diagnostics.as_deref().unwrap_or("-"),
                    "entry rejected"
                );
                report.failures.push(failure);
                continue;
            }
            report.succeeded += 1;
            if let (Some(kind), Some(id), Some(resource)) =
                (entry.resource_type(), entry.resource_id(), &entry.resource)
            {
                returned.insert(format!("{kind}/{id}"), resource.clone());
            }
        }

        report.resolver.absorb(&response);
        report.batches += 1;
        tracing::info!(batch, entries = response.entry.len(), "batch replayed");
    }

    let pending = report.resolver.pending_markers(returned.values(), mapping);
    if !pending.is_empty() {
        let found = report
            .resolver
            .lookup_by_identity(store, &pending, mapping)
            .await?;
        tracing::debug!(pending = pending.len(), found, "identity lookup");
    }

    let mut updates = Vec::new();
    for (address, resource) in &returned {
        let resolution = report.resolver.resolve_resource(resource, mapping);
        report
            .unresolved
            .extend(resolution.unresolved.iter().map(|u| PendingMarker {
                resource: address.clone(),
                marker: u.marker.clone(),
                path: u.path.clone(),
            }));
        if resolution.is_changed() {
            updates.push((address.clone(), resolution.resource));
        }
    }

    if !updates.is_empty() {
        let follow_up = Bundle::transaction(
            updates
                .iter()
                .map(|(address, resource)| BundleEntry {
                    full_url: None,
                    resource: Some(resource.clone()),
                    request: Some(BundleRequest::new(HttpVerb::Put, address.clone())),
                    response: None,
                })
                .collect(),
        );
        let response = store
            .batch_execute(&follow_up)
            .await
            .map_err(MigrateError::store)?;
        let batch = bundles.len() + 1;
        for (index, (address, _)) in updates.iter().enumerate() {
            match response.entry.get(index).and_then(|e| entry_failure(batch, index, e)) {
                Some(mut failure) => {
                    failure.full_url = Some(address.clone());
                    tracing::warn!(resource = %address, status = %failure.status, "patch rejected");
                    report.failures.push(failure);
                }
                None => report.patched.push(address.clone()),
            }
        }
    }

    for pending in &report.unresolved {
        tracing::warn!(
            resource = %pending.resource,
            marker = %pending.marker,
            path = %pending.path,
            "marker left unresolved"
        );
    }
    tracing::info!(
        succeeded = report.succeeded,
        failed = report.failures.len(),
        patched = report.patched.len(),
        unresolved = report.unresolved.len(),
        "replay finished"
    );
    Ok(report)
}

/// Copies submitted `fullUrl`s onto response entries that omit them.
/// Entries are aligned by position.
fn echo_full_urls(submitted: &Bundle, response: &mut Bundle) {
    for (sent, received) in submitted.entry.iter().zip(response.entry.iter_mut()) {
        if received.full_url.is_none() {
            received.full_url = sent.full_url.clone();
        }
    }
}

fn entry_failure(batch: usize, index: usize, entry: &BundleEntry) -> Option<EntryFailure> {
    let response = entry.response.as_ref()?;
    if response.is_success() {
        return None;
    }
    Some(EntryFailure {
        batch,
        index,
        full_url: entry.full_url.clone(),
        status: response.status.clone(),
        diagnostics: response.diagnostics().map(str::to_string),
    })
}

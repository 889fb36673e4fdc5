//! Depth-first discovery of the dependency closure of a root resource.

use std::str::FromStr;

use futures_util::future::{BoxFuture, FutureExt};
use indexmap::IndexMap;
use octofhir_core::{ResourceKind, generate_id};
use octofhir_storage::{Bundle, ResourceStore, SearchParams, StorageError};
use serde_json::Value;

use crate::error::{MigrateError, Result};
use crate::fields::collect_references;
use crate::identity::{StableIdentity, ensure_identity, strip_volatile_metadata};
use crate::kinds::KindRegistry;
use crate::mapping::IdentifierMapping;
use crate::options::ExportOptions;
use crate::packer::{BatchEntry, identifier_mapping, pack};
use crate::reference::{Canonical, ReferenceClass, ReferenceClassifier};
use crate::report::{ExportIssue, ExportIssueKind, ExportReport};
use crate::state::{Progress, TraversalState};
use crate::transform::rewrite_to_markers;

/// Outcome of one export walk.
#[derive(Debug, Clone)]
pub struct ExportResult {
    /// Transaction bundles in replay order.
    pub bundles: Vec<Bundle>,
    /// Number of packed resources.
    pub resource_count: usize,
    /// Reference key to surrogate id, in discovery order.
    pub closure: IndexMap<String, String>,
    /// Marker to kind and stable identity, for post-import resolution.
    pub mapping: IdentifierMapping,
    pub report: ExportReport,
}

impl ExportResult {
    /// Every packed entry, across bundles, in packing order.
    pub fn entries(&self) -> impl Iterator<Item = &octofhir_storage::BundleEntry> {
        self.bundles.iter().flat_map(|bundle| bundle.entry.iter())
    }
}

/// Walks the reference graph of a source store.
///
/// Store calls are issued one at a time; discovery order, and therefore
/// packing order, is fully determined by the source contents.
pub struct GraphWalker<'a> {
    store: &'a dyn ResourceStore,
    options: ExportOptions,
    registry: KindRegistry,
    classifier: ReferenceClassifier,
}

impl<'a> GraphWalker<'a> {
    pub fn new(store: &'a dyn ResourceStore, options: ExportOptions) -> Self {
        let registry = KindRegistry::from_options(&options);
        let classifier = ReferenceClassifier::new(options.generated_base());
        Self {
            store,
            options,
            registry,
            classifier,
        }
    }

    /// Replaces the kind table derived from the options.
    pub fn with_registry(mut self, registry: KindRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn classifier(&self) -> &ReferenceClassifier {
        &self.classifier
    }

    /// Computes the closure of `root` and packs it.
    ///
    /// Any store failure other than "not found" aborts the walk; nothing
    /// discovered so far is returned.
    #[tracing::instrument(skip(self), fields(backend = self.store.backend_name()))]
    pub async fn walk(&self, root: &str) -> Result<ExportResult> {
        self.options.validate()?;

        let mut state = TraversalState::new();
        let (class, key) = self.classifier.classify_keyed(root);
        if let ReferenceClass::Unparseable(reason) = &class {
            tracing::warn!(%reason, "root reference is not resolvable");
            return Err(MigrateError::root_unresolved(root));
        }

        if let Some(kind) = class.kind() {
            self.ensure_root_kind(root, kind)?;
        }
        let resource = self
            .resolve(&class)
            .await?
            .ok_or_else(|| MigrateError::root_unresolved(root))?;
        self.ensure_root_kind(root, resource_kind(&resource)?)?;
        self.visit(resource, key, &mut state).await?;

        let bundles = pack(&state.entries, self.options.max_entries_per_bundle)?;
        let mapping = identifier_mapping(&state.entries);
        tracing::info!(
            resources = state.entries.len(),
            bundles = bundles.len(),
            issues = state.report.len(),
            "export walk finished"
        );

        Ok(ExportResult {
            bundles,
            resource_count: state.entries.len(),
            closure: state.closure,
            mapping,
            report: state.report,
        })
    }

    /// The root must be a registered kind; a kind that is only skipped as a
    /// nested dependency is still a valid root.
    fn ensure_root_kind(&self, root: &str, kind: ResourceKind) -> Result<()> {
        if self.registry.is_registered(&kind) {
            return Ok(());
        }
        tracing::warn!(%root, %kind, "root kind is not exported");
        Err(MigrateError::disallowed_root(root, kind))
    }

    /// Mints a surrogate for `resource`, discovers its children, then
    /// rewrites and packs it. Returns the surrogate id.
    fn visit<'s>(
        &'s self,
        mut resource: Value,
        key: String,
        state: &'s mut TraversalState,
    ) -> BoxFuture<'s, Result<String>> {
        async move {
            let kind = resource_kind(&resource)?;
            let concrete = concrete_key(&resource, &kind);
            let surrogate = generate_id();

            // Registered before recursing so cycles short-circuit.
            state.alias(key, &surrogate);
            if let Some(concrete) = &concrete {
                state.alias(concrete.clone(), &surrogate);
            }
            if let Some(url) = resource.get("url").and_then(Value::as_str) {
                state.alias(url.to_string(), &surrogate);
            }
            state.begin(&surrogate);

            let source = concrete.unwrap_or_else(|| format!("{kind}/?"));
            tracing::debug!(resource = %source, %surrogate, "discovered");

            if self.options.clean_metadata {
                strip_volatile_metadata(&mut resource);
            }
            for field in collect_references(&resource) {
                self.discover(&field.value, &source, &field.path, state)
                    .await?;
            }

            let identity = ensure_identity(
                &mut resource,
                &kind,
                &self.classifier,
                self.options.clean_metadata,
            )?;
            self.rewrite(&mut resource, &source, state);

            state.complete(BatchEntry::new(
                surrogate.clone(),
                kind,
                resource,
                Some(identity),
            ));
            Ok(surrogate)
        }
        .boxed()
    }

    async fn discover(
        &self,
        raw: &str,
        referenced_from: &str,
        path: &str,
        state: &mut TraversalState,
    ) -> Result<()> {
        let (class, key) = self.classifier.classify_keyed(raw);
        if state.is_settled(&key) {
            if let Some(surrogate) = state.surrogate_for(&key) {
                if state.progress(surrogate) == Some(Progress::InProgress) {
                    tracing::debug!(reference = %raw, from = %referenced_from, "cycle back-edge");
                }
            }
            return Ok(());
        }

        let issue = |kind| ExportIssue {
            reference: raw.to_string(),
            referenced_from: referenced_from.to_string(),
            path: path.to_string(),
            kind,
        };

        if let ReferenceClass::Unparseable(reason) = &class {
            if reason.is_local() {
                tracing::debug!(reference = %raw, "local reference skipped");
            } else {
                state.mark_unresolved(key);
                state
                    .report
                    .record(issue(ExportIssueKind::Unparseable(reason.to_string())), false);
            }
            return Ok(());
        }

        if let Some(kind) = class.kind() {
            if !self.registry.is_followed(&kind) {
                state.mark_unresolved(key);
                state
                    .report
                    .record(issue(ExportIssueKind::Disallowed(kind)), false);
                return Ok(());
            }
        }

        let Some(resource) = self.resolve(&class).await? else {
            let expected = matches!(class, ReferenceClass::GeneratedCanonical { .. });
            state.mark_unresolved(key);
            state.report.record(issue(ExportIssueKind::NotFound), expected);
            return Ok(());
        };

        let kind = resource_kind(&resource)?;
        if !self.registry.is_followed(&kind) {
            state.mark_unresolved(key);
            state
                .report
                .record(issue(ExportIssueKind::Disallowed(kind)), false);
            return Ok(());
        }

        // Reached before under another spelling.
        if let Some(existing) = concrete_key(&resource, &kind)
            .and_then(|concrete| state.surrogate_for(&concrete).map(str::to_string))
        {
            state.alias(key, &existing);
            return Ok(());
        }

        self.visit(resource, key, state).await?;
        Ok(())
    }

    fn rewrite(&self, resource: &mut Value, source: &str, state: &mut TraversalState) {
        let kept = rewrite_to_markers(resource, &state.closure, &self.classifier);
        for field in kept {
            let key = self.classifier.classify_keyed(&field.value).1;
            if state.is_unresolved(&key) {
                continue;
            }
            state.report.record(
                ExportIssue {
                    reference: field.value,
                    referenced_from: source.to_string(),
                    path: field.path,
                    kind: ExportIssueKind::Unrewritten,
                },
                false,
            );
        }
    }

    /// Looks a classified reference up in the store.
    async fn resolve(&self, class: &ReferenceClass) -> Result<Option<Value>> {
        match class {
            ReferenceClass::Instance {
                reference,
                canonical,
            } => {
                if let Some(found) = self
                    .read(&reference.resource_type, &reference.id)
                    .await?
                {
                    return Ok(Some(found));
                }
                match canonical {
                    Some(canonical) => self.search_canonical(canonical).await,
                    None => Ok(None),
                }
            }
            ReferenceClass::GeneratedCanonical {
                kind,
                stable_value,
                url,
            } => {
                let identity =
                    StableIdentity::new(self.classifier.identifier_system(kind), stable_value);
                let by_identity = SearchParams::new().with_param("identifier", identity.token());
                if let Some(found) = self.search_first(kind, &by_identity).await? {
                    return Ok(Some(found));
                }
                let by_url = SearchParams::new().with_param("url", url.as_str());
                self.search_first(kind, &by_url).await
            }
            ReferenceClass::ExternalCanonical(canonical) => {
                self.search_canonical(canonical).await
            }
            ReferenceClass::Unparseable(_) => Ok(None),
        }
    }

    async fn read(&self, resource_type: &str, id: &str) -> Result<Option<Value>> {
        match self.store.read(resource_type, id).await {
            Ok(found) => Ok(found),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(MigrateError::store(e)),
        }
    }

    async fn search_canonical(&self, canonical: &Canonical) -> Result<Option<Value>> {
        let mut params = SearchParams::new().with_param("url", canonical.url.as_str());
        if let Some(version) = &canonical.version {
            params = params.with_param("version", version.as_str());
        }
        for kind in self.registry.canonical_search_kinds() {
            if let Some(found) = self.search_first(kind, &params).await? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    async fn search_first(
        &self,
        kind: &ResourceKind,
        params: &SearchParams,
    ) -> Result<Option<Value>> {
        match self.store.search(kind.as_str(), params).await {
            Ok(found) => Ok(found.into_iter().next()),
            Err(StorageError::NotFound { .. }) => Ok(None),
            Err(e) => Err(MigrateError::store(e)),
        }
    }
}

fn resource_kind(resource: &Value) -> Result<ResourceKind> {
    let name = resource
        .get("resourceType")
        .and_then(Value::as_str)
        .ok_or_else(|| MigrateError::malformed("resource without resourceType"))?;
    ResourceKind::from_str(name).map_err(|e| MigrateError::malformed(e.to_string()))
}

fn concrete_key(resource: &Value, kind: &ResourceKind) -> Option<String> {
    resource
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(|id| format!("{kind}/{id}"))
}

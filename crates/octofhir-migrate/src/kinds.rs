//! Registry of resource kinds the walker may follow.

use indexmap::IndexMap;
use octofhir_core::ResourceKind;

use crate::options::ExportOptions;

/// How the walker treats one resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindPolicy {
    /// Instance references to this kind are followed.
    pub follow: bool,
    /// The kind is searched when resolving an external canonical URL.
    pub canonical_search: bool,
}

impl KindPolicy {
    pub const DEFINITIONAL: KindPolicy = KindPolicy {
        follow: true,
        canonical_search: true,
    };

    pub const IGNORED: KindPolicy = KindPolicy {
        follow: false,
        canonical_search: false,
    };
}

/// Ordered lookup table from kind to policy.
///
/// Kinds that are absent from the table are never followed, which keeps
/// person-specific data (`Patient`, `Encounter`, ...) out of an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindRegistry {
    policies: IndexMap<ResourceKind, KindPolicy>,
}

impl Default for KindRegistry {
    fn default() -> Self {
        let policies = ResourceKind::DEFINITIONAL
            .into_iter()
            .map(|kind| (kind, KindPolicy::DEFINITIONAL))
            .collect();
        Self { policies }
    }
}

impl KindRegistry {
    /// An empty registry; nothing is followed.
    pub fn empty() -> Self {
        Self {
            policies: IndexMap::new(),
        }
    }

    pub fn from_options(options: &ExportOptions) -> Self {
        let registry = Self::default();
        if options.include_nested_plan_definitions {
            registry
        } else {
            registry.without_nested_plan_definitions()
        }
    }

    /// Adds or replaces the policy of a kind.
    pub fn with_kind(mut self, kind: ResourceKind, policy: KindPolicy) -> Self {
        self.policies.insert(kind, policy);
        self
    }

    /// Stops following PlanDefinitions reached from the root.
    pub fn without_nested_plan_definitions(self) -> Self {
        self.with_kind(ResourceKind::PlanDefinition, KindPolicy::IGNORED)
    }

    pub fn policy(&self, kind: &ResourceKind) -> Option<KindPolicy> {
        self.policies.get(kind).copied()
    }

    pub fn is_followed(&self, kind: &ResourceKind) -> bool {
        self.policy(kind).is_some_and(|p| p.follow)
    }

    /// Listed in the table at all, followed or not. A root must be registered.
    pub fn is_registered(&self, kind: &ResourceKind) -> bool {
        self.policies.contains_key(kind)
    }

    /// Kinds searched by canonical URL, in registry order.
    pub fn canonical_search_kinds(&self) -> impl Iterator<Item = &ResourceKind> {
        self.policies
            .iter()
            .filter(|(_, policy)| policy.canonical_search)
            .map(|(kind, _)| kind)
    }
}

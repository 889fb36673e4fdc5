//! The identifier mapping sidecar written next to exported batches.

use indexmap::IndexMap;
use octofhir_core::ResourceKind;
use serde::{Deserialize, Serialize};

use crate::identity::StableIdentity;

/// Kind and stable identity behind one marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedIdentity {
    #[serde(rename = "resourceType")]
    pub resource_type: ResourceKind,
    pub identifier: StableIdentity,
}

/// `{ marker: { resourceType, identifier: { system, value } } }`, in packing order.
///
/// Lets a resolution pass find a replayed resource by identity when the
/// replay response does not echo its marker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentifierMapping(IndexMap<String, MappedIdentity>);

impl IdentifierMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, marker: impl Into<String>, kind: ResourceKind, identity: StableIdentity) {
        self.0.insert(
            marker.into(),
            MappedIdentity {
                resource_type: kind,
                identifier: identity,
            },
        );
    }

    pub fn get(&self, marker: &str) -> Option<&MappedIdentity> {
        self.0.get(marker)
    }

    pub fn contains(&self, marker: &str) -> bool {
        self.0.contains_key(marker)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MappedIdentity)> {
        self.0.iter()
    }

    /// Adds every entry of `other`, keeping existing entries.
    pub fn merge(&mut self, other: IdentifierMapping) {
        for (marker, mapped) in other.0 {
            self.0.entry(marker).or_insert(mapped);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_shape() {
        let mut mapping = IdentifierMapping::new();
        mapping.insert(
            "urn:uuid:b",
            ResourceKind::Questionnaire,
            StableIdentity::new("http://octofhir.io/fhir/export/Questionnaire", "q1"),
        );
        mapping.insert(
            "urn:uuid:a",
            ResourceKind::PlanDefinition,
            StableIdentity::new("http://octofhir.io/fhir/export/PlanDefinition", "p1"),
        );

        let value = serde_json::to_value(&mapping).unwrap();
        assert_eq!(
            value,
            json!({
                "urn:uuid:b": {
                    "resourceType": "Questionnaire",
                    "identifier": {"system": "http://octofhir.io/fhir/export/Questionnaire", "value": "q1"}
                },
                "urn:uuid:a": {
                    "resourceType": "PlanDefinition",
                    "identifier": {"system": "http://octofhir.io/fhir/export/PlanDefinition", "value": "p1"}
                }
            })
        );

        let text = serde_json::to_string(&mapping).unwrap();
        assert!(text.find("urn:uuid:b").unwrap() < text.find("urn:uuid:a").unwrap());

        let back: IdentifierMapping = serde_json::from_value(value).unwrap();
        assert_eq!(back, mapping);
    }

    #[test]
    fn test_merge_keeps_first() {
        let mut a = IdentifierMapping::new();
        a.insert("urn:uuid:1", ResourceKind::Library, StableIdentity::new("s", "first"));
        let mut b = IdentifierMapping::new();
        b.insert("urn:uuid:1", ResourceKind::Library, StableIdentity::new("s", "second"));
        b.insert("urn:uuid:2", ResourceKind::ValueSet, StableIdentity::new("s", "v"));

        a.merge(b);
        assert_eq!(a.len(), 2);
        assert_eq!(a.get("urn:uuid:1").unwrap().identifier.value, "first");
        assert!(a.contains("urn:uuid:2"));
    }
}

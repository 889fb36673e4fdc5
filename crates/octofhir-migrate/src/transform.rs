//! Rewriting of embedded references to batch-local markers.

use indexmap::IndexMap;
use octofhir_core::{is_marker, to_marker};
use serde_json::Value;

use crate::fields::{ReferenceField, rewrite_references};
use crate::reference::{ReferenceClass, ReferenceClassifier};

/// Replaces every reference whose Closure key has a surrogate id with the
/// marker of that surrogate.
///
/// Returns the references that were left as they were: unparseable values
/// (contained, URN) are skipped silently and not returned.
pub fn rewrite_to_markers(
    resource: &mut Value,
    closure: &IndexMap<String, String>,
    classifier: &ReferenceClassifier,
) -> Vec<ReferenceField> {
    let mut kept = Vec::new();
    rewrite_references(resource, |field| {
        if is_marker(&field.value) {
            return None;
        }
        let (class, key) = classifier.classify_keyed(&field.value);
        if matches!(class, ReferenceClass::Unparseable(_)) {
            return None;
        }
        match closure.get(&key) {
            Some(surrogate) => Some(to_marker(surrogate)),
            None => {
                kept.push(field.clone());
                None
            }
        }
    });
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn closure() -> IndexMap<String, String> {
        IndexMap::from([
            ("Questionnaire/q1".to_string(), "s-q1".to_string()),
            ("http://x.org/Library/core".to_string(), "s-lib".to_string()),
        ])
    }

    #[test]
    fn test_known_references_become_markers() {
        let classifier = ReferenceClassifier::new("http://octofhir.io/fhir");
        let mut plan = json!({
            "resourceType": "PlanDefinition",
            "library": ["http://x.org/Library/core|1.2"],
            "action": [
                {"definitionCanonical": "Questionnaire/q1/_history/4"},
                {"transform": "https://x/StructureMap/s1"},
                {"participant": [{"typeReference": {"reference": "#local"}}]}
            ]
        });

        let kept = rewrite_to_markers(&mut plan, &closure(), &classifier);

        assert_eq!(plan["library"][0], "urn:uuid:s-lib");
        assert_eq!(plan["action"][0]["definitionCanonical"], "urn:uuid:s-q1");
        assert_eq!(plan["action"][1]["transform"], "https://x/StructureMap/s1");
        assert_eq!(
            plan["action"][2]["participant"][0]["typeReference"]["reference"],
            "#local"
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].path, "action[1].transform");
    }

    #[test]
    fn test_existing_markers_are_left_alone() {
        let classifier = ReferenceClassifier::new("http://octofhir.io/fhir");
        let mut body = json!({"library": ["urn:uuid:already"]});
        let kept = rewrite_to_markers(&mut body, &closure(), &classifier);
        assert!(kept.is_empty());
        assert_eq!(body["library"][0], "urn:uuid:already");
    }
}

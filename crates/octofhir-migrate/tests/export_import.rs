//! End-to-end tests for closure export and replay.
//!
//! Both ends are in-memory stores, so the tests cover the whole path:
//! discovery, rewriting, packing, replay and post-import resolution.

use octofhir_core::is_marker;
use octofhir_db_memory::InMemoryStore;
use octofhir_migrate::fields::collect_references;
use octofhir_migrate::{
    ExportIssueKind, ExportOptions, ExportResult, ReferenceClassifier, export, replay,
};
use serde_json::{Value, json};

// =============================================================================
// Test Infrastructure
// =============================================================================

fn source(resources: Vec<Value>) -> InMemoryStore {
    InMemoryStore::from_resources(resources).expect("seed source store")
}

fn packed(result: &ExportResult) -> Vec<Value> {
    result
        .entries()
        .map(|e| e.resource.clone().expect("entry resource"))
        .collect()
}

fn kinds(result: &ExportResult) -> Vec<String> {
    packed(result)
        .iter()
        .map(|r| r["resourceType"].as_str().unwrap_or_default().to_string())
        .collect()
}

/// A plan with a questionnaire, an activity, a library with its value set, and
/// a second spelling of the questionnaire through its canonical url.
fn care_plan_source() -> InMemoryStore {
    source(vec![
        json!({
            "resourceType": "PlanDefinition",
            "id": "p1",
            "name": "Diabetes follow-up",
            "url": "http://x.org/PlanDefinition/diabetes",
            "library": ["http://x.org/Library/rules|3"],
            "action": [
                {"definitionCanonical": "Questionnaire/q1"},
                {"definitionCanonical": "ActivityDefinition/a1"},
                {
                    "definitionCanonical": "http://x.org/Questionnaire/intake",
                    "relatedArtifact": [{"type": "depends-on", "resource": "http://x.org/Library/rules"}]
                }
            ]
        }),
        json!({
            "resourceType": "Questionnaire",
            "id": "q1",
            "url": "http://x.org/Questionnaire/intake",
            "item": [{"linkId": "1", "type": "choice", "answerValueSet": "http://x.org/ValueSet/yes-no"}]
        }),
        json!({
            "resourceType": "ActivityDefinition",
            "id": "a1",
            "name": "Call patient",
            "library": ["Library/l1"]
        }),
        json!({
            "resourceType": "Library",
            "id": "l1",
            "url": "http://x.org/Library/rules",
            "version": "3",
            "meta": {"versionId": "12", "lastUpdated": "2024-01-01T00:00:00Z"},
            "relatedArtifact": [{"type": "depends-on", "resource": "http://x.org/ValueSet/yes-no"}]
        }),
        json!({
            "resourceType": "ValueSet",
            "id": "v1",
            "url": "http://x.org/ValueSet/yes-no"
        }),
    ])
}

// =============================================================================
// Export
// =============================================================================

#[tokio::test]
async fn missing_canonical_target_is_reported_and_left_in_place() {
    let store = source(vec![
        json!({
            "resourceType": "PlanDefinition",
            "id": "p1",
            "action": [
                {"definitionCanonical": "Questionnaire/q1"},
                {"transform": "https://x/StructureMap/s1"}
            ]
        }),
        json!({"resourceType": "Questionnaire", "id": "q1"}),
    ]);

    let result = export(&store, "PlanDefinition/p1", ExportOptions::default())
        .await
        .unwrap();

    assert_eq!(result.bundles.len(), 1);
    assert_eq!(kinds(&result), vec!["Questionnaire", "PlanDefinition"]);

    let entries: Vec<_> = result.entries().collect();
    let questionnaire_marker = entries[0].full_url.clone().unwrap();
    let plan = entries[1].resource.as_ref().unwrap();
    assert_eq!(plan["action"][0]["definitionCanonical"], questionnaire_marker.as_str());
    assert_eq!(plan["action"][1]["transform"], "https://x/StructureMap/s1");

    let missing: Vec<_> = result.report.not_found().collect();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].reference, "https://x/StructureMap/s1");
    assert_eq!(missing[0].path, "action[1].transform");
}

#[tokio::test]
async fn closure_is_complete_and_every_internal_reference_is_a_marker() {
    let store = care_plan_source();
    let options = ExportOptions::default();
    let classifier = ReferenceClassifier::new(options.generated_base());

    let result = export(&store, "PlanDefinition/p1", options).await.unwrap();

    assert_eq!(
        kinds(&result),
        vec!["ValueSet", "Library", "Questionnaire", "ActivityDefinition", "PlanDefinition"]
    );
    assert!(result.report.is_empty(), "{:?}", result.report);

    let markers: Vec<String> = result
        .entries()
        .map(|e| e.full_url.clone().unwrap())
        .collect();
    for body in packed(&result) {
        for field in collect_references(&body) {
            if is_marker(&field.value) {
                assert!(markers.contains(&field.value), "dangling marker {}", field.value);
                continue;
            }
            let (_, key) = classifier.classify_keyed(&field.value);
            assert!(
                !result.closure.contains_key(&key),
                "{} at {} was not rewritten",
                field.value,
                field.path
            );
        }
    }
}

#[tokio::test]
async fn dependencies_precede_dependents() {
    let result = export(&care_plan_source(), "PlanDefinition/p1", ExportOptions::default())
        .await
        .unwrap();

    let order = kinds(&result);
    let position = |kind: &str| order.iter().position(|k| k == kind).unwrap();
    assert!(position("ValueSet") < position("Library"));
    assert!(position("ValueSet") < position("Questionnaire"));
    assert!(position("Library") < position("ActivityDefinition"));
    assert_eq!(order.last().map(String::as_str), Some("PlanDefinition"));
}

#[tokio::test]
async fn volatile_metadata_and_ids_are_removed() {
    let result = export(&care_plan_source(), "PlanDefinition/p1", ExportOptions::default())
        .await
        .unwrap();

    for body in packed(&result) {
        assert!(body.get("id").is_none(), "{body}");
        if let Some(meta) = body.get("meta") {
            assert!(meta.get("versionId").is_none());
            assert!(meta.get("lastUpdated").is_none());
        }
        let identifier = &body["identifier"][0];
        assert!(identifier["system"].as_str().is_some());
        assert!(identifier["value"].as_str().is_some());
    }
}

#[tokio::test]
async fn cycles_terminate_with_each_resource_once() {
    let store = source(vec![
        json!({"resourceType": "Library", "id": "a", "relatedArtifact": [{"resource": "Library/b"}]}),
        json!({"resourceType": "Library", "id": "b", "relatedArtifact": [{"resource": "Library/a"}]}),
    ]);

    let result = export(&store, "Library/a", ExportOptions::default())
        .await
        .unwrap();

    assert_eq!(result.resource_count, 2);
    assert!(result.report.is_empty());
    let bodies = packed(&result);
    let markers: Vec<String> = result
        .entries()
        .map(|e| e.full_url.clone().unwrap())
        .collect();
    // b is completed first; its back-edge to a still gets a's marker
    assert_eq!(bodies[0]["relatedArtifact"][0]["resource"], markers[1].as_str());
    assert_eq!(bodies[1]["relatedArtifact"][0]["resource"], markers[0].as_str());
}

#[tokio::test]
async fn bundles_respect_the_entry_limit() {
    let mut resources = Vec::new();
    for i in 0..7 {
        let next = if i < 6 {
            json!([{"resource": format!("Library/l{}", i + 1)}])
        } else {
            json!([])
        };
        resources.push(json!({"resourceType": "Library", "id": format!("l{i}"), "relatedArtifact": next}));
    }
    let store = source(resources);

    let result = export(&store, "Library/l0", ExportOptions::default().with_max_entries(3))
        .await
        .unwrap();

    assert_eq!(result.resource_count, 7);
    assert_eq!(result.bundles.len(), 3);
    let sizes: Vec<_> = result.bundles.iter().map(|b| b.len()).collect();
    assert_eq!(sizes, vec![3, 3, 1]);
}

#[tokio::test]
async fn repeated_exports_produce_the_same_identities() {
    let store = care_plan_source();

    let first = export(&store, "PlanDefinition/p1", ExportOptions::default())
        .await
        .unwrap();
    let second = export(&store, "PlanDefinition/p1", ExportOptions::default())
        .await
        .unwrap();

    let identities = |result: &ExportResult| -> Vec<String> {
        result
            .mapping
            .iter()
            .map(|(_, mapped)| format!("{}:{}", mapped.resource_type, mapped.identifier.token()))
            .collect()
    };
    assert_eq!(identities(&first), identities(&second));

    let requests = |result: &ExportResult| -> Vec<String> {
        result
            .entries()
            .map(|e| e.request.as_ref().unwrap().url.clone())
            .collect()
    };
    assert_eq!(requests(&first), requests(&second));
}

#[tokio::test]
async fn disallowed_references_are_reported_not_followed() {
    let store = source(vec![
        json!({
            "resourceType": "PlanDefinition",
            "id": "p1",
            "action": [{"participant": [{"typeReference": {"reference": "Practitioner/dr1"}}]}]
        }),
        json!({"resourceType": "Practitioner", "id": "dr1"}),
    ]);

    let result = export(&store, "PlanDefinition/p1", ExportOptions::default())
        .await
        .unwrap();

    assert_eq!(result.resource_count, 1);
    assert!(matches!(
        result.report.issues[0].kind,
        ExportIssueKind::Disallowed(_)
    ));
}

// =============================================================================
// Export then replay
// =============================================================================

#[tokio::test]
async fn replay_resolves_every_reference_in_the_destination() {
    let result = export(&care_plan_source(), "PlanDefinition/p1", ExportOptions::default())
        .await
        .unwrap();
    let destination = InMemoryStore::new();

    let report = replay(&destination, &result.bundles, &result.mapping)
        .await
        .unwrap();

    assert!(report.is_clean(), "{report:?}");
    assert_eq!(destination.len().await, result.resource_count);

    let plan = destination.resources_of("PlanDefinition").await.remove(0);
    let library = destination.resources_of("Library").await.remove(0);
    let questionnaire = destination.resources_of("Questionnaire").await.remove(0);

    assert_eq!(
        plan["library"][0],
        format!("Library/{}", library["id"].as_str().unwrap())
    );
    let questionnaire_ref = format!("Questionnaire/{}", questionnaire["id"].as_str().unwrap());
    assert_eq!(plan["action"][0]["definitionCanonical"], questionnaire_ref.as_str());
    assert_eq!(plan["action"][2]["definitionCanonical"], questionnaire_ref.as_str());

    for resource in [&plan, &library, &questionnaire] {
        for field in collect_references(resource) {
            assert!(!is_marker(&field.value), "{} left at {}", field.value, field.path);
        }
    }
}

#[tokio::test]
async fn replaying_twice_does_not_duplicate() {
    let result = export(&care_plan_source(), "PlanDefinition/p1", ExportOptions::default())
        .await
        .unwrap();
    let destination = InMemoryStore::new();

    replay(&destination, &result.bundles, &result.mapping)
        .await
        .unwrap();
    let count = destination.len().await;

    let again = export(&care_plan_source(), "PlanDefinition/p1", ExportOptions::default())
        .await
        .unwrap();
    let report = replay(&destination, &again.bundles, &again.mapping)
        .await
        .unwrap();

    assert!(report.is_clean(), "{report:?}");
    assert_eq!(destination.len().await, count);
}

#[tokio::test]
async fn replay_across_several_bundles() {
    let result = export(
        &care_plan_source(),
        "PlanDefinition/p1",
        ExportOptions::default().with_max_entries(2),
    )
    .await
    .unwrap();
    assert_eq!(result.bundles.len(), 3);

    let destination = InMemoryStore::new();
    let report = replay(&destination, &result.bundles, &result.mapping)
        .await
        .unwrap();

    assert_eq!(report.batches, 3);
    assert!(report.is_clean(), "{report:?}");

    let activity = destination.resources_of("ActivityDefinition").await.remove(0);
    let library = destination.resources_of("Library").await.remove(0);
    assert_eq!(
        activity["library"][0],
        format!("Library/{}", library["id"].as_str().unwrap())
    );
}

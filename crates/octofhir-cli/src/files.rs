//! Batch files and the mapping sidecar on disk.
//!
//! One batch is written to `FILE`; several go to `FILE-part1.json`,
//! `FILE-part2.json`, ... The sidecar is always `FILE-mapping.json`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use octofhir_migrate::{ExportResult, IdentifierMapping};
use octofhir_storage::Bundle;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const MAPPING_NOTE: &str = "Maps bundle fullUrl markers to the stable identifier of each resource. \
     Used after import to resolve references the server left as urn:uuid markers.";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MappingFile {
    full_url_to_identifier: IdentifierMapping,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    note: Option<String>,
}

fn stem_and_ext(path: &Path) -> (String, String) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "bundle".into());
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "json".into());
    (stem, ext)
}

fn strip_part_suffix(stem: &str) -> &str {
    match stem.rsplit_once("-part") {
        Some((base, n)) if !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()) => base,
        _ => stem,
    }
}

fn sibling(path: &Path, name: String) -> PathBuf {
    match path.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

pub fn bundle_paths(output: &Path, count: usize) -> Vec<PathBuf> {
    if count <= 1 {
        return vec![output.to_path_buf()];
    }
    let (stem, ext) = stem_and_ext(output);
    (1..=count)
        .map(|i| sibling(output, format!("{stem}-part{i}.{ext}")))
        .collect()
}

/// Sidecar path for an output file or any of its part files.
pub fn mapping_path(bundle: &Path) -> PathBuf {
    let (stem, ext) = stem_and_ext(bundle);
    sibling(bundle, format!("{}-mapping.{ext}", strip_part_suffix(&stem)))
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

pub fn read_json(path: &Path) -> Result<Value> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Writes every batch and the sidecar. Returns the batch paths and the sidecar path.
pub fn write_export(output: &Path, result: &ExportResult) -> Result<(Vec<PathBuf>, PathBuf)> {
    let paths = bundle_paths(output, result.bundles.len());
    for (path, bundle) in paths.iter().zip(&result.bundles) {
        write_json(path, bundle)?;
    }
    let sidecar = mapping_path(output);
    write_json(
        &sidecar,
        &MappingFile {
            full_url_to_identifier: result.mapping.clone(),
            note: Some(MAPPING_NOTE.to_string()),
        },
    )?;
    Ok((paths, sidecar))
}

pub fn read_bundle(path: &Path) -> Result<Bundle> {
    let value = read_json(path)?;
    serde_json::from_value(value)
        .with_context(|| format!("{} is not a FHIR Bundle", path.display()))
}

/// Reads a sidecar, either the wrapped form written by `export` or a bare
/// marker-to-identity object.
pub fn read_mapping(path: &Path) -> Result<IdentifierMapping> {
    let mut value = read_json(path)?;
    let inner = match value.get_mut("fullUrlToIdentifier") {
        Some(inner) => inner.take(),
        None => value,
    };
    serde_json::from_value(inner)
        .with_context(|| format!("{} is not a mapping file", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_core::ResourceKind;
    use octofhir_migrate::StableIdentity;
    use serde_json::json;

    #[test]
    fn test_bundle_paths() {
        let output = Path::new("out/plan.json");
        assert_eq!(bundle_paths(output, 1), vec![PathBuf::from("out/plan.json")]);
        assert_eq!(
            bundle_paths(output, 3),
            vec![
                PathBuf::from("out/plan-part1.json"),
                PathBuf::from("out/plan-part2.json"),
                PathBuf::from("out/plan-part3.json"),
            ]
        );
    }

    #[test]
    fn test_mapping_path_is_shared_by_parts() {
        assert_eq!(mapping_path(Path::new("plan.json")), PathBuf::from("plan-mapping.json"));
        assert_eq!(
            mapping_path(Path::new("out/plan-part2.json")),
            PathBuf::from("out/plan-mapping.json")
        );
        assert_eq!(
            mapping_path(Path::new("my-partner.json")),
            PathBuf::from("my-partner-mapping.json")
        );
    }

    #[test]
    fn test_mapping_round_trip_through_wrapper() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan-mapping.json");
        let mut mapping = IdentifierMapping::new();
        mapping.insert(
            "urn:uuid:s1",
            ResourceKind::Questionnaire,
            StableIdentity::new("http://octofhir.io/fhir/export/Questionnaire", "q1"),
        );
        write_json(
            &path,
            &MappingFile {
                full_url_to_identifier: mapping.clone(),
                note: Some(MAPPING_NOTE.into()),
            },
        )
        .unwrap();

        let written = read_json(&path).unwrap();
        assert_eq!(
            written["fullUrlToIdentifier"]["urn:uuid:s1"]["resourceType"],
            "Questionnaire"
        );
        assert_eq!(read_mapping(&path).unwrap(), mapping);
    }

    #[test]
    fn test_bare_mapping_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bare.json");
        fs::write(
            &path,
            json!({
                "urn:uuid:s1": {
                    "resourceType": "Library",
                    "identifier": {"system": "http://x.org/export/Library", "value": "core"}
                }
            })
            .to_string(),
        )
        .unwrap();

        let mapping = read_mapping(&path).unwrap();
        assert_eq!(mapping.get("urn:uuid:s1").unwrap().identifier.value, "core");
    }

    #[test]
    fn test_read_bundle_rejects_non_bundles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.json");
        fs::write(&path, r#"{"resourceType": "Patient"}"#).unwrap();
        assert!(read_bundle(&path).is_err());
    }
}

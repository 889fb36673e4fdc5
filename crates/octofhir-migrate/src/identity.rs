//! Stable identity assignment and metadata cleanup.

use std::sync::LazyLock;

use octofhir_core::ResourceKind;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use crate::error::{MigrateError, Result};
use crate::reference::ReferenceClassifier;

/// `meta` members assigned by the source server.
pub const VOLATILE_META_FIELDS: [&str; 6] = [
    "lastUpdated",
    "versionId",
    "author",
    "compartment",
    "project",
    "source",
];

static NON_SLUG_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^a-z0-9]+").expect("slug pattern is valid")
});

/// The identifier a resource is upserted by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StableIdentity {
    pub system: String,
    pub value: String,
}

impl StableIdentity {
    pub fn new(system: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            value: value.into(),
        }
    }

    /// `system|value`, the token form of an identifier search.
    pub fn token(&self) -> String {
        format!("{}|{}", self.system, self.value)
    }
}

/// First identifier that carries both a system and a value.
pub fn existing_identity(resource: &Value) -> Option<StableIdentity> {
    let identifiers = match resource.get("identifier")? {
        Value::Array(items) => items.as_slice(),
        single @ Value::Object(_) => std::slice::from_ref(single),
        _ => return None,
    };
    identifiers.iter().find_map(|identifier| {
        let system = identifier.get("system")?.as_str().filter(|s| !s.is_empty())?;
        let value = identifier.get("value")?.as_str().filter(|s| !s.is_empty())?;
        Some(StableIdentity::new(system, value))
    })
}

/// Lowercases and collapses every run of non-alphanumerics into `-`.
pub fn slugify(text: &str) -> String {
    NON_SLUG_CHARS
        .replace_all(&text.to_lowercase(), "-")
        .into_owned()
}

/// Derives the stable value of a resource: its natural id when it has one,
/// otherwise a digest of its slugified name, title or kind.
pub fn stable_value(resource: &Value, kind: &ResourceKind) -> String {
    if let Some(id) = resource
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
    {
        return id.to_string();
    }

    let basis = ["name", "title"]
        .iter()
        .find_map(|field| {
            resource
                .get(*field)
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
        })
        .unwrap_or(kind.as_str());

    let digest = Sha256::digest(slugify(basis).as_bytes());
    hex::encode(digest)[..16].to_string()
}

/// Removes server-assigned `meta` members; drops `meta` when nothing is left.
pub fn strip_volatile_metadata(resource: &mut Value) {
    let Some(obj) = resource.as_object_mut() else {
        return;
    };
    let now_empty = match obj.get_mut("meta").and_then(Value::as_object_mut) {
        Some(meta) => {
            for field in VOLATILE_META_FIELDS {
                meta.shift_remove(field);
            }
            meta.is_empty()
        }
        None => false,
    };
    if now_empty {
        obj.shift_remove("meta");
    }
}

/// Gives `resource` a durable natural identity and detaches it from its source.
///
/// An existing identifier with system and value is kept as is; otherwise one
/// is appended under `{base}/export/{Kind}`. Definitional kinds without a
/// `url` get `{base}/{Kind}/{stableValue}`. The natural `id` is always removed.
pub fn ensure_identity(
    resource: &mut Value,
    kind: &ResourceKind,
    names: &ReferenceClassifier,
    clean_metadata: bool,
) -> Result<StableIdentity> {
    if !resource.is_object() {
        return Err(MigrateError::malformed(format!(
            "{kind} resource is not a JSON object"
        )));
    }
    if clean_metadata {
        strip_volatile_metadata(resource);
    }

    let identity = match existing_identity(resource) {
        Some(identity) => identity,
        None => {
            let identity =
                StableIdentity::new(names.identifier_system(kind), stable_value(resource, kind));
            append_identifier(resource, &identity);
            identity
        }
    };

    if let Some(obj) = resource.as_object_mut() {
        let has_url = obj
            .get("url")
            .and_then(Value::as_str)
            .is_some_and(|url| !url.is_empty());
        if !has_url && kind.is_definitional() {
            obj.insert(
                "url".to_string(),
                Value::String(names.generated_canonical(kind, &identity.value)),
            );
        }
        obj.shift_remove("id");
    }

    Ok(identity)
}

fn append_identifier(resource: &mut Value, identity: &StableIdentity) {
    let entry = json!({"system": identity.system, "value": identity.value});
    let Some(obj) = resource.as_object_mut() else {
        return;
    };
    match obj.get_mut("identifier") {
        Some(Value::Array(items)) => items.push(entry),
        Some(existing @ Value::Object(_)) => {
            let previous = existing.take();
            *existing = Value::Array(vec![previous, entry]);
        }
        _ => {
            obj.insert("identifier".to_string(), Value::Array(vec![entry]));
        }
    }
}

//! FHIR Reference parsing utilities.
//!
//! This module parses the reference strings found inside resource bodies into
//! their component parts (resource type, ID, and optional version), and
//! provides the canonical-URL helpers the migration tooling needs.
//!
//! # Reference Formats
//!
//! - Relative: `Questionnaire/123`
//! - Versioned: `Questionnaire/123/_history/1`
//! - Absolute URL: `http://example.org/fhir/Questionnaire/123`
//! - Canonical with version: `http://example.org/Questionnaire/intake|2.0`
//! - Contained: `#contained-id` (cannot be resolved externally)
//! - URN: `urn:uuid:xxx` or `urn:oid:xxx` (cannot be resolved externally)
//!
//! # Example
//!
//! ```
//! use octofhir_core::fhir_reference::{parse_reference, trailing_reference};
//!
//! let reference = parse_reference("Questionnaire/123").unwrap();
//! assert_eq!(reference.resource_type, "Questionnaire");
//! assert_eq!(reference.id, "123");
//!
//! let reference = trailing_reference("https://x.org/fhir/StructureMap/s1").unwrap();
//! assert_eq!(reference.to_relative(), "StructureMap/s1");
//! ```

use std::fmt;

use url::form_urlencoded;

use crate::fhir::is_valid_resource_type_name;
use crate::id::validate_id;

/// A successfully parsed FHIR reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FhirReference {
    /// The resource type (e.g., "Questionnaire", "Library")
    pub resource_type: String,
    /// The resource ID
    pub id: String,
    /// Optional version ID from `_history` suffix
    pub version: Option<String>,
}

impl FhirReference {
    /// Creates a new FhirReference.
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            version: None,
        }
    }

    /// Returns the reference as a relative string (Type/id).
    pub fn to_relative(&self) -> String {
        format!("{}/{}", self.resource_type, self.id)
    }
}

impl fmt::Display for FhirReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_relative())
    }
}

/// Represents a reference that cannot be resolved against a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvableReference {
    /// A contained reference (starts with `#`)
    Contained(String),
    /// A URN reference (`urn:uuid:xxx` or `urn:oid:xxx`)
    Urn(String),
    /// A malformed or invalid reference
    Invalid(String),
}

impl UnresolvableReference {
    /// Contained and URN references are local by construction and never worth reporting.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Contained(_) | Self::Urn(_))
    }
}

impl fmt::Display for UnresolvableReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contained(id) => write!(f, "contained reference: #{id}"),
            Self::Urn(urn) => write!(f, "URN reference: {urn}"),
            Self::Invalid(reason) => write!(f, "invalid reference: {reason}"),
        }
    }
}

impl std::error::Error for UnresolvableReference {}

/// Parse a relative FHIR reference string (`Type/id` or `Type/id/_history/v`).
///
/// Absolute URLs are rejected as invalid here; use [`trailing_reference`] to look
/// for a `Type/id` pair at the end of a URL.
pub fn parse_reference(reference: &str) -> Result<FhirReference, UnresolvableReference> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(UnresolvableReference::Invalid("empty reference".to_string()));
    }

    if let Some(contained_id) = reference.strip_prefix('#') {
        return Err(UnresolvableReference::Contained(contained_id.to_string()));
    }

    if reference.starts_with("urn:") {
        return Err(UnresolvableReference::Urn(reference.to_string()));
    }

    if is_absolute_url(reference) {
        return Err(UnresolvableReference::Invalid(format!(
            "absolute URL is not a relative reference: {reference}"
        )));
    }

    let parts: Vec<&str> = reference.split('/').collect();
    if parts.len() < 2 {
        return Err(UnresolvableReference::Invalid(format!(
            "reference must contain at least Type/id: {reference}"
        )));
    }

    let resource_type = parts[0];
    let id = parts[1];

    if !is_valid_resource_type_name(resource_type) {
        return Err(UnresolvableReference::Invalid(format!(
            "not a resource type: {resource_type}"
        )));
    }

    if let Err(reason) = validate_id(id) {
        return Err(UnresolvableReference::Invalid(reason.to_string()));
    }

    let version = match parts.as_slice() {
        [_, _] => None,
        [_, _, "_history", v] if !v.is_empty() => Some(v.to_string()),
        _ => {
            return Err(UnresolvableReference::Invalid(format!(
                "unexpected path segments: {reference}"
            )));
        }
    };

    Ok(FhirReference {
        resource_type: resource_type.to_string(),
        id: id.to_string(),
        version,
    })
}

/// Returns true for strings carrying a URL scheme separator.
pub fn is_absolute_url(value: &str) -> bool {
    value.contains("://")
}

/// Splits `url|version` into its parts.
pub fn split_canonical_version(canonical: &str) -> (&str, Option<&str>) {
    match canonical.split_once('|') {
        Some((url, version)) if !version.is_empty() => (url, Some(version)),
        Some((url, _)) => (url, None),
        None => (canonical, None),
    }
}

/// Looks for a `(PascalCaseType, id)` pair in the last two path segments of a URL.
pub fn trailing_reference(url: &str) -> Option<FhirReference> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let mut segments = path.trim_end_matches('/').rsplit('/');
    let id = segments.next()?;
    let resource_type = segments.next()?;

    if is_valid_resource_type_name(resource_type) && validate_id(id).is_ok() {
        Some(FhirReference::new(resource_type, id))
    } else {
        None
    }
}

/// Percent-encodes a value for use as a single URL path segment.
///
/// Spaces become `%20`; a `+` in a path is a literal plus.
pub fn encode_path_segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Reverses [`encode_path_segment`]. Malformed escapes are kept verbatim.
pub fn decode_path_segment(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

/// Form-encodes a search parameter value for a query string.
pub fn encode_query_value(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

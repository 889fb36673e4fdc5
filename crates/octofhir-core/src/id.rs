//! Resource ids and migration-local surrogate markers.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Prefix of a batch-local marker (`urn:uuid:{surrogate}`).
pub const MARKER_PREFIX: &str = "urn:uuid:";

static ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9\-.]{1,64}$").expect("static id pattern"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("ID must not be empty")]
    Empty,
    #[error("ID is longer than 64 characters: {0}")]
    TooLong(String),
    #[error("ID contains characters outside [A-Za-z0-9-.]: {0}")]
    InvalidCharacters(String),
}

/// Mints a fresh surrogate id.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Checks an id against the FHIR `id` datatype rules.
pub fn validate_id(id: &str) -> Result<(), IdError> {
    if id.is_empty() {
        return Err(IdError::Empty);
    }
    if id.len() > 64 {
        return Err(IdError::TooLong(id.to_string()));
    }
    if !ID_PATTERN.is_match(id) {
        return Err(IdError::InvalidCharacters(id.to_string()));
    }
    Ok(())
}

/// Wraps a surrogate id into a batch-local marker.
pub fn to_marker(surrogate_id: &str) -> String {
    format!("{MARKER_PREFIX}{surrogate_id}")
}

/// Returns true if the value is a batch-local marker.
pub fn is_marker(value: &str) -> bool {
    value.starts_with(MARKER_PREFIX)
}

/// Extracts the surrogate id from a marker.
pub fn marker_id(value: &str) -> Option<&str> {
    value
        .strip_prefix(MARKER_PREFIX)
        .filter(|rest| !rest.is_empty())
}

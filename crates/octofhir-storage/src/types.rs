//! Storage types for the resource store abstraction layer.
//!
//! This module defines the search parameters and the transaction `Bundle`
//! wire types exchanged with a store.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parameters for a search query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    /// Search parameters as key-value pairs, in insertion order.
    /// Multiple values for the same key represent OR conditions.
    pub parameters: IndexMap<String, Vec<String>>,
    /// Maximum number of results to return.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
}

impl SearchParams {
    /// Creates new empty `SearchParams`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a search parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters
            .entry(key.into())
            .or_default()
            .push(value.into());
        self
    }

    /// Sets the count parameter.
    #[must_use]
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    /// Returns the first value of a parameter.
    #[must_use]
    pub fn first(&self, key: &str) -> Option<&str> {
        self.parameters
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Flattens the parameters into query pairs (`_count` last).
    #[must_use]
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .parameters
            .iter()
            .flat_map(|(key, values)| values.iter().map(move |v| (key.clone(), v.clone())))
            .collect();
        if let Some(count) = self.count {
            pairs.push(("_count".to_string(), count.to_string()));
        }
        pairs
    }

    /// Returns true if this search has no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

/// The `type` of a FHIR Bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BundleType {
    Transaction,
    TransactionResponse,
    Batch,
    BatchResponse,
    Searchset,
    Collection,
}

/// HTTP verb of a bundle entry request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Delete,
}

impl std::fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Put => write!(f, "PUT"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

/// A FHIR Bundle as submitted to or returned by a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    #[serde(default = "bundle_resource_type")]
    pub resource_type: String,
    #[serde(rename = "type")]
    pub bundle_type: BundleType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entry: Vec<BundleEntry>,
}

fn bundle_resource_type() -> String {
    "Bundle".to_string()
}

impl Bundle {
    /// Creates a bundle of the given type.
    #[must_use]
    pub fn new(bundle_type: BundleType, entry: Vec<BundleEntry>) -> Self {
        Self {
            resource_type: bundle_resource_type(),
            bundle_type,
            entry,
        }
    }

    /// Creates a `transaction` bundle.
    #[must_use]
    pub fn transaction(entry: Vec<BundleEntry>) -> Self {
        Self::new(BundleType::Transaction, entry)
    }

    /// Returns the number of entries in this bundle.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entry.len()
    }

    /// Returns true if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entry.is_empty()
    }
}

/// One entry of a Bundle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<BundleRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<BundleResponse>,
}

impl BundleEntry {
    /// The `resourceType` of the entry resource, if any.
    #[must_use]
    pub fn resource_type(&self) -> Option<&str> {
        self.resource
            .as_ref()
            .and_then(|r| r.get("resourceType"))
            .and_then(Value::as_str)
    }

    /// The `id` of the entry resource, if any.
    #[must_use]
    pub fn resource_id(&self) -> Option<&str> {
        self.resource
            .as_ref()
            .and_then(|r| r.get("id"))
            .and_then(Value::as_str)
    }
}

/// The request part of a transaction entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleRequest {
    pub method: HttpVerb,
    pub url: String,
}

impl BundleRequest {
    #[must_use]
    pub fn new(method: HttpVerb, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
        }
    }
}

/// The response part of a transaction-response entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Value>,
}

impl BundleResponse {
    #[must_use]
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            location: None,
            outcome: None,
        }
    }

    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    #[must_use]
    pub fn with_outcome(mut self, outcome: Value) -> Self {
        self.outcome = Some(outcome);
        self
    }

    /// Returns true for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.trim_start().starts_with('2')
    }

    /// First diagnostics or details text of the attached OperationOutcome.
    #[must_use]
    pub fn diagnostics(&self) -> Option<&str> {
        let issue = self.outcome.as_ref()?.get("issue")?.get(0)?;
        issue
            .get("diagnostics")
            .or_else(|| issue.get("details").and_then(|d| d.get("text")))
            .and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_search_params_builder() {
        let params = SearchParams::new()
            .with_param("url", "http://x.org/Questionnaire/q")
            .with_param("version", "1.0")
            .with_count(1);

        assert_eq!(params.first("url"), Some("http://x.org/Questionnaire/q"));
        assert_eq!(params.first("missing"), None);
        assert_eq!(
            params.to_query_pairs(),
            vec![
                ("url".to_string(), "http://x.org/Questionnaire/q".to_string()),
                ("version".to_string(), "1.0".to_string()),
                ("_count".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_bundle_serialization() {
        let bundle = Bundle::transaction(vec![BundleEntry {
            full_url: Some("urn:uuid:abc".into()),
            resource: Some(json!({"resourceType": "Library"})),
            request: Some(BundleRequest::new(HttpVerb::Post, "Library")),
            response: None,
        }]);

        let value = serde_json::to_value(&bundle).unwrap();
        assert_eq!(
            value,
            json!({
                "resourceType": "Bundle",
                "type": "transaction",
                "entry": [{
                    "fullUrl": "urn:uuid:abc",
                    "resource": {"resourceType": "Library"},
                    "request": {"method": "POST", "url": "Library"}
                }]
            })
        );
    }

    #[test]
    fn test_response_bundle_deserialization() {
        let bundle: Bundle = serde_json::from_value(json!({
            "resourceType": "Bundle",
            "type": "transaction-response",
            "entry": [{
                "fullUrl": "urn:uuid:abc",
                "resource": {"resourceType": "Library", "id": "l9"},
                "response": {"status": "201 Created", "location": "Library/l9/_history/1"}
            }, {
                "response": {
                    "status": "400 Bad Request",
                    "outcome": {"resourceType": "OperationOutcome", "issue": [{"diagnostics": "bad"}]}
                }
            }]
        }))
        .unwrap();

        assert_eq!(bundle.bundle_type, BundleType::TransactionResponse);
        assert_eq!(bundle.entry[0].resource_type(), Some("Library"));
        assert_eq!(bundle.entry[0].resource_id(), Some("l9"));
        assert!(bundle.entry[0].response.as_ref().unwrap().is_success());
        let failed = bundle.entry[1].response.as_ref().unwrap();
        assert!(!failed.is_success());
        assert_eq!(failed.diagnostics(), Some("bad"));
    }
}

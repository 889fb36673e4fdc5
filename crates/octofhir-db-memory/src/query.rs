use octofhir_storage::{SearchParams, StorageError};
use serde_json::Value;

/// Query filter types for the search patterns the migration tooling issues
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryFilter {
    /// Exact match on a top-level string field (e.g., url=..., _id=...)
    Exact { field: String, value: String },
    /// Identifier filter (system|value format)
    Identifier {
        system: Option<String>,
        value: String,
    },
}

impl QueryFilter {
    /// Builds a filter from one search parameter.
    pub fn from_param(key: &str, value: &str) -> Result<Self, StorageError> {
        match key {
            "identifier" => Ok(parse_identifier_token(value)),
            "_id" => Ok(QueryFilter::Exact {
                field: "id".to_string(),
                value: value.to_string(),
            }),
            "url" | "version" | "name" | "title" | "status" => Ok(QueryFilter::Exact {
                field: key.to_string(),
                value: value.to_string(),
            }),
            other => Err(StorageError::invalid_resource(format!(
                "Unsupported search parameter: {other}"
            ))),
        }
    }

    /// Check if a resource matches this filter
    pub fn matches(&self, resource: &Value) -> bool {
        match self {
            QueryFilter::Exact { field, value } => {
                resource.get(field).and_then(Value::as_str) == Some(value.as_str())
            }
            QueryFilter::Identifier { system, value } => resource
                .get("identifier")
                .map(|field| match field {
                    Value::Array(items) => items
                        .iter()
                        .any(|item| identifier_matches(item, system.as_deref(), value)),
                    item @ Value::Object(_) => identifier_matches(item, system.as_deref(), value),
                    _ => false,
                })
                .unwrap_or(false),
        }
    }
}

fn parse_identifier_token(token: &str) -> QueryFilter {
    match token.split_once('|') {
        Some((system, value)) => QueryFilter::Identifier {
            system: Some(system.to_string()),
            value: value.to_string(),
        },
        None => QueryFilter::Identifier {
            system: None,
            value: token.to_string(),
        },
    }
}

fn identifier_matches(identifier: &Value, system: Option<&str>, value: &str) -> bool {
    let system_matches = match system {
        Some(system) => identifier.get("system").and_then(Value::as_str) == Some(system),
        None => true,
    };
    system_matches && identifier.get("value").and_then(Value::as_str) == Some(value)
}

/// A conjunction of filters over one resource type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub resource_type: String,
    pub filters: Vec<QueryFilter>,
    pub count: Option<usize>,
}

impl SearchQuery {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            filters: Vec::new(),
            count: None,
        }
    }

    pub fn with_filter(mut self, filter: QueryFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Translates store-level search parameters into a query.
    pub fn from_params(resource_type: &str, params: &SearchParams) -> Result<Self, StorageError> {
        let mut query = Self::new(resource_type);
        for (key, values) in &params.parameters {
            for value in values {
                query = query.with_filter(QueryFilter::from_param(key, value)?);
            }
        }
        query.count = params.count.map(|c| c as usize);
        Ok(query)
    }

    /// Parses the query part of a conditional request URL (`identifier=a%7Cb&url=...`).
    pub fn from_query_string(resource_type: &str, query: &str) -> Result<Self, StorageError> {
        let mut params = SearchParams::new();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            params = params.with_param(key.into_owned(), value.into_owned());
        }
        if params.is_empty() {
            return Err(StorageError::invalid_resource(format!(
                "Conditional request without criteria: {resource_type}?{query}"
            )));
        }
        Self::from_params(resource_type, &params)
    }

    pub fn matches(&self, resource: &Value) -> bool {
        resource.get("resourceType").and_then(Value::as_str) == Some(self.resource_type.as_str())
            && self.filters.iter().all(|f| f.matches(resource))
    }
}

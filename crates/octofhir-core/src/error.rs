use thiserror::Error;

/// Errors raised while interpreting FHIR names.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid FHIR resource type: {0}")]
    InvalidResourceType(String),
}

impl CoreError {
    pub fn invalid_resource_type(resource_type: impl Into<String>) -> Self {
        Self::InvalidResourceType(resource_type.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ResourceKind;
    use std::str::FromStr;

    #[test]
    fn test_error_creation() {
        let err = CoreError::invalid_resource_type("questionnaire");
        assert_eq!(err.to_string(), "Invalid FHIR resource type: questionnaire");
    }

    #[test]
    fn test_kind_parse_failure() {
        let err = ResourceKind::from_str("plan-definition").unwrap_err();
        assert_eq!(err, CoreError::InvalidResourceType("plan-definition".into()));
    }
}

use octofhir_core::ResourceKind;
use octofhir_storage::StorageError;
use thiserror::Error;

/// Errors that abort an export walk or an import replay.
///
/// Missing resources are never errors here; they surface as issues in the
/// export report or as unresolved markers in the import report.
#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("Store request failed: {0}")]
    Transport(#[from] StorageError),

    #[error("Root reference could not be resolved: {reference}")]
    RootUnresolved { reference: String },

    #[error("Root {reference} is a {kind}, which is not exported")]
    DisallowedRoot { reference: String, kind: ResourceKind },

    #[error("Invalid export options: {0}")]
    InvalidOptions(String),

    #[error("Malformed resource: {0}")]
    MalformedResource(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    pub fn root_unresolved(reference: impl Into<String>) -> Self {
        Self::RootUnresolved {
            reference: reference.into(),
        }
    }

    pub fn disallowed_root(reference: impl Into<String>, kind: ResourceKind) -> Self {
        Self::DisallowedRoot {
            reference: reference.into(),
            kind,
        }
    }

    /// Wraps a store failure that aborts the current operation.
    pub fn store(error: StorageError) -> Self {
        tracing::warn!(category = %error.category(), %error, "store request failed");
        Self::Transport(error)
    }

    pub fn invalid_options(message: impl Into<String>) -> Self {
        Self::InvalidOptions(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResource(message.into())
    }

    /// True when the failure came from the store rather than from the input.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_storage::ErrorCategory;

    #[test]
    fn test_transport_conversion() {
        let err: MigrateError = StorageError::connection_error("refused").into();
        assert!(err.is_transport());
        assert_eq!(
            err.to_string(),
            "Store request failed: Connection error: refused"
        );
    }

    #[test]
    fn test_store_failure_is_transport() {
        let err = MigrateError::store(StorageError::internal("HTTP 400 Bad Request"));
        assert!(err.is_transport());
        assert!(matches!(
            &err,
            MigrateError::Transport(inner) if inner.category() == ErrorCategory::Internal
        ));
    }

    #[test]
    fn test_root_unresolved_display() {
        let err = MigrateError::root_unresolved("PlanDefinition/p1");
        assert!(!err.is_transport());
        assert_eq!(
            err.to_string(),
            "Root reference could not be resolved: PlanDefinition/p1"
        );
    }

    #[test]
    fn test_disallowed_root_display() {
        let err = MigrateError::disallowed_root("Patient/pat1", ResourceKind::Custom("Patient".into()));
        assert_eq!(err.to_string(), "Root Patient/pat1 is a Patient, which is not exported");
    }
}

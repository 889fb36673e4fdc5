use serde::{Deserialize, Serialize};

use crate::error::{MigrateError, Result};

pub const DEFAULT_MAX_ENTRIES_PER_BUNDLE: usize = 500;
pub const DEFAULT_GENERATED_BASE: &str = "http://octofhir.io/fhir";

/// Knobs of one export run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOptions {
    /// Upper bound on the number of entries in one transaction bundle.
    #[serde(default = "default_max_entries")]
    pub max_entries_per_bundle: usize,
    /// Strip server-assigned metadata (`meta.lastUpdated`, `meta.versionId`, ...).
    #[serde(default = "default_true")]
    pub clean_metadata: bool,
    /// Follow references to PlanDefinitions other than the root.
    #[serde(default = "default_true")]
    pub include_nested_plan_definitions: bool,
    /// Base of generated canonical URLs and identifier systems.
    #[serde(default = "default_generated_base")]
    pub generated_base: String,
}

fn default_max_entries() -> usize {
    DEFAULT_MAX_ENTRIES_PER_BUNDLE
}

fn default_true() -> bool {
    true
}

fn default_generated_base() -> String {
    DEFAULT_GENERATED_BASE.to_string()
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            max_entries_per_bundle: default_max_entries(),
            clean_metadata: true,
            include_nested_plan_definitions: true,
            generated_base: default_generated_base(),
        }
    }
}

impl ExportOptions {
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries_per_bundle = max;
        self
    }

    pub fn with_generated_base(mut self, base: impl Into<String>) -> Self {
        self.generated_base = base.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_entries_per_bundle == 0 {
            return Err(MigrateError::invalid_options(
                "max_entries_per_bundle must be > 0",
            ));
        }
        let base = url::Url::parse(&self.generated_base).map_err(|e| {
            MigrateError::invalid_options(format!(
                "generated_base must be an absolute URL ({}): {e}",
                self.generated_base
            ))
        })?;
        if base.cannot_be_a_base() {
            return Err(MigrateError::invalid_options(format!(
                "generated_base cannot be used as a URL base: {}",
                self.generated_base
            )));
        }
        Ok(())
    }

    /// The generated base without a trailing slash.
    pub fn generated_base(&self) -> &str {
        self.generated_base.trim_end_matches('/')
    }
}

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use octofhir_migrate::ExportOptions;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "octofhir-migrate.toml";

/// One FHIR server endpoint and its credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default)]
    pub url: Option<String>,
    /// Bearer token; takes precedence over username/password.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl ServerSettings {
    pub fn override_with(&mut self, url: Option<&String>, token: Option<&String>) {
        if let Some(url) = url {
            self.url = Some(url.clone());
        }
        if let Some(token) = token {
            self.token = Some(token.clone());
        }
    }

    pub fn require_url(&self, side: &str) -> Result<&str> {
        self.url.as_deref().with_context(|| {
            format!(
                "No {side} server URL configured. Use --{side}-url, set OCTOFHIR_{}_URL, or add [{side}] url to {DEFAULT_CONFIG_FILE}",
                side.to_uppercase()
            )
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrateConfig {
    #[serde(default)]
    pub source: ServerSettings,
    #[serde(default)]
    pub target: ServerSettings,
    #[serde(default)]
    pub export: ExportOptions,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Loads the config file (if present), then `OCTOFHIR__SECTION__KEY` overrides.
pub fn load_config(path: Option<&Path>) -> Result<MigrateConfig> {
    let mut builder = Config::builder();
    let file = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    if file.exists() {
        builder = builder.add_source(File::from(file.clone()));
    } else if path.is_some() {
        tracing::debug!(path = %file.display(), "config file not found, using defaults");
    }
    // e.g. OCTOFHIR__TARGET__URL=https://dest.example/fhir
    builder = builder.add_source(
        Environment::with_prefix("OCTOFHIR")
            .try_parsing(true)
            .separator("__"),
    );

    let merged: MigrateConfig = builder
        .build()
        .context("config build error")?
        .try_deserialize()
        .context("config deserialize error")?;
    merged
        .export
        .validate()
        .context("invalid [export] settings")?;
    Ok(merged)
}

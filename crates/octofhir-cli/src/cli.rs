use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "octofhir-migrate")]
#[command(about = "Move PlanDefinitions and everything they depend on between FHIR servers")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (TOML). Missing files are ignored.
    #[arg(short, long, global = true, env = "OCTOFHIR_MIGRATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level when RUST_LOG is not set (overrides logging.level)
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Export the dependency closure of a resource into transaction bundles
    Export(ExportArgs),
    /// Replay exported bundles into the target server and resolve references
    Import(ImportArgs),
    /// Resolve markers in one resource against a saved transaction response
    Resolve(ResolveArgs),
}

#[derive(clap::Args, Default)]
pub struct SourceArgs {
    /// Source server base URL (e.g. https://source.example/fhir)
    #[arg(long, env = "OCTOFHIR_SOURCE_URL")]
    pub source_url: Option<String>,
    /// Bearer token for the source server
    #[arg(long, env = "OCTOFHIR_SOURCE_TOKEN", hide_env_values = true)]
    pub source_token: Option<String>,
}

#[derive(clap::Args, Default)]
pub struct TargetArgs {
    /// Target server base URL
    #[arg(long, env = "OCTOFHIR_TARGET_URL")]
    pub target_url: Option<String>,
    /// Bearer token for the target server
    #[arg(long, env = "OCTOFHIR_TARGET_TOKEN", hide_env_values = true)]
    pub target_token: Option<String>,
}

#[derive(clap::Args)]
pub struct ExportArgs {
    /// Root reference (e.g. PlanDefinition/123 or a canonical URL)
    pub root: String,
    /// Output file; several batches become FILE-partN.json
    #[arg(short, long, default_value = "plan-definition-bundle.json")]
    pub output: PathBuf,
    /// Maximum entries per transaction bundle
    #[arg(long)]
    pub max_entries: Option<usize>,
    /// Keep meta.lastUpdated, meta.versionId and the other volatile metadata
    #[arg(long)]
    pub no_clean_metadata: bool,
    /// Do not follow PlanDefinitions referenced from the root
    #[arg(long)]
    pub skip_nested_plan_definitions: bool,
    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(clap::Args)]
pub struct ImportArgs {
    /// Bundle files, replayed in the given order
    #[arg(required = true)]
    pub bundles: Vec<PathBuf>,
    /// Mapping sidecar (defaults to <first bundle>-mapping.json)
    #[arg(short, long)]
    pub mapping: Option<PathBuf>,
    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(clap::Args)]
pub struct ResolveArgs {
    /// Transaction-response bundle saved from an earlier import
    pub response: PathBuf,
    /// Resource whose markers should be resolved
    pub resource: PathBuf,
    /// Mapping sidecar used for identity fallback
    #[arg(short, long)]
    pub mapping: Option<PathBuf>,
}

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use octofhir_migrate::{ExportOptions, ExportResult};
use octofhir_storage::ResourceStore;

use crate::cli::ExportArgs;
use crate::client::HttpStore;
use crate::config::MigrateConfig;
use crate::files::write_export;
use crate::output::{export_summary_table, issues_table, print_success, print_warning};

pub struct ExportFiles {
    pub bundles: Vec<PathBuf>,
    pub mapping: PathBuf,
}

/// Export options from config, with command-line flags applied last.
pub fn effective_options(base: &ExportOptions, args: &ExportArgs) -> ExportOptions {
    let mut options = base.clone();
    if let Some(max) = args.max_entries {
        options.max_entries_per_bundle = max;
    }
    if args.no_clean_metadata {
        options.clean_metadata = false;
    }
    if args.skip_nested_plan_definitions {
        options.include_nested_plan_definitions = false;
    }
    options
}

pub async fn export(config: &MigrateConfig, args: &ExportArgs) -> Result<()> {
    let mut source = config.source.clone();
    source.override_with(
        args.source.source_url.as_ref(),
        args.source.source_token.as_ref(),
    );
    let store = HttpStore::from_settings(&source, "source")?;
    println!(
        "{} {} from {}",
        "Exporting".cyan(),
        args.root,
        store.base_url()
    );

    let options = effective_options(&config.export, args);
    let (result, files) = export_to_files(&store, &args.root, options, &args.output).await?;

    println!("{}", export_summary_table(&result));
    if !result.report.is_empty() {
        print_warning(&format!(
            "{} reference(s) were not exported",
            result.report.len()
        ));
        println!("{}", issues_table(&result.report));
    }
    for path in &files.bundles {
        print_success(&format!("Wrote {}", path.display()));
    }
    print_success(&format!("Wrote {}", files.mapping.display()));
    Ok(())
}

/// Walks `root` in `store` and writes the batches and the sidecar next to `output`.
pub async fn export_to_files(
    store: &dyn ResourceStore,
    root: &str,
    options: ExportOptions,
    output: &std::path::Path,
) -> Result<(ExportResult, ExportFiles)> {
    let result = octofhir_migrate::export(store, root, options)
        .await
        .with_context(|| format!("Export of {root} failed"))?;
    let (bundles, mapping) = write_export(output, &result)?;
    Ok((result, ExportFiles { bundles, mapping }))
}

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use octofhir_migrate::{IdentifierMapping, replay};
use octofhir_storage::Bundle;

use crate::cli::ImportArgs;
use crate::client::HttpStore;
use crate::config::MigrateConfig;
use crate::files::{mapping_path, read_bundle, read_mapping};
use crate::output::{failures_table, import_summary_table, print_success, print_warning};

pub async fn import(config: &MigrateConfig, args: &ImportArgs) -> Result<()> {
    let mut target = config.target.clone();
    target.override_with(
        args.target.target_url.as_ref(),
        args.target.target_token.as_ref(),
    );
    let store = HttpStore::from_settings(&target, "target")?;
    let (bundles, mapping) = load_inputs(&args.bundles, args.mapping.as_deref())?;
    println!(
        "{} {} bundle(s) into {}",
        "Importing".cyan(),
        bundles.len(),
        store.base_url()
    );

    let report = replay(&store, &bundles, &mapping)
        .await
        .context("Import aborted")?;

    println!("{}", import_summary_table(&report));
    if !report.failures.is_empty() {
        print_warning(&format!("{} entries were rejected", report.failures.len()));
        println!("{}", failures_table(&report));
    }
    for pending in &report.unresolved {
        print_warning(&format!(
            "{} still references {} at {}",
            pending.resource, pending.marker, pending.path
        ));
    }
    if report.is_clean() {
        print_success("All references resolved");
    }
    Ok(())
}

/// Reads the batches in order and the sidecar.
///
/// Without `--mapping` the sidecar next to the first batch is used when it
/// exists; identity fallback is skipped otherwise.
pub fn load_inputs(
    bundle_files: &[PathBuf],
    mapping: Option<&Path>,
) -> Result<(Vec<Bundle>, IdentifierMapping)> {
    let bundles = bundle_files
        .iter()
        .map(PathBuf::as_path)
        .map(read_bundle)
        .collect::<Result<Vec<_>>>()?;

    let mapping = match (mapping, bundle_files.first()) {
        (Some(path), _) => read_mapping(path)?,
        (None, Some(first)) => {
            let default = mapping_path(first);
            if default.exists() {
                read_mapping(&default)?
            } else {
                print_warning(&format!(
                    "No mapping file at {}; markers are resolved from responses only",
                    default.display()
                ));
                IdentifierMapping::new()
            }
        }
        (None, None) => IdentifierMapping::new(),
    };
    Ok((bundles, mapping))
}

use anyhow::{Context, Result};
use octofhir_migrate::{IdentifierMapping, ImportResolver, Resolution};

use crate::cli::ResolveArgs;
use crate::files::{read_bundle, read_json, read_mapping};
use crate::output::{print_json, print_warning};

pub fn resolve(args: &ResolveArgs) -> Result<()> {
    let resolution = resolve_files(args)?;
    for pending in &resolution.unresolved {
        print_warning(&format!("Unresolved {} at {}", pending.marker, pending.path));
    }
    print_json(&resolution.resource)
}

/// Resolves the markers of one saved resource against a saved response bundle.
pub fn resolve_files(args: &ResolveArgs) -> Result<Resolution> {
    let response = read_bundle(&args.response).context("Failed to load response bundle")?;
    let resource = read_json(&args.resource)?;
    let mapping = match &args.mapping {
        Some(path) => read_mapping(path)?,
        None => IdentifierMapping::new(),
    };
    let resolver = ImportResolver::from_response(&response);
    Ok(resolver.resolve_resource(&resource, &mapping))
}

use colored::Colorize;
use octofhir_migrate::{ExportReport, ExportResult, ImportReport};
use serde_json::Value;
use tabled::builder::Builder;
use tabled::settings::Style;

pub fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_warning(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// One row per resource kind with the number of packed resources.
pub fn export_summary_table(result: &ExportResult) -> String {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for entry in result.entries() {
        let kind = entry.resource_type().unwrap_or("-").to_string();
        match counts.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, n)) => *n += 1,
            None => counts.push((kind, 1)),
        }
    }

    let mut builder = Builder::default();
    builder.push_record(["ResourceType", "Count"]);
    for (kind, n) in &counts {
        builder.push_record([kind.clone(), n.to_string()]);
    }
    builder.push_record([
        "Total".to_string(),
        result.resource_count.to_string(),
    ]);
    builder.build().with(Style::rounded()).to_string()
}

pub fn issues_table(report: &ExportReport) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Issue", "Reference", "From", "Path"]);
    for issue in &report.issues {
        builder.push_record([
            issue.kind.to_string(),
            issue.reference.clone(),
            issue.referenced_from.clone(),
            issue.path.clone(),
        ]);
    }
    builder.build().with(Style::rounded()).to_string()
}

pub fn import_summary_table(report: &ImportReport) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Batches", "Succeeded", "Failed", "Patched", "Unresolved"]);
    builder.push_record([
        report.batches.to_string(),
        report.succeeded.to_string(),
        report.failures.len().to_string(),
        report.patched.len().to_string(),
        report.unresolved.len().to_string(),
    ]);
    builder.build().with(Style::rounded()).to_string()
}

pub fn failures_table(report: &ImportReport) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Batch", "Entry", "FullUrl", "Status", "Diagnostics"]);
    for failure in &report.failures {
        builder.push_record([
            failure.batch.to_string(),
            failure.index.to_string(),
            failure.full_url.clone().unwrap_or_else(|| "-".into()),
            failure.status.clone(),
            failure.diagnostics.clone().unwrap_or_else(|| "-".into()),
        ]);
    }
    builder.build().with(Style::rounded()).to_string()
}

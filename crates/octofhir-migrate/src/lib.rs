//! Dependency-closure export of FHIR definitional resources and replay of the
//! exported batches into another store.
//!
//! Export starts from one root reference (usually a `PlanDefinition`), follows
//! every instance and canonical reference of the followed kinds, and packs the
//! closure into transaction bundles. Every reference inside the closure is
//! rewritten to a batch-local `urn:uuid:` marker and every resource carries a
//! stable business identifier, so the batches can be replayed as conditional
//! upserts. The [`IdentifierMapping`] sidecar lets [`replay`] resolve markers
//! the destination leaves in place.
//!
//! ```ignore
//! use octofhir_migrate::{ExportOptions, export, replay};
//!
//! let exported = export(&source, "PlanDefinition/p1", ExportOptions::default()).await?;
//! let report = replay(&destination, &exported.bundles, &exported.mapping).await?;
//! ```

pub mod error;
pub mod fields;
pub mod identity;
pub mod kinds;
pub mod mapping;
pub mod options;
pub mod packer;
pub mod reference;
pub mod replay;
pub mod report;
pub mod resolver;
mod state;
mod transform;
pub mod walker;

pub use error::{MigrateError, Result};
pub use identity::StableIdentity;
pub use kinds::{KindPolicy, KindRegistry};
pub use mapping::{IdentifierMapping, MappedIdentity};
pub use options::ExportOptions;
pub use packer::{BatchEntry, UpsertTarget, pack};
pub use reference::{ReferenceClass, ReferenceClassifier};
pub use replay::{EntryFailure, ImportReport, PendingMarker, replay};
pub use report::{ExportIssue, ExportIssueKind, ExportReport};
pub use resolver::{ImportResolver, Resolution};
pub use walker::{ExportResult, GraphWalker};

use octofhir_storage::ResourceStore;

/// Exports the closure of `root` from `store` with the default kind table.
pub async fn export(
    store: &dyn ResourceStore,
    root: &str,
    options: ExportOptions,
) -> Result<ExportResult> {
    GraphWalker::new(store, options).walk(root).await
}

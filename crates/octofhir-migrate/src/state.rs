//! Per-walk traversal state.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use crate::packer::BatchEntry;
use crate::report::ExportReport;

/// Progress of one discovered resource, keyed by surrogate id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Surrogate minted; children still being discovered.
    InProgress,
    /// Rewritten and packed.
    Complete,
}

/// Everything one `walk` call accumulates. Owned by the call and threaded
/// through the recursion; nothing outlives it except the export result.
#[derive(Debug, Default)]
pub struct TraversalState {
    /// Reference key to surrogate id. Several keys may alias one surrogate.
    pub(crate) closure: IndexMap<String, String>,
    pub(crate) progress: HashMap<String, Progress>,
    /// Keys that failed to resolve or were not followed.
    pub(crate) unresolved: HashSet<String>,
    pub(crate) entries: Vec<BatchEntry>,
    pub(crate) report: ExportReport,
}

impl TraversalState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn surrogate_for(&self, key: &str) -> Option<&str> {
        self.closure.get(key).map(String::as_str)
    }

    /// Inserts `key` unless it is already present. Returns true when inserted.
    pub fn alias(&mut self, key: impl Into<String>, surrogate: &str) -> bool {
        let key = key.into();
        if self.closure.contains_key(&key) {
            return false;
        }
        self.closure.insert(key, surrogate.to_string());
        true
    }

    /// True when the key was already discovered or already failed.
    pub fn is_settled(&self, key: &str) -> bool {
        self.closure.contains_key(key) || self.unresolved.contains(key)
    }

    pub fn mark_unresolved(&mut self, key: impl Into<String>) {
        self.unresolved.insert(key.into());
    }

    pub fn is_unresolved(&self, key: &str) -> bool {
        self.unresolved.contains(key)
    }

    pub fn begin(&mut self, surrogate: &str) {
        self.progress
            .insert(surrogate.to_string(), Progress::InProgress);
    }

    pub fn complete(&mut self, entry: BatchEntry) {
        self.progress
            .insert(entry.surrogate_id.clone(), Progress::Complete);
        self.entries.push(entry);
    }

    pub fn progress(&self, surrogate: &str) -> Option<Progress> {
        self.progress.get(surrogate).copied()
    }

    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    pub fn report(&self) -> &ExportReport {
        &self.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_core::ResourceKind;
    use serde_json::json;

    #[test]
    fn test_alias_inserts_once() {
        let mut state = TraversalState::new();
        assert!(state.alias("Questionnaire/q1", "s1"));
        assert!(!state.alias("Questionnaire/q1", "s2"));
        assert!(state.alias("http://x.org/Questionnaire/intake", "s1"));

        assert_eq!(state.surrogate_for("Questionnaire/q1"), Some("s1"));
        assert_eq!(state.closure.len(), 2);
        assert!(state.is_settled("http://x.org/Questionnaire/intake"));
    }

    #[test]
    fn test_progress_transitions() {
        let mut state = TraversalState::new();
        state.begin("s1");
        assert_eq!(state.progress("s1"), Some(Progress::InProgress));

        state.complete(crate::packer::BatchEntry::new(
            "s1",
            ResourceKind::Library,
            json!({"resourceType": "Library"}),
            None,
        ));
        assert_eq!(state.progress("s1"), Some(Progress::Complete));
        assert_eq!(state.entries().len(), 1);
    }

    #[test]
    fn test_unresolved_keys_are_settled() {
        let mut state = TraversalState::new();
        state.mark_unresolved("https://x/StructureMap/s1");
        assert!(state.is_unresolved("https://x/StructureMap/s1"));
        assert!(state.is_settled("https://x/StructureMap/s1"));
        assert!(!state.is_settled("StructureMap/s1"));
    }
}

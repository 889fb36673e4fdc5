//! Issues collected during an export walk.

use std::fmt;

use octofhir_core::ResourceKind;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "detail", rename_all = "kebab-case")]
pub enum ExportIssueKind {
    /// No resource could be found for the reference.
    NotFound,
    /// The reference names a kind that is not followed.
    Disallowed(ResourceKind),
    /// The value could not be classified as a reference.
    Unparseable(String),
    /// The value was kept as is although other references were rewritten.
    Unrewritten,
}

impl fmt::Display for ExportIssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::Disallowed(kind) => write!(f, "{kind} is not exported"),
            Self::Unparseable(reason) => write!(f, "unparseable ({reason})"),
            Self::Unrewritten => write!(f, "left unrewritten"),
        }
    }
}

/// One reference that did not make it into the closure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportIssue {
    /// The reference string as it appears in the body.
    pub reference: String,
    /// `Kind/id` of the resource holding the reference.
    pub referenced_from: String,
    /// Path of the field inside that resource.
    pub path: String,
    pub kind: ExportIssueKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    pub issues: Vec<ExportIssue>,
}

impl ExportReport {
    /// Records an issue and emits it through `tracing`.
    ///
    /// `expected` marks misses that are normal, such as generated canonicals
    /// from an earlier export that never existed at the source.
    pub fn record(&mut self, issue: ExportIssue, expected: bool) {
        match (&issue.kind, expected) {
            (ExportIssueKind::NotFound, true) => tracing::debug!(
                reference = %issue.reference,
                referenced_from = %issue.referenced_from,
                path = %issue.path,
                "generated canonical not found at source, left as is"
            ),
            (ExportIssueKind::Unparseable(reason), _) => tracing::debug!(
                reference = %issue.reference,
                referenced_from = %issue.referenced_from,
                reason = %reason,
                "reference could not be parsed"
            ),
            (kind, _) => tracing::warn!(
                reference = %issue.reference,
                referenced_from = %issue.referenced_from,
                path = %issue.path,
                issue = %kind,
                "reference not exported"
            ),
        }
        self.issues.push(issue);
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Issues whose kind matches `predicate`.
    pub fn filter<'a>(
        &'a self,
        predicate: impl Fn(&ExportIssueKind) -> bool + 'a,
    ) -> impl Iterator<Item = &'a ExportIssue> + 'a {
        self.issues.iter().filter(move |issue| predicate(&issue.kind))
    }

    pub fn not_found(&self) -> impl Iterator<Item = &ExportIssue> {
        self.filter(|kind| matches!(kind, ExportIssueKind::NotFound))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn issue(reference: &str, kind: ExportIssueKind) -> ExportIssue {
        ExportIssue {
            reference: reference.to_string(),
            referenced_from: "PlanDefinition/p1".to_string(),
            path: "action[0].transform".to_string(),
            kind,
        }
    }

    #[test]
    fn test_record_and_filter() {
        let mut report = ExportReport::default();
        report.record(issue("https://x/StructureMap/s1", ExportIssueKind::NotFound), false);
        report.record(
            issue(
                "Patient/1",
                ExportIssueKind::Disallowed(ResourceKind::Custom("Patient".into())),
            ),
            false,
        );

        assert_eq!(report.len(), 2);
        let missing: Vec<_> = report.not_found().map(|i| i.reference.as_str()).collect();
        assert_eq!(missing, vec!["https://x/StructureMap/s1"]);
    }

    #[test]
    fn test_issue_kind_display() {
        assert_eq!(
            ExportIssueKind::Disallowed(ResourceKind::Custom("Patient".into())).to_string(),
            "Patient is not exported"
        );
        assert_eq!(ExportIssueKind::NotFound.to_string(), "not found");
    }

    #[test]
    fn test_serialization() {
        let value = serde_json::to_value(issue("Library/x", ExportIssueKind::NotFound)).unwrap();
        assert_eq!(
            value,
            json!({
                "reference": "Library/x",
                "referencedFrom": "PlanDefinition/p1",
                "path": "action[0].transform",
                "kind": {"type": "not-found"}
            })
        );
    }
}

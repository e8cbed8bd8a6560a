//! Warnings and counts produced by a transfer

use std::fmt;

use serde::Serialize;

use crate::feedback::Variant;
use crate::host::Project;

/// Kind of entity a warning is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EntityKind {
    Scope,
    Filter,
    MatchReplaceCollection,
    MatchReplaceRule,
    ReplayCollection,
    ReplaySession,
}

impl EntityKind {
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Scope => "scope",
            EntityKind::Filter => "filter",
            EntityKind::MatchReplaceCollection => "match/replace collection",
            EntityKind::MatchReplaceRule => "match/replace rule",
            EntityKind::ReplayCollection => "replay collection",
            EntityKind::ReplaySession => "replay session",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Non-fatal problem or policy skip recorded during capture or apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferWarning {
    /// None of the session's entries has a request
    SessionWithoutRequest { session: String },
    /// The session's request could not be fetched
    RequestUnavailable { session: String, reason: String },
    /// A rule or session points at a collection missing from the snapshot
    DanglingCollection {
        kind: EntityKind,
        item: String,
        collection_id: String,
    },
    /// A whole category could not be applied
    StepFailed { step: &'static str, reason: String },
    CreateFailed {
        kind: EntityKind,
        name: String,
        reason: String,
    },
    /// A filter with the same alias already exists in the target
    DuplicateFilter { name: String, alias: String },
    /// The item's collection has no counterpart in the target
    Unmapped {
        kind: EntityKind,
        item: String,
        collection_id: Option<String>,
    },
    /// Session was created but keeps the host's default name
    RenameFailed { name: String, reason: String },
}

impl TransferWarning {
    /// Whether a host call failed, as opposed to a policy skip
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            TransferWarning::RequestUnavailable { .. }
                | TransferWarning::StepFailed { .. }
                | TransferWarning::CreateFailed { .. }
                | TransferWarning::RenameFailed { .. }
        )
    }

    pub fn variant(&self) -> Variant {
        if self.is_failure() {
            Variant::Error
        } else {
            Variant::Warning
        }
    }
}

impl fmt::Display for TransferWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferWarning::SessionWithoutRequest { session } => {
                write!(f, "Skipped replay session '{}': no entry has a request", session)
            }
            TransferWarning::RequestUnavailable { session, reason } => write!(
                f,
                "Skipped replay session '{}': request unavailable ({})",
                session, reason
            ),
            TransferWarning::DanglingCollection {
                kind,
                item,
                collection_id,
            } => write!(
                f,
                "{} '{}' references collection '{}' which is not in the snapshot",
                kind, item, collection_id
            ),
            TransferWarning::StepFailed { step, reason } => {
                write!(f, "Could not copy {}: {}", step, reason)
            }
            TransferWarning::CreateFailed { kind, name, reason } => {
                write!(f, "Failed to create {} '{}': {}", kind, name, reason)
            }
            TransferWarning::DuplicateFilter { name, alias } => write!(
                f,
                "Skipped filter '{}': alias '{}' already exists",
                name, alias
            ),
            TransferWarning::Unmapped {
                kind,
                item,
                collection_id: Some(collection_id),
            } => write!(
                f,
                "Skipped {} '{}': collection '{}' has no counterpart in this project",
                kind, item, collection_id
            ),
            TransferWarning::Unmapped {
                kind,
                item,
                collection_id: None,
            } => write!(f, "Skipped {} '{}': no collection assigned", kind, item),
            TransferWarning::RenameFailed { name, reason } => write!(
                f,
                "Created replay session but could not rename it to '{}': {}",
                name, reason
            ),
        }
    }
}

/// Entities created (or reused) by one apply run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApplyCounts {
    pub scopes: usize,
    pub filters: usize,
    pub match_replace_collections_created: usize,
    pub match_replace_collections_reused: usize,
    pub match_replace_rules: usize,
    pub replay_collections_created: usize,
    pub replay_collections_reused: usize,
    pub sessions: usize,
}

/// Result of applying a snapshot to a project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    pub project: Project,
    /// Fingerprint of the applied snapshot
    pub fingerprint: String,
    pub counts: ApplyCounts,
    pub warnings: Vec<TransferWarning>,
}

impl ApplyReport {
    pub fn new(project: Project, fingerprint: String) -> Self {
        Self {
            project,
            fingerprint,
            counts: ApplyCounts::default(),
            warnings: Vec::new(),
        }
    }

    pub fn failures(&self) -> usize {
        self.warnings.iter().filter(|w| w.is_failure()).count()
    }

    /// One-line summary for the user
    pub fn summary(&self) -> String {
        let counts = &self.counts;
        let mut summary = format!(
            "Copied into '{}': {} scopes, {} filters, {} match/replace rules, {} replay sessions",
            self.project.name,
            counts.scopes,
            counts.filters,
            counts.match_replace_rules,
            counts.sessions
        );
        if !self.warnings.is_empty() {
            summary.push_str(&format!(" ({} skipped or failed)", self.warnings.len()));
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> Project {
        Project {
            id: "p2".to_string(),
            name: "Target".to_string(),
        }
    }

    #[test]
    fn test_summary_without_warnings() {
        let mut report = ApplyReport::new(project(), "abc".to_string());
        report.counts.scopes = 2;
        report.counts.filters = 1;
        report.counts.sessions = 3;

        assert_eq!(
            report.summary(),
            "Copied into 'Target': 2 scopes, 1 filters, 0 match/replace rules, 3 replay sessions"
        );
    }

    #[test]
    fn test_summary_mentions_warnings() {
        let mut report = ApplyReport::new(project(), "abc".to_string());
        report.warnings.push(TransferWarning::DuplicateFilter {
            name: "Images".to_string(),
            alias: "img".to_string(),
        });

        assert!(report.summary().ends_with("(1 skipped or failed)"));
        assert_eq!(report.failures(), 0);
    }

    #[test]
    fn test_failures_use_error_variant() {
        let failed = TransferWarning::CreateFailed {
            kind: EntityKind::Scope,
            name: "api".to_string(),
            reason: "rejected".to_string(),
        };
        let skipped = TransferWarning::Unmapped {
            kind: EntityKind::MatchReplaceRule,
            item: "Strip auth".to_string(),
            collection_id: None,
        };

        assert_eq!(failed.variant(), Variant::Error);
        assert_eq!(skipped.variant(), Variant::Warning);
        assert_eq!(
            skipped.to_string(),
            "Skipped match/replace rule 'Strip auth': no collection assigned"
        );
    }
}

//! Applying a snapshot to the selected project
//!
//! Steps run in a fixed order (scopes, filters, match/replace, replay) and
//! every host call is awaited before the next one starts. A failing item or
//! step is recorded and the run carries on.

use std::collections::HashSet;

use tracing::{debug, info, info_span, warn, Instrument};

use crate::feedback::{Notifier, Variant};
use crate::host::{NewMatchReplaceRule, Project, ProjectHost};
use crate::transfer::error::TransferError;
use crate::transfer::reconcile::{CollectionKind, CollectionReconciler, HostCollections};
use crate::transfer::report::{ApplyReport, EntityKind, TransferWarning};
use crate::transfer::resolve_project;
use crate::transfer::snapshot::{SnapshotEnvelope, TransferSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Give created replay sessions their captured names
    pub rename_sessions: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            rename_sessions: true,
        }
    }
}

pub struct ApplyCoordinator<'a> {
    host: &'a dyn ProjectHost,
    notifier: &'a dyn Notifier,
    options: ApplyOptions,
}

impl<'a> ApplyCoordinator<'a> {
    pub fn new(host: &'a dyn ProjectHost, notifier: &'a dyn Notifier) -> Self {
        Self {
            host,
            notifier,
            options: ApplyOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ApplyOptions) -> Self {
        self.options = options;
        self
    }

    /// Recreate the snapshot's entities in the selected project.
    ///
    /// Only an unresolvable target project is an error.
    pub async fn apply(&self, envelope: &SnapshotEnvelope) -> Result<ApplyReport, TransferError> {
        let project = resolve_project(self.host).await?;
        let span = info_span!("apply", project = %project.name, source = %envelope.source_name());
        Ok(self
            .apply_to(project, envelope)
            .instrument(span)
            .await)
    }

    async fn apply_to(&self, project: Project, envelope: &SnapshotEnvelope) -> ApplyReport {
        let snapshot = &envelope.snapshot;
        let mut report = ApplyReport::new(project, envelope.fingerprint());

        self.apply_scopes(snapshot, &mut report).await;
        self.apply_filters(snapshot, &mut report).await;
        self.apply_match_replace(snapshot, &mut report).await;
        self.apply_replay(snapshot, &mut report).await;

        info!(
            scopes = report.counts.scopes,
            filters = report.counts.filters,
            rules = report.counts.match_replace_rules,
            sessions = report.counts.sessions,
            warnings = report.warnings.len(),
            "Apply finished"
        );
        report
    }

    async fn apply_scopes(&self, snapshot: &TransferSnapshot, report: &mut ApplyReport) {
        for scope in &snapshot.scopes {
            match self.host.create_scope(scope).await {
                Ok(_) => report.counts.scopes += 1,
                Err(e) => self.record(
                    report,
                    TransferWarning::CreateFailed {
                        kind: EntityKind::Scope,
                        name: scope.name.clone(),
                        reason: e.to_string(),
                    },
                ),
            }
        }
        self.progress(report.counts.scopes, snapshot.scopes.len(), "scopes");
    }

    async fn apply_filters(&self, snapshot: &TransferSnapshot, report: &mut ApplyReport) {
        if snapshot.filters.is_empty() {
            return;
        }

        let existing = match self.host.list_filters().await {
            Ok(filters) => filters,
            Err(e) => {
                self.record(
                    report,
                    TransferWarning::StepFailed {
                        step: "filters",
                        reason: e.to_string(),
                    },
                );
                return;
            }
        };
        let mut aliases: HashSet<String> = existing
            .iter()
            .filter_map(|f| f.defined_alias())
            .map(str::to_string)
            .collect();

        for filter in &snapshot.filters {
            if let Some(alias) = filter.defined_alias() {
                if aliases.contains(alias) {
                    self.record(
                        report,
                        TransferWarning::DuplicateFilter {
                            name: filter.name.clone(),
                            alias: alias.to_string(),
                        },
                    );
                    continue;
                }
            }

            match self.host.create_filter(filter).await {
                Ok(_) => {
                    report.counts.filters += 1;
                    if let Some(alias) = filter.defined_alias() {
                        aliases.insert(alias.to_string());
                    }
                }
                Err(e) => self.record(
                    report,
                    TransferWarning::CreateFailed {
                        kind: EntityKind::Filter,
                        name: filter.name.clone(),
                        reason: e.to_string(),
                    },
                ),
            }
        }
        self.progress(report.counts.filters, snapshot.filters.len(), "filters");
    }

    async fn apply_match_replace(&self, snapshot: &TransferSnapshot, report: &mut ApplyReport) {
        let section = &snapshot.match_replace;
        if section.collections.is_empty() && section.rules.is_empty() {
            return;
        }

        let target = match self.host.list_match_replace_collections().await {
            Ok(collections) => collections,
            Err(e) => {
                self.record(
                    report,
                    TransferWarning::StepFailed {
                        step: "match/replace rules",
                        reason: e.to_string(),
                    },
                );
                return;
            }
        };

        let factory = HostCollections::new(self.host, CollectionKind::MatchReplace);
        let reconciled = CollectionReconciler::new(CollectionKind::MatchReplace)
            .reconcile(&section.collections, &target, &factory)
            .await;
        report.counts.match_replace_collections_created = reconciled.created;
        report.counts.match_replace_collections_reused = reconciled.reused;
        for warning in reconciled.warnings {
            self.record(report, warning);
        }

        for rule in &section.rules {
            let Some(collection_id) = reconciled.map.resolve(rule.collection_id.as_deref()) else {
                self.record(
                    report,
                    TransferWarning::Unmapped {
                        kind: EntityKind::MatchReplaceRule,
                        item: rule.name.clone(),
                        collection_id: rule.collection_id.clone().filter(|id| !id.is_empty()),
                    },
                );
                continue;
            };

            let new_rule = NewMatchReplaceRule {
                collection_id: collection_id.to_string(),
                name: rule.name.clone(),
                query: rule.query.clone(),
                section: rule.section.clone(),
                sources: rule.sources.clone().unwrap_or_default(),
            };
            match self.host.create_match_replace_rule(&new_rule).await {
                Ok(_) => report.counts.match_replace_rules += 1,
                Err(e) => self.record(
                    report,
                    TransferWarning::CreateFailed {
                        kind: EntityKind::MatchReplaceRule,
                        name: rule.name.clone(),
                        reason: e.to_string(),
                    },
                ),
            }
        }
        self.progress(
            report.counts.match_replace_rules,
            section.rules.len(),
            "match/replace rules",
        );
    }

    async fn apply_replay(&self, snapshot: &TransferSnapshot, report: &mut ApplyReport) {
        if snapshot.replay_collections.is_empty() && snapshot.sessions.is_empty() {
            return;
        }

        let target = match self.host.list_replay_collections().await {
            Ok(collections) => collections,
            Err(e) => {
                self.record(
                    report,
                    TransferWarning::StepFailed {
                        step: "replay sessions",
                        reason: e.to_string(),
                    },
                );
                return;
            }
        };

        let factory = HostCollections::new(self.host, CollectionKind::Replay);
        let reconciled = CollectionReconciler::new(CollectionKind::Replay)
            .reconcile(&snapshot.replay_collections, &target, &factory)
            .await;
        report.counts.replay_collections_created = reconciled.created;
        report.counts.replay_collections_reused = reconciled.reused;
        for warning in reconciled.warnings {
            self.record(report, warning);
        }

        for session in &snapshot.sessions {
            // Sessions without a collection are created uncategorized
            let collection_id = match session.collection_id.as_deref().filter(|id| !id.is_empty()) {
                None => None,
                Some(old_id) => match reconciled.map.get(old_id) {
                    Some(new_id) => Some(new_id),
                    None => {
                        self.record(
                            report,
                            TransferWarning::Unmapped {
                                kind: EntityKind::ReplaySession,
                                item: session.label().to_string(),
                                collection_id: Some(old_id.to_string()),
                            },
                        );
                        continue;
                    }
                },
            };

            let session_id = match self
                .host
                .create_replay_session(&session.raw_bytes, &session.url, collection_id)
                .await
            {
                Ok(id) => id,
                Err(e) => {
                    self.record(
                        report,
                        TransferWarning::CreateFailed {
                            kind: EntityKind::ReplaySession,
                            name: session.label().to_string(),
                            reason: e.to_string(),
                        },
                    );
                    continue;
                }
            };
            report.counts.sessions += 1;

            if !self.options.rename_sessions {
                continue;
            }
            if let Some(name) = session.display_name() {
                if let Err(e) = self.host.rename_replay_session(&session_id, name).await {
                    self.record(
                        report,
                        TransferWarning::RenameFailed {
                            name: name.to_string(),
                            reason: e.to_string(),
                        },
                    );
                }
            }
        }
        self.progress(report.counts.sessions, snapshot.sessions.len(), "replay sessions");
    }

    fn record(&self, report: &mut ApplyReport, warning: TransferWarning) {
        if warning.is_failure() {
            warn!(%warning, "Apply step failed");
        } else {
            debug!(%warning, "Skipped during apply");
        }
        self.notifier.notify(&warning.to_string(), warning.variant());
        report.warnings.push(warning);
    }

    fn progress(&self, created: usize, total: usize, what: &str) {
        if total == 0 {
            return;
        }
        self.notifier
            .notify(&format!("Created {} of {} {}", created, total, what), Variant::Info);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::feedback::RecordingNotifier;
    use crate::host::{
        CollectionInfo, FilterDefinition, HostOp, MemoryHost, ProjectData, ScopeDefinition,
        Workspace,
    };
    use crate::transfer::snapshot::{RuleRecord, SessionRecord};

    fn rule(id: &str, name: &str, collection_id: Option<&str>) -> RuleRecord {
        RuleRecord {
            id: id.to_string(),
            name: name.to_string(),
            is_enabled: true,
            query: String::new(),
            section: json!({ "kind": "requestHeader" }),
            collection_id: collection_id.map(str::to_string),
            sources: None,
        }
    }

    fn session(name: Option<&str>, collection_id: Option<&str>) -> SessionRecord {
        SessionRecord {
            raw_bytes: b"GET / HTTP/1.1\r\n\r\n".to_vec(),
            url: "https://acme.test/".to_string(),
            name: name.map(str::to_string),
            collection_id: collection_id.map(str::to_string),
        }
    }

    fn target_host(target: ProjectData) -> MemoryHost {
        let host = MemoryHost::new(Workspace::default().with_project(target));
        host.select_project("Target").unwrap();
        host.clear_calls();
        host
    }

    fn envelope(snapshot: TransferSnapshot) -> SnapshotEnvelope {
        SnapshotEnvelope::new(None, snapshot)
    }

    #[tokio::test]
    async fn test_empty_snapshot_creates_nothing() {
        let host = target_host(ProjectData::new("p2", "Target"));
        let notifier = RecordingNotifier::new();

        let report = ApplyCoordinator::new(&host, &notifier)
            .apply(&envelope(TransferSnapshot::default()))
            .await
            .unwrap();

        assert_eq!(report.project.name, "Target");
        assert!(report.warnings.is_empty());
        assert!(host.writes().is_empty());
    }

    #[tokio::test]
    async fn test_no_selected_project_is_an_error() {
        let host = MemoryHost::new(Workspace::default());
        let notifier = RecordingNotifier::new();

        let err = ApplyCoordinator::new(&host, &notifier)
            .apply(&envelope(TransferSnapshot::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::NoProject));
    }

    #[tokio::test]
    async fn test_filter_with_existing_alias_is_skipped() {
        let host = target_host(
            ProjectData::new("p2", "Target")
                .with_filter(FilterDefinition::new("Existing", "q0").with_alias("x")),
        );
        let notifier = RecordingNotifier::new();
        let snapshot = TransferSnapshot {
            filters: vec![
                FilterDefinition::new("Dup", "q1").with_alias("x"),
                FilterDefinition::new("Fresh", "q2").with_alias("y"),
                FilterDefinition::new("Unaliased", "q3").with_alias(""),
            ],
            ..TransferSnapshot::default()
        };

        let report = ApplyCoordinator::new(&host, &notifier)
            .apply(&envelope(snapshot))
            .await
            .unwrap();

        assert_eq!(report.counts.filters, 2);
        let created: Vec<_> = host.writes().into_iter().map(|c| c.subject).collect();
        assert_eq!(created, vec!["Fresh", "Unaliased"]);
        assert_eq!(
            notifier.with_variant(Variant::Warning),
            vec!["Skipped filter 'Dup': alias 'x' already exists"]
        );
    }

    #[tokio::test]
    async fn test_rules_follow_their_collection() {
        let host = target_host(ProjectData::new("p2", "Target"));
        let notifier = RecordingNotifier::new();
        let mut snapshot = TransferSnapshot::default();
        snapshot.match_replace.collections = vec![CollectionInfo::new("c1", "Headers")];
        snapshot.match_replace.rules = vec![
            rule("r1", "Strip cookie", Some("c1")),
            rule("r2", "Orphan", None),
            rule("r3", "Empty", Some("")),
        ];

        let report = ApplyCoordinator::new(&host, &notifier)
            .apply(&envelope(snapshot))
            .await
            .unwrap();

        assert_eq!(report.counts.match_replace_collections_created, 1);
        assert_eq!(report.counts.match_replace_rules, 1);
        assert_eq!(report.warnings.len(), 2);

        let ops: Vec<_> = host.writes().into_iter().map(|c| c.op).collect();
        assert_eq!(
            ops,
            vec![
                HostOp::CreateMatchReplaceCollection,
                HostOp::CreateMatchReplaceRule
            ]
        );

        let target = host.project_named("Target").unwrap();
        let new_collection = &target.match_replace_collections[0];
        assert_eq!(new_collection.name, "Headers");
        assert_eq!(
            target.match_replace_rules[0].collection_id.as_deref(),
            Some(new_collection.id.as_str())
        );
        assert!(target.match_replace_rules[0].sources.is_empty());
    }

    #[tokio::test]
    async fn test_existing_collection_is_reused() {
        let host = target_host(
            ProjectData::new("p2", "Target").with_replay_collection("t-9", "Auth"),
        );
        let notifier = RecordingNotifier::new();
        let snapshot = TransferSnapshot {
            replay_collections: vec![CollectionInfo::new("rc-1", "Auth")],
            sessions: vec![session(Some("Login"), Some("rc-1"))],
            ..TransferSnapshot::default()
        };

        let report = ApplyCoordinator::new(&host, &notifier)
            .apply(&envelope(snapshot))
            .await
            .unwrap();

        assert_eq!(report.counts.replay_collections_reused, 1);
        assert_eq!(report.counts.replay_collections_created, 0);
        let target = host.project_named("Target").unwrap();
        assert_eq!(target.replay_collections.len(), 1);
        assert_eq!(target.replay_sessions[0].collection_id.as_deref(), Some("t-9"));
        assert_eq!(target.replay_sessions[0].name, "Login");
    }

    #[tokio::test]
    async fn test_session_placement() {
        let host = target_host(ProjectData::new("p2", "Target"));
        host.fail_on_subject(HostOp::CreateReplayCollection, "Broken");
        let notifier = RecordingNotifier::new();
        let snapshot = TransferSnapshot {
            replay_collections: vec![CollectionInfo::new("rc-1", "Broken")],
            sessions: vec![
                session(Some("Loose"), None),
                session(Some("Stranded"), Some("rc-1")),
                session(None, Some("")),
            ],
            ..TransferSnapshot::default()
        };

        let report = ApplyCoordinator::new(&host, &notifier)
            .apply(&envelope(snapshot))
            .await
            .unwrap();

        assert_eq!(report.counts.sessions, 2);
        assert!(report.warnings.iter().any(|w| matches!(
            w,
            TransferWarning::Unmapped { kind: EntityKind::ReplaySession, item, .. } if item == "Stranded"
        )));

        let target = host.project_named("Target").unwrap();
        assert!(target.replay_sessions.iter().all(|s| s.collection_id.is_none()));
        assert_eq!(target.replay_sessions[0].name, "Loose");
        // Unnamed sessions keep the host default
        assert_eq!(target.replay_sessions[1].name, "Session 2");
    }

    #[tokio::test]
    async fn test_rename_failure_keeps_session() {
        let host = target_host(ProjectData::new("p2", "Target"));
        host.fail_on(HostOp::RenameReplaySession);
        let notifier = RecordingNotifier::new();
        let snapshot = TransferSnapshot {
            sessions: vec![session(Some("Login"), None)],
            ..TransferSnapshot::default()
        };

        let report = ApplyCoordinator::new(&host, &notifier)
            .apply(&envelope(snapshot))
            .await
            .unwrap();

        assert_eq!(report.counts.sessions, 1);
        assert!(matches!(
            &report.warnings[..],
            [TransferWarning::RenameFailed { name, .. }] if name == "Login"
        ));
        assert_eq!(notifier.with_variant(Variant::Error).len(), 1);
    }

    #[tokio::test]
    async fn test_renaming_can_be_turned_off() {
        let host = target_host(ProjectData::new("p2", "Target"));
        let notifier = RecordingNotifier::new();
        let snapshot = TransferSnapshot {
            sessions: vec![session(Some("Login"), None)],
            ..TransferSnapshot::default()
        };

        ApplyCoordinator::new(&host, &notifier)
            .with_options(ApplyOptions {
                rename_sessions: false,
            })
            .apply(&envelope(snapshot))
            .await
            .unwrap();

        assert!(!host
            .calls()
            .iter()
            .any(|call| call.op == HostOp::RenameReplaySession));
    }

    #[tokio::test]
    async fn test_failed_step_does_not_stop_later_steps() {
        let host = target_host(ProjectData::new("p2", "Target"));
        host.fail_on(HostOp::ListFilters);
        host.fail_on_subject(HostOp::CreateScope, "bad");
        let notifier = RecordingNotifier::new();
        let snapshot = TransferSnapshot {
            scopes: vec![ScopeDefinition::new("bad"), ScopeDefinition::new("good")],
            filters: vec![FilterDefinition::new("F", "q")],
            sessions: vec![session(Some("Login"), None)],
            ..TransferSnapshot::default()
        };

        let report = ApplyCoordinator::new(&host, &notifier)
            .apply(&envelope(snapshot))
            .await
            .unwrap();

        assert_eq!(report.counts.scopes, 1);
        assert_eq!(report.counts.filters, 0);
        assert_eq!(report.counts.sessions, 1);
        assert_eq!(report.failures(), 2);
        assert!(report
            .warnings
            .iter()
            .any(|w| matches!(w, TransferWarning::StepFailed { step: "filters", .. })));
    }
}

//! Integration tests for the duplicate flow
//!
//! Capture in one project, switch projects, and check what the target ends
//! up with.

use std::time::Duration;

use super::common::fixtures::{source_project, Harness, LOGIN_REQUEST};
use projdup::host::{HostOp, ProjectChanged};
use projdup::transfer::{ApplyOutcome, ControllerOptions, EntityKind, TransferState};
use projdup::{TransferWarning, Variant};
use tokio::sync::mpsc;

async fn duplicate_to_staging(harness: &Harness) -> ApplyOutcome {
    harness.host.select_project("Acme Prod").unwrap();
    harness.controller.duplicate().await.unwrap();
    harness.host.select_project("Acme Staging").unwrap();
    harness
        .controller
        .on_project_changed(&ProjectChanged::new(Some("Acme Staging".into())))
        .await
}

#[tokio::test]
async fn test_duplicate_copies_into_target() {
    let harness = Harness::new();

    let outcome = duplicate_to_staging(&harness).await;
    let report = outcome.report().expect("snapshot applied");

    assert_eq!(report.counts.scopes, 1);
    assert_eq!(report.counts.filters, 1);
    assert_eq!(report.counts.match_replace_collections_created, 1);
    assert_eq!(report.counts.match_replace_rules, 1);
    assert_eq!(report.counts.replay_collections_reused, 1);
    assert_eq!(report.counts.replay_collections_created, 1);
    assert_eq!(report.counts.sessions, 2);

    let target = harness.target();
    assert_eq!(target.scopes[0].allowlist, vec!["*.acme.test"]);
    assert_eq!(target.scopes[0].denylist, vec!["cdn.acme.test"]);

    let aliases: Vec<_> = target
        .filters
        .iter()
        .filter_map(|f| f.defined_alias())
        .collect();
    assert_eq!(aliases, vec!["api", "noimg"]);

    // The existing "Auth" collection is reused rather than duplicated
    let auth: Vec<_> = target
        .replay_collections
        .iter()
        .filter(|c| c.name == "Auth")
        .collect();
    assert_eq!(auth.len(), 1);

    let login = target
        .replay_sessions
        .iter()
        .find(|s| s.name == "Login")
        .expect("login session copied");
    assert_eq!(login.collection_id.as_deref(), Some("t-auth"));
    let entry = target
        .replay_entries
        .iter()
        .find(|e| Some(&e.id) == login.active_entry_id.as_ref())
        .unwrap();
    let request = target
        .requests
        .iter()
        .find(|r| Some(&r.id) == entry.request_id.as_ref())
        .unwrap();
    assert_eq!(request.raw, LOGIN_REQUEST);
    assert_eq!(request.url, "https://acme.test/login");

    let profile = target
        .replay_collections
        .iter()
        .find(|c| c.name == "Profile")
        .unwrap();
    let who = target
        .replay_sessions
        .iter()
        .find(|s| s.name == "Who am I")
        .unwrap();
    assert_eq!(who.collection_id.as_ref(), Some(&profile.id));
}

#[tokio::test]
async fn test_source_is_never_written() {
    let harness = Harness::new();

    duplicate_to_staging(&harness).await;

    assert_eq!(harness.source(), source_project());
}

#[tokio::test]
async fn test_skips_are_reported() {
    let harness = Harness::new();

    let outcome = duplicate_to_staging(&harness).await;
    let report = outcome.report().unwrap();

    assert_eq!(report.failures(), 0);
    assert!(report.warnings.contains(&TransferWarning::DuplicateFilter {
        name: "Only API".to_string(),
        alias: "api".to_string(),
    }));
    assert!(report.warnings.contains(&TransferWarning::Unmapped {
        kind: EntityKind::MatchReplaceRule,
        item: "Loose rule".to_string(),
        collection_id: None,
    }));

    let warnings = harness.notifier.with_variant(Variant::Warning);
    assert!(warnings
        .iter()
        .any(|m| m == "Skipped replay session 'Broken': no entry has a request"));
    assert!(warnings
        .iter()
        .any(|m| m == "Skipped match/replace rule 'Loose rule': no collection assigned"));
}

#[tokio::test]
async fn test_collections_are_created_before_their_members() {
    let harness = Harness::new();
    harness.host.select_project("Acme Prod").unwrap();
    harness.controller.duplicate().await.unwrap();
    harness.host.select_project("Acme Staging").unwrap();
    harness.host.clear_calls();

    harness
        .controller
        .on_project_changed(&ProjectChanged::new(None))
        .await;

    let writes: Vec<_> = harness
        .host
        .writes()
        .into_iter()
        .map(|call| (call.op, call.subject))
        .collect();
    assert_eq!(
        writes,
        vec![
            (HostOp::CreateScope, "acme".to_string()),
            (HostOp::CreateFilter, "No images".to_string()),
            (HostOp::CreateMatchReplaceCollection, "Headers".to_string()),
            (HostOp::CreateMatchReplaceRule, "Strip cookie".to_string()),
            (HostOp::CreateReplayCollection, "Profile".to_string()),
            (
                HostOp::CreateReplaySession,
                "https://acme.test/login".to_string()
            ),
            (HostOp::RenameReplaySession, "Login".to_string()),
            (HostOp::CreateReplaySession, "https://acme.test/me".to_string()),
            (HostOp::RenameReplaySession, "Who am I".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_notifications_without_capture_do_nothing() {
    let harness = Harness::new();
    harness.host.select_project("Acme Staging").unwrap();
    harness.host.clear_calls();

    let outcome = harness
        .controller
        .on_project_changed(&ProjectChanged::new(Some("Acme Staging".into())))
        .await;

    assert!(matches!(outcome, ApplyOutcome::NotArmed));
    assert!(harness.host.calls().is_empty());
}

#[tokio::test]
async fn test_burst_of_switches_applies_once() {
    let harness = Harness::new();
    harness.host.select_project("Acme Prod").unwrap();
    harness.controller.duplicate().await.unwrap();

    let (tx, mut outcomes) = mpsc::unbounded_channel();
    let listener = harness
        .controller
        .clone()
        .listen(harness.host.subscribe(), Some(tx));

    harness.host.select_project("Acme Staging").unwrap();
    for _ in 0..4 {
        harness
            .host
            .emit_project_changed(Some("Acme Staging".into()));
    }

    let mut applied = 0;
    for _ in 0..5 {
        let outcome = tokio::time::timeout(Duration::from_secs(5), outcomes.recv())
            .await
            .expect("outcome delivered")
            .expect("channel open");
        if matches!(outcome, ApplyOutcome::Applied(_)) {
            applied += 1;
        }
    }
    listener.abort();

    assert_eq!(applied, 1);
    assert_eq!(harness.target().scopes.len(), 1);
    assert_eq!(
        harness.controller.store().state(),
        TransferState::Idle
    );
}

#[tokio::test]
async fn test_failures_in_one_category_do_not_block_others() {
    let harness = Harness::new();
    harness.host.select_project("Acme Prod").unwrap();
    harness.controller.duplicate().await.unwrap();

    harness
        .host
        .fail_on_subject(HostOp::CreateMatchReplaceCollection, "Headers");
    harness.host.fail_on(HostOp::ListFilters);
    harness.host.select_project("Acme Staging").unwrap();
    let outcome = harness
        .controller
        .on_project_changed(&ProjectChanged::new(None))
        .await;
    let report = outcome.report().unwrap();

    assert_eq!(report.counts.scopes, 1);
    assert_eq!(report.counts.filters, 0);
    assert_eq!(report.counts.match_replace_rules, 0);
    assert_eq!(report.counts.sessions, 2);
    assert!(report.warnings.iter().any(|w| matches!(
        w,
        TransferWarning::Unmapped {
            kind: EntityKind::MatchReplaceRule,
            collection_id: Some(id),
            ..
        } if id == "mr-1"
    )));
    assert!(!harness.notifier.with_variant(Variant::Error).is_empty());
}

#[tokio::test]
async fn test_applying_to_a_second_project_needs_a_new_capture() {
    let harness = Harness::with_options(ControllerOptions::default());

    duplicate_to_staging(&harness).await;
    harness.host.select_project("Acme Prod").unwrap();
    let outcome = harness
        .controller
        .on_project_changed(&ProjectChanged::new(Some("Acme Prod".into())))
        .await;

    assert!(matches!(outcome, ApplyOutcome::NotArmed));
    assert_eq!(harness.source(), source_project());
}

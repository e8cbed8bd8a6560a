//! Integration tests for snapshots written to and read from disk

use super::common::fixtures::{Harness, PROFILE_REQUEST};
use projdup::host::ProjectChanged;
use projdup::transfer::ApplyOutcome;
use projdup::{SnapshotAssembler, SnapshotEnvelope, TransferError};
use tempfile::TempDir;

#[tokio::test]
async fn test_captured_file_applies_in_another_session() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("snapshots").join("prod.json");

    // Capture with one host...
    let capturing = Harness::new();
    capturing.host.select_project("Acme Prod").unwrap();
    let outcome = SnapshotAssembler::new(capturing.host.as_ref())
        .capture()
        .await
        .unwrap();
    outcome.envelope.save(&path).unwrap();

    // ...and apply with a fresh one
    let applying = Harness::new();
    let envelope = SnapshotEnvelope::load(&path).unwrap();
    assert_eq!(envelope.source_name(), "Acme Prod");
    assert_eq!(envelope.fingerprint(), outcome.envelope.fingerprint());

    applying.controller.stage(envelope);
    applying.host.select_project("Acme Staging").unwrap();
    let applied = applying
        .controller
        .on_project_changed(&ProjectChanged::new(None))
        .await;

    let report = applied.report().expect("snapshot applied");
    assert_eq!(report.counts.sessions, 2);
    assert!(applying
        .target()
        .requests
        .iter()
        .any(|r| r.raw == PROFILE_REQUEST));
}

#[tokio::test]
async fn test_legacy_snapshot_without_version_or_sources() {
    let legacy = r#"{
        "snapshot": {
            "scopes": [{ "name": "legacy", "allowlist": ["old.acme.test"], "denylist": [] }],
            "matchReplace": {
                "collections": [{ "id": "c-1", "name": "Old rules" }],
                "rules": [{
                    "id": "r-1",
                    "name": "Legacy rule",
                    "isEnabled": true,
                    "query": "",
                    "section": { "kind": "responseBody" },
                    "collectionId": "c-1"
                }]
            }
        }
    }"#;

    let envelope = SnapshotEnvelope::from_json(legacy).unwrap();
    assert_eq!(envelope.version, 0);
    assert!(envelope.source_project.is_none());

    let harness = Harness::new();
    harness.controller.stage(envelope);
    harness.host.select_project("Acme Staging").unwrap();
    let outcome = harness
        .controller
        .on_project_changed(&ProjectChanged::new(None))
        .await;

    assert!(matches!(outcome, ApplyOutcome::Applied(_)));
    let target = harness.target();
    assert_eq!(target.scopes[0].name, "legacy");
    assert_eq!(target.match_replace_rules[0].name, "Legacy rule");
    assert!(target.match_replace_rules[0].sources.is_empty());
}

#[test]
fn test_newer_snapshot_version_is_rejected() {
    let err = SnapshotEnvelope::from_json(r#"{ "version": 99, "snapshot": {} }"#).unwrap_err();
    assert!(matches!(
        err,
        TransferError::UnsupportedVersion { found: 99, .. }
    ));
}

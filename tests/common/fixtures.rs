//! Workspace fixtures

use std::sync::Arc;

use projdup::host::{
    FilterDefinition, MatchReplaceRuleInfo, ProjectData, ReplayEntry, ReplaySessionInfo,
    ScopeDefinition,
};
use projdup::transfer::ControllerOptions;
use projdup::{MemoryHost, RecordingNotifier, TransferController, TransferStore, Workspace};
use serde_json::json;

pub const LOGIN_REQUEST: &[u8] = b"POST /login HTTP/1.1\r\nHost: acme.test\r\nContent-Length: 0\r\n\r\n";
pub const PROFILE_REQUEST: &[u8] = b"GET /me HTTP/1.1\r\nHost: acme.test\r\n\r\n";

pub fn rule(id: &str, name: &str, collection_id: Option<&str>) -> MatchReplaceRuleInfo {
    MatchReplaceRuleInfo {
        id: id.to_string(),
        name: name.to_string(),
        is_enabled: true,
        query: "req.host.eq:\"acme.test\"".to_string(),
        section: json!({ "kind": "requestHeader", "name": "Cookie" }),
        collection_id: collection_id.map(str::to_string),
        sources: vec!["intercept".to_string()],
    }
}

/// Project with one of everything, plus a session that has no request
pub fn source_project() -> ProjectData {
    ProjectData::new("src", "Acme Prod")
        .with_scope(
            ScopeDefinition::new("acme")
                .with_allowlist(vec!["*.acme.test".to_string()])
                .with_denylist(vec!["cdn.acme.test".to_string()]),
        )
        .with_filter(FilterDefinition::new("No images", "resp.mime.ne:image").with_alias("noimg"))
        .with_filter(FilterDefinition::new("Only API", "req.path.cont:/api").with_alias("api"))
        .with_match_replace_collection("mr-1", "Headers")
        .with_match_replace_rule(rule("r-1", "Strip cookie", Some("mr-1")))
        .with_match_replace_rule(rule("r-2", "Loose rule", None))
        .with_replay_collection("rc-1", "Auth")
        .with_replay_collection("rc-2", "Profile")
        .with_replay_session(
            "s-1",
            "Login",
            Some("rc-1"),
            LOGIN_REQUEST,
            "https://acme.test/login",
        )
        .with_replay_session(
            "s-2",
            "Who am I",
            Some("rc-2"),
            PROFILE_REQUEST,
            "https://acme.test/me",
        )
        .with_replay_session_entries(
            ReplaySessionInfo {
                id: "s-3".to_string(),
                name: "Broken".to_string(),
                collection_id: Some("rc-2".to_string()),
                active_entry_id: Some("e-dead".to_string()),
                entry_ids: vec!["e-dead".to_string()],
            },
            vec![ReplayEntry {
                id: "e-dead".to_string(),
                request_id: None,
            }],
        )
}

/// Project that already has an "Auth" replay collection and the "api" filter
pub fn target_project() -> ProjectData {
    ProjectData::new("dst", "Acme Staging")
        .with_filter(FilterDefinition::new("API calls", "req.path.cont:/v2").with_alias("api"))
        .with_replay_collection("t-auth", "Auth")
}

pub fn workspace() -> Workspace {
    Workspace::default()
        .with_project(source_project())
        .with_project(target_project())
}

pub struct Harness {
    pub host: Arc<MemoryHost>,
    pub notifier: Arc<RecordingNotifier>,
    pub controller: Arc<TransferController>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_options(ControllerOptions::default())
    }

    pub fn with_options(options: ControllerOptions) -> Self {
        let host = Arc::new(MemoryHost::new(workspace()));
        let notifier = Arc::new(RecordingNotifier::new());
        let controller = Arc::new(TransferController::new(
            host.clone(),
            notifier.clone(),
            Arc::new(TransferStore::new()),
            options,
        ));
        Self {
            host,
            notifier,
            controller,
        }
    }

    pub fn source(&self) -> ProjectData {
        self.host
            .project_named("Acme Prod")
            .expect("source project exists")
    }

    pub fn target(&self) -> ProjectData {
        self.host
            .project_named("Acme Staging")
            .expect("target project exists")
    }
}

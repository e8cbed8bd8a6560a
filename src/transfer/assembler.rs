//! Snapshot capture from the source project

use serde::Deserialize;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::host::{Project, ProjectHost, ReplaySessionInfo};
use crate::transfer::error::TransferError;
use crate::transfer::report::TransferWarning;
use crate::transfer::resolve_project;
use crate::transfer::snapshot::{
    MatchReplaceSnapshot, RuleRecord, SessionRecord, SnapshotEnvelope, TransferSnapshot,
};

/// Which entity categories a capture reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CaptureOptions {
    pub scopes: bool,
    pub filters: bool,
    pub match_replace: bool,
    pub replay: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            scopes: true,
            filters: true,
            match_replace: true,
            replay: true,
        }
    }
}

/// A captured snapshot plus the sessions that had to be left out
#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    pub envelope: SnapshotEnvelope,
    pub warnings: Vec<TransferWarning>,
}

/// Reads the selected project into a [`TransferSnapshot`]. Never writes.
pub struct SnapshotAssembler<'a> {
    host: &'a dyn ProjectHost,
    options: CaptureOptions,
}

impl<'a> SnapshotAssembler<'a> {
    pub fn new(host: &'a dyn ProjectHost) -> Self {
        Self {
            host,
            options: CaptureOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CaptureOptions) -> Self {
        self.options = options;
        self
    }

    /// Capture the currently selected project.
    ///
    /// A failed list call aborts the capture. Sessions whose request cannot
    /// be resolved are left out and reported as warnings.
    pub async fn capture(&self) -> Result<CaptureOutcome, TransferError> {
        let project = resolve_project(self.host).await?;
        let span = info_span!("capture", project = %project.name);
        self.capture_project(project).instrument(span).await
    }

    async fn capture_project(&self, project: Project) -> Result<CaptureOutcome, TransferError> {
        let mut snapshot = TransferSnapshot::default();
        let mut warnings = Vec::new();

        if self.options.scopes {
            snapshot.scopes = self
                .host
                .list_scopes()
                .await
                .map_err(TransferError::read("scopes"))?;
        }

        if self.options.filters {
            snapshot.filters = self
                .host
                .list_filters()
                .await
                .map_err(TransferError::read("filters"))?;
        }

        if self.options.match_replace {
            let collections = self
                .host
                .list_match_replace_collections()
                .await
                .map_err(TransferError::read("match/replace collections"))?;
            let rules = self
                .host
                .list_match_replace_rules()
                .await
                .map_err(TransferError::read("match/replace rules"))?;

            snapshot.match_replace = MatchReplaceSnapshot {
                collections,
                rules: rules.iter().map(RuleRecord::from).collect(),
            };
        }

        if self.options.replay {
            snapshot.replay_collections = self
                .host
                .list_replay_collections()
                .await
                .map_err(TransferError::read("replay collections"))?;
            let sessions = self
                .host
                .list_replay_sessions()
                .await
                .map_err(TransferError::read("replay sessions"))?;

            for session in &sessions {
                match self.capture_session(session).await {
                    Ok(record) => snapshot.sessions.push(record),
                    Err(warning) => {
                        warn!(session = %session.id, %warning, "Leaving session out of snapshot");
                        warnings.push(warning);
                    }
                }
            }
        }

        warnings.extend(snapshot.dangling_references());

        info!(
            scopes = snapshot.scopes.len(),
            filters = snapshot.filters.len(),
            rules = snapshot.match_replace.rules.len(),
            sessions = snapshot.sessions.len(),
            skipped = warnings.len(),
            "Captured snapshot"
        );

        Ok(CaptureOutcome {
            envelope: SnapshotEnvelope::new(Some(project), snapshot),
            warnings,
        })
    }

    async fn capture_session(
        &self,
        session: &ReplaySessionInfo,
    ) -> Result<SessionRecord, TransferWarning> {
        let label = session_label(session);

        let request_id = self
            .resolve_request_id(session)
            .await
            .ok_or_else(|| TransferWarning::SessionWithoutRequest {
                session: label.clone(),
            })?;

        let request = match self.host.request(&request_id).await {
            Ok(Some(request)) => request,
            Ok(None) => {
                return Err(TransferWarning::RequestUnavailable {
                    session: label,
                    reason: format!("request {} not found", request_id),
                })
            }
            Err(e) => {
                return Err(TransferWarning::RequestUnavailable {
                    session: label,
                    reason: e.to_string(),
                })
            }
        };

        Ok(SessionRecord {
            raw_bytes: request.raw,
            url: request.url,
            name: Some(session.name.clone()).filter(|name| !name.is_empty()),
            collection_id: session.collection_id.clone().filter(|id| !id.is_empty()),
        })
    }

    /// The active entry's request, else the first entry (in order) that has one
    async fn resolve_request_id(&self, session: &ReplaySessionInfo) -> Option<String> {
        let active = session.active_entry_id.as_deref();
        if let Some(entry_id) = active {
            if let Some(request_id) = self.entry_request_id(entry_id).await {
                return Some(request_id);
            }
        }

        for entry_id in session.entry_ids.iter().map(String::as_str) {
            if Some(entry_id) == active {
                continue;
            }
            if let Some(request_id) = self.entry_request_id(entry_id).await {
                debug!(session = %session.id, entry = %entry_id, "Using fallback entry");
                return Some(request_id);
            }
        }

        None
    }

    async fn entry_request_id(&self, entry_id: &str) -> Option<String> {
        match self.host.replay_entry(entry_id).await {
            Ok(entry) => entry.and_then(|e| e.request_id).filter(|id| !id.is_empty()),
            Err(e) => {
                debug!(entry = %entry_id, error = %e, "Replay entry lookup failed");
                None
            }
        }
    }
}

fn session_label(session: &ReplaySessionInfo) -> String {
    if session.name.is_empty() {
        session.id.clone()
    } else {
        session.name.clone()
    }
}

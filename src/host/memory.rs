//! In-process host backed by a [`Workspace`]
//!
//! Implements [`ProjectHost`] without a real host application. The CLI uses it
//! over a workspace file; tests use it to script failures and to inspect the
//! order of host calls.
//!
//! # Example
//! ```no_run
//! use projdup::host::{HostOp, MemoryHost, ProjectData, Workspace};
//!
//! let workspace = Workspace::default().with_project(ProjectData::new("p1", "Acme"));
//! let host = MemoryHost::new(workspace);
//! host.fail_on_subject(HostOp::CreateFilter, "Only errors");
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::host::error::HostError;
use crate::host::interface::ProjectHost;
use crate::host::types::{
    CollectionInfo, FilterDefinition, MatchReplaceRuleInfo, NewMatchReplaceRule, Project,
    ProjectChanged, ReplayEntry, ReplaySessionInfo, RequestData, ScopeDefinition,
};
use crate::host::workspace::{ProjectData, StoredRequest, Workspace};

/// Host operation, used for failure injection and the call journal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostOp {
    CurrentProject,
    ListScopes,
    ListFilters,
    ListMatchReplaceCollections,
    ListMatchReplaceRules,
    ListReplayCollections,
    ListReplaySessions,
    ReplayEntry,
    Request,
    CreateScope,
    CreateFilter,
    CreateMatchReplaceCollection,
    CreateMatchReplaceRule,
    CreateReplayCollection,
    CreateReplaySession,
    RenameReplaySession,
}

impl HostOp {
    /// Whether the operation mutates the selected project
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            HostOp::CreateScope
                | HostOp::CreateFilter
                | HostOp::CreateMatchReplaceCollection
                | HostOp::CreateMatchReplaceRule
                | HostOp::CreateReplayCollection
                | HostOp::CreateReplaySession
                | HostOp::RenameReplaySession
        )
    }
}

/// One recorded host call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCall {
    pub op: HostOp,
    /// Name, id or URL the call was about (empty for list calls)
    pub subject: String,
}

#[derive(Debug, Clone)]
struct InjectedFailure {
    op: HostOp,
    subject: Option<String>,
}

/// Host implementation holding a whole workspace in memory
pub struct MemoryHost {
    workspace: Mutex<Workspace>,
    failures: Mutex<Vec<InjectedFailure>>,
    journal: Mutex<Vec<HostCall>>,
    listener: Mutex<Option<mpsc::UnboundedSender<ProjectChanged>>>,
}

impl MemoryHost {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            workspace: Mutex::new(workspace),
            failures: Mutex::new(Vec::new()),
            journal: Mutex::new(Vec::new()),
            listener: Mutex::new(None),
        }
    }

    /// Copy of the current workspace state
    pub fn workspace(&self) -> Workspace {
        self.workspace.lock().clone()
    }

    /// Copy of one project's state, looked up by name
    pub fn project_named(&self, name: &str) -> Option<ProjectData> {
        self.workspace.lock().project_by_name(name).cloned()
    }

    /// Register the project-changed listener. Replaces any earlier one.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ProjectChanged> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.listener.lock() = Some(tx);
        rx
    }

    /// Select a project by name and notify the listener
    pub fn select_project(&self, name: &str) -> Result<Project, HostError> {
        let project = {
            let mut workspace = self.workspace.lock();
            let project = workspace
                .project_by_name(name)
                .map(ProjectData::project)
                .ok_or_else(|| HostError::not_found("project", name))?;
            workspace.selected = Some(project.id.clone());
            project
        };

        tracing::debug!(project = %project.name, "Selected project");
        self.emit_project_changed(Some(project.name.clone()));
        Ok(project)
    }

    /// Deliver a project-changed notification without switching projects
    pub fn emit_project_changed(&self, project_name: Option<String>) {
        if let Some(listener) = self.listener.lock().as_ref() {
            if listener.send(ProjectChanged::new(project_name)).is_err() {
                tracing::debug!("Project-changed listener dropped");
            }
        }
    }

    /// Make every call of `op` fail
    pub fn fail_on(&self, op: HostOp) {
        self.failures.lock().push(InjectedFailure { op, subject: None });
    }

    /// Make calls of `op` fail when they concern `subject`
    pub fn fail_on_subject(&self, op: HostOp, subject: impl Into<String>) {
        self.failures.lock().push(InjectedFailure {
            op,
            subject: Some(subject.into()),
        });
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<HostCall> {
        self.journal.lock().clone()
    }

    /// Write calls made so far, in order
    pub fn writes(&self) -> Vec<HostCall> {
        self.journal
            .lock()
            .iter()
            .filter(|call| call.op.is_write())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.journal.lock().clear();
    }

    fn record(&self, op: HostOp, subject: &str) -> Result<(), HostError> {
        self.journal.lock().push(HostCall {
            op,
            subject: subject.to_string(),
        });

        let fails = self.failures.lock().iter().any(|failure| {
            failure.op == op
                && failure
                    .subject
                    .as_deref()
                    .map_or(true, |expected| expected == subject)
        });
        if fails {
            return Err(HostError::Rejected(format!("{:?} failed for '{}'", op, subject)));
        }
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&ProjectData) -> T) -> Result<T, HostError> {
        let workspace = self.workspace.lock();
        let project = workspace
            .selected_project()
            .ok_or_else(|| HostError::Unavailable("no project selected".to_string()))?;
        Ok(f(project))
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut ProjectData) -> Result<T, HostError>,
    ) -> Result<T, HostError> {
        let mut workspace = self.workspace.lock();
        let selected = workspace
            .selected
            .clone()
            .ok_or_else(|| HostError::Unavailable("no project selected".to_string()))?;
        let project = workspace
            .project_mut(&selected)
            .ok_or_else(|| HostError::not_found("project", selected.clone()))?;
        f(project)
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[async_trait]
impl ProjectHost for MemoryHost {
    async fn current_project(&self) -> Result<Option<Project>, HostError> {
        self.record(HostOp::CurrentProject, "")?;
        Ok(self.workspace.lock().selected_project().map(ProjectData::project))
    }

    async fn list_scopes(&self) -> Result<Vec<ScopeDefinition>, HostError> {
        self.record(HostOp::ListScopes, "")?;
        self.read(|p| p.scopes.clone())
    }

    async fn list_filters(&self) -> Result<Vec<FilterDefinition>, HostError> {
        self.record(HostOp::ListFilters, "")?;
        self.read(|p| p.filters.clone())
    }

    async fn list_match_replace_collections(&self) -> Result<Vec<CollectionInfo>, HostError> {
        self.record(HostOp::ListMatchReplaceCollections, "")?;
        self.read(|p| p.match_replace_collections.clone())
    }

    async fn list_match_replace_rules(&self) -> Result<Vec<MatchReplaceRuleInfo>, HostError> {
        self.record(HostOp::ListMatchReplaceRules, "")?;
        self.read(|p| p.match_replace_rules.clone())
    }

    async fn list_replay_collections(&self) -> Result<Vec<CollectionInfo>, HostError> {
        self.record(HostOp::ListReplayCollections, "")?;
        self.read(|p| p.replay_collections.clone())
    }

    async fn list_replay_sessions(&self) -> Result<Vec<ReplaySessionInfo>, HostError> {
        self.record(HostOp::ListReplaySessions, "")?;
        self.read(|p| p.replay_sessions.clone())
    }

    async fn replay_entry(&self, entry_id: &str) -> Result<Option<ReplayEntry>, HostError> {
        self.record(HostOp::ReplayEntry, entry_id)?;
        self.read(|p| p.replay_entries.iter().find(|e| e.id == entry_id).cloned())
    }

    async fn request(&self, request_id: &str) -> Result<Option<RequestData>, HostError> {
        self.record(HostOp::Request, request_id)?;
        self.read(|p| {
            p.requests
                .iter()
                .find(|r| r.id == request_id)
                .map(StoredRequest::to_request_data)
        })
    }

    async fn create_scope(&self, scope: &ScopeDefinition) -> Result<String, HostError> {
        self.record(HostOp::CreateScope, &scope.name)?;
        self.write(|p| {
            p.scopes.push(scope.clone());
            Ok(new_id())
        })
    }

    async fn create_filter(&self, filter: &FilterDefinition) -> Result<String, HostError> {
        self.record(HostOp::CreateFilter, &filter.name)?;
        self.write(|p| {
            p.filters.push(filter.clone());
            Ok(new_id())
        })
    }

    async fn create_match_replace_collection(&self, name: &str) -> Result<String, HostError> {
        self.record(HostOp::CreateMatchReplaceCollection, name)?;
        self.write(|p| {
            let id = new_id();
            p.match_replace_collections
                .push(CollectionInfo::new(id.clone(), name));
            Ok(id)
        })
    }

    async fn create_match_replace_rule(
        &self,
        rule: &NewMatchReplaceRule,
    ) -> Result<String, HostError> {
        self.record(HostOp::CreateMatchReplaceRule, &rule.name)?;
        self.write(|p| {
            if !p
                .match_replace_collections
                .iter()
                .any(|c| c.id == rule.collection_id)
            {
                return Err(HostError::not_found(
                    "match/replace collection",
                    rule.collection_id.clone(),
                ));
            }

            let id = new_id();
            p.match_replace_rules.push(MatchReplaceRuleInfo {
                id: id.clone(),
                name: rule.name.clone(),
                is_enabled: false,
                query: rule.query.clone(),
                section: rule.section.clone(),
                collection_id: Some(rule.collection_id.clone()),
                sources: rule.sources.clone(),
            });
            Ok(id)
        })
    }

    async fn create_replay_collection(&self, name: &str) -> Result<String, HostError> {
        self.record(HostOp::CreateReplayCollection, name)?;
        self.write(|p| {
            let id = new_id();
            p.replay_collections.push(CollectionInfo::new(id.clone(), name));
            Ok(id)
        })
    }

    async fn create_replay_session(
        &self,
        raw: &[u8],
        url: &str,
        collection_id: Option<&str>,
    ) -> Result<String, HostError> {
        self.record(HostOp::CreateReplaySession, url)?;
        self.write(|p| {
            if let Some(collection_id) = collection_id {
                if !p.replay_collections.iter().any(|c| c.id == collection_id) {
                    return Err(HostError::not_found("replay collection", collection_id));
                }
            }

            let request_id = new_id();
            let entry_id = new_id();
            let session_id = new_id();
            let default_name = format!("Session {}", p.replay_sessions.len() + 1);

            p.requests.push(StoredRequest {
                id: request_id.clone(),
                raw: raw.to_vec(),
                url: url.to_string(),
            });
            p.replay_entries.push(ReplayEntry {
                id: entry_id.clone(),
                request_id: Some(request_id),
            });
            p.replay_sessions.push(ReplaySessionInfo {
                id: session_id.clone(),
                name: default_name,
                collection_id: collection_id.map(str::to_string),
                active_entry_id: Some(entry_id.clone()),
                entry_ids: vec![entry_id],
            });
            Ok(session_id)
        })
    }

    async fn rename_replay_session(&self, session_id: &str, name: &str) -> Result<(), HostError> {
        self.record(HostOp::RenameReplaySession, name)?;
        self.write(|p| {
            let session = p
                .replay_sessions
                .iter_mut()
                .find(|s| s.id == session_id)
                .ok_or_else(|| HostError::not_found("replay session", session_id))?;
            session.name = name.to_string();
            Ok(())
        })
    }
}

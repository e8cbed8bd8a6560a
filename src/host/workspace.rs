//! On-disk model of a host workspace
//!
//! A workspace holds every project the host knows about plus which one is
//! selected. It is stored as pretty-printed JSON; request bytes are base64.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::host::error::HostError;
use crate::host::types::{
    CollectionInfo, FilterDefinition, MatchReplaceRuleInfo, Project, ReplayEntry,
    ReplaySessionInfo, RequestData, ScopeDefinition,
};
use crate::util::encoding::base64_bytes;

/// All projects in one host installation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    /// Id of the selected project
    #[serde(default)]
    pub selected: Option<String>,
    #[serde(default)]
    pub projects: Vec<ProjectData>,
}

/// Request stored by the host, referenced from replay entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRequest {
    pub id: String,
    #[serde(with = "base64_bytes")]
    pub raw: Vec<u8>,
    pub url: String,
}

impl StoredRequest {
    pub fn to_request_data(&self) -> RequestData {
        RequestData {
            raw: self.raw.clone(),
            url: self.url.clone(),
        }
    }
}

/// Every entity of a single project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectData {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub scopes: Vec<ScopeDefinition>,
    #[serde(default)]
    pub filters: Vec<FilterDefinition>,
    #[serde(default)]
    pub match_replace_collections: Vec<CollectionInfo>,
    #[serde(default)]
    pub match_replace_rules: Vec<MatchReplaceRuleInfo>,
    #[serde(default)]
    pub replay_collections: Vec<CollectionInfo>,
    #[serde(default)]
    pub replay_sessions: Vec<ReplaySessionInfo>,
    #[serde(default)]
    pub replay_entries: Vec<ReplayEntry>,
    #[serde(default)]
    pub requests: Vec<StoredRequest>,
}

impl Workspace {
    /// Load a workspace file. Missing or unparsable files are errors.
    pub fn load(path: &Path) -> Result<Self, HostError> {
        let contents = fs::read_to_string(path)?;
        let workspace = serde_json::from_str(&contents)?;
        Ok(workspace)
    }

    /// Save the workspace, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<(), HostError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn with_project(mut self, project: ProjectData) -> Self {
        self.projects.push(project);
        self
    }

    /// Find a project by display name (first match)
    pub fn project_by_name(&self, name: &str) -> Option<&ProjectData> {
        self.projects.iter().find(|p| p.name == name)
    }

    pub fn project(&self, id: &str) -> Option<&ProjectData> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn project_mut(&mut self, id: &str) -> Option<&mut ProjectData> {
        self.projects.iter_mut().find(|p| p.id == id)
    }

    pub fn selected_project(&self) -> Option<&ProjectData> {
        self.selected.as_deref().and_then(|id| self.project(id))
    }
}

impl ProjectData {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn project(&self) -> Project {
        Project {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }

    pub fn with_scope(mut self, scope: ScopeDefinition) -> Self {
        self.scopes.push(scope);
        self
    }

    pub fn with_filter(mut self, filter: FilterDefinition) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_match_replace_collection(
        mut self,
        id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        self.match_replace_collections.push(CollectionInfo::new(id, name));
        self
    }

    pub fn with_match_replace_rule(mut self, rule: MatchReplaceRuleInfo) -> Self {
        self.match_replace_rules.push(rule);
        self
    }

    pub fn with_replay_collection(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.replay_collections.push(CollectionInfo::new(id, name));
        self
    }

    /// Add a replay session with a single entry pointing at a stored request.
    /// The entry and request ids are derived from the session id.
    pub fn with_replay_session(
        mut self,
        id: &str,
        name: &str,
        collection_id: Option<&str>,
        raw: &[u8],
        url: &str,
    ) -> Self {
        let entry_id = format!("{}-entry", id);
        let request_id = format!("{}-request", id);

        self.requests.push(StoredRequest {
            id: request_id.clone(),
            raw: raw.to_vec(),
            url: url.to_string(),
        });
        self.replay_entries.push(ReplayEntry {
            id: entry_id.clone(),
            request_id: Some(request_id),
        });
        self.replay_sessions.push(ReplaySessionInfo {
            id: id.to_string(),
            name: name.to_string(),
            collection_id: collection_id.map(str::to_string),
            active_entry_id: Some(entry_id.clone()),
            entry_ids: vec![entry_id],
        });
        self
    }

    /// Add a replay session whose entries are given explicitly
    pub fn with_replay_session_entries(
        mut self,
        session: ReplaySessionInfo,
        entries: Vec<ReplayEntry>,
    ) -> Self {
        self.replay_entries.extend(entries);
        self.replay_sessions.push(session);
        self
    }

    pub fn with_request(mut self, id: &str, raw: &[u8], url: &str) -> Self {
        self.requests.push(StoredRequest {
            id: id.to_string(),
            raw: raw.to_vec(),
            url: url.to_string(),
        });
        self
    }
}

//! Entity shapes exchanged with the host application

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::util::encoding::base64_bytes;

/// A project workspace in the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
}

/// Scope definition
///
/// Scopes are copied verbatim. Host fields this crate does not model are kept
/// in `extra` so they survive the round trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeDefinition {
    pub name: String,
    #[serde(default)]
    pub allowlist: Vec<String>,
    #[serde(default)]
    pub denylist: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ScopeDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_allowlist(mut self, hosts: Vec<String>) -> Self {
        self.allowlist = hosts;
        self
    }

    pub fn with_denylist(mut self, hosts: Vec<String>) -> Self {
        self.denylist = hosts;
        self
    }
}

/// Filter preset. `alias` is the natural key used for deduplication.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterDefinition {
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub query: String,
}

impl FilterDefinition {
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            query: query.into(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// The alias, if one is set and non-empty
    pub fn defined_alias(&self) -> Option<&str> {
        self.alias.as_deref().filter(|alias| !alias.is_empty())
    }
}

/// Collection of match/replace rules or replay sessions.
///
/// Only identity and name are kept; other collection attributes are not
/// carried between projects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub id: String,
    pub name: String,
}

impl CollectionInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Match/replace rule as listed by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchReplaceRuleInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_enabled: bool,
    #[serde(default)]
    pub query: String,
    /// Host-defined description of what part of the message is rewritten
    #[serde(default)]
    pub section: Value,
    #[serde(default)]
    pub collection_id: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
}

/// Arguments for creating a match/replace rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMatchReplaceRule {
    pub collection_id: String,
    pub name: String,
    pub query: String,
    pub section: Value,
    pub sources: Vec<String>,
}

/// Replay session as listed by the host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaySessionInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub collection_id: Option<String>,
    #[serde(default)]
    pub active_entry_id: Option<String>,
    /// Entries in the order the host keeps them
    #[serde(default)]
    pub entry_ids: Vec<String>,
}

/// One send within a replay session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayEntry {
    pub id: String,
    #[serde(default)]
    pub request_id: Option<String>,
}

/// Raw request bytes plus where they were sent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestData {
    #[serde(with = "base64_bytes")]
    pub raw: Vec<u8>,
    pub url: String,
}

/// "Project changed" notification payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectChanged {
    /// Display name of the newly selected project, when the host knows it
    pub project_name: Option<String>,
}

impl ProjectChanged {
    pub fn new(project_name: Option<String>) -> Self {
        Self { project_name }
    }
}

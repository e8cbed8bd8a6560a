//! Snapshot data model
//!
//! Collection ids inside a snapshot belong to the source project. They are
//! only meaningful within the snapshot and must go through an
//! [`IdentityMap`](crate::transfer::IdentityMap) before reaching the host.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::host::{
    CollectionInfo, FilterDefinition, MatchReplaceRuleInfo, Project, ScopeDefinition,
};
use crate::transfer::error::TransferError;
use crate::transfer::report::{EntityKind, TransferWarning};
use crate::util::encoding::base64_bytes;

/// Current snapshot schema version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Everything copied from the source project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferSnapshot {
    #[serde(default)]
    pub scopes: Vec<ScopeDefinition>,
    #[serde(default)]
    pub filters: Vec<FilterDefinition>,
    #[serde(default)]
    pub match_replace: MatchReplaceSnapshot,
    #[serde(default)]
    pub replay_collections: Vec<CollectionInfo>,
    #[serde(default)]
    pub sessions: Vec<SessionRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchReplaceSnapshot {
    #[serde(default)]
    pub collections: Vec<CollectionInfo>,
    #[serde(default)]
    pub rules: Vec<RuleRecord>,
}

/// Match/replace rule as captured
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_enabled: bool,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub section: Value,
    /// Snapshot-local collection id
    #[serde(default)]
    pub collection_id: Option<String>,
    /// Absent in snapshots taken before rules carried sources
    #[serde(default)]
    pub sources: Option<Vec<String>>,
}

impl From<&MatchReplaceRuleInfo> for RuleRecord {
    fn from(rule: &MatchReplaceRuleInfo) -> Self {
        Self {
            id: rule.id.clone(),
            name: rule.name.clone(),
            is_enabled: rule.is_enabled,
            query: rule.query.clone(),
            section: rule.section.clone(),
            collection_id: rule.collection_id.clone(),
            sources: Some(rule.sources.clone()),
        }
    }
}

/// Replay session as captured: the request to replay plus its placement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    #[serde(with = "base64_bytes")]
    pub raw_bytes: Vec<u8>,
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Snapshot-local collection id
    #[serde(default)]
    pub collection_id: Option<String>,
}

impl SessionRecord {
    /// Display name, if one is set and non-empty
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }

    /// Label used in messages: the name, falling back to the URL
    pub fn label(&self) -> &str {
        self.display_name().unwrap_or(&self.url)
    }
}

impl TransferSnapshot {
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
            && self.filters.is_empty()
            && self.match_replace.collections.is_empty()
            && self.match_replace.rules.is_empty()
            && self.replay_collections.is_empty()
            && self.sessions.is_empty()
    }

    /// Short human description of the contents
    pub fn describe(&self) -> String {
        format!(
            "{} scopes, {} filters, {} match/replace rules, {} replay sessions",
            self.scopes.len(),
            self.filters.len(),
            self.match_replace.rules.len(),
            self.sessions.len()
        )
    }

    /// SHA-256 over the canonical JSON encoding, hex encoded
    pub fn fingerprint(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        format!("{:x}", Sha256::digest(&bytes))
    }

    /// Rules and sessions whose collection id is not part of the snapshot.
    ///
    /// Such items are skipped at apply time; this lets callers report them
    /// as soon as a snapshot is captured or loaded.
    pub fn dangling_references(&self) -> Vec<TransferWarning> {
        let mut warnings = Vec::new();

        let rule_collections: HashSet<&str> = self
            .match_replace
            .collections
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        for rule in &self.match_replace.rules {
            if let Some(id) = rule.collection_id.as_deref().filter(|id| !id.is_empty()) {
                if !rule_collections.contains(id) {
                    warnings.push(TransferWarning::DanglingCollection {
                        kind: EntityKind::MatchReplaceRule,
                        item: rule.name.clone(),
                        collection_id: id.to_string(),
                    });
                }
            }
        }

        let replay_collections: HashSet<&str> = self
            .replay_collections
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        for session in &self.sessions {
            if let Some(id) = session.collection_id.as_deref().filter(|id| !id.is_empty()) {
                if !replay_collections.contains(id) {
                    warnings.push(TransferWarning::DanglingCollection {
                        kind: EntityKind::ReplaySession,
                        item: session.label().to_string(),
                        collection_id: id.to_string(),
                    });
                }
            }
        }

        warnings
    }
}

/// Versioned wrapper stored in the transfer slot and in snapshot files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEnvelope {
    /// Schema version; 0 marks files written before versioning
    #[serde(default)]
    pub version: u32,
    #[serde(default = "Utc::now")]
    pub captured_at: DateTime<Utc>,
    #[serde(default)]
    pub source_project: Option<Project>,
    pub snapshot: TransferSnapshot,
}

impl SnapshotEnvelope {
    pub fn new(source_project: Option<Project>, snapshot: TransferSnapshot) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            captured_at: Utc::now(),
            source_project,
            snapshot,
        }
    }

    pub fn fingerprint(&self) -> String {
        self.snapshot.fingerprint()
    }

    /// Name of the project the snapshot was taken from
    pub fn source_name(&self) -> &str {
        self.source_project
            .as_ref()
            .map(|p| p.name.as_str())
            .unwrap_or("<unknown>")
    }

    pub fn to_json(&self) -> Result<String, TransferError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decode an envelope, rejecting versions newer than this build understands
    pub fn from_json(json: &str) -> Result<Self, TransferError> {
        let value: Value = serde_json::from_str(json)?;
        if let Some(found) = value.get("version").and_then(Value::as_u64) {
            if found > u64::from(SNAPSHOT_VERSION) {
                return Err(TransferError::UnsupportedVersion {
                    found,
                    supported: SNAPSHOT_VERSION,
                });
            }
        }

        let envelope: SnapshotEnvelope = serde_json::from_value(value)?;
        for warning in envelope.snapshot.dangling_references() {
            tracing::warn!(%warning, "Loaded snapshot has a dangling reference");
        }
        Ok(envelope)
    }

    pub fn save(&self, path: &Path) -> Result<(), TransferError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, TransferError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }
}

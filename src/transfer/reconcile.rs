//! Collection reconciliation
//!
//! Maps the snapshot's collections onto the target project. A collection whose
//! name already exists in the target is reused; anything else is created.
//! Matching is exact, case-sensitive name equality and the first match wins.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::host::{CollectionInfo, HostError, ProjectHost};
use crate::transfer::report::{EntityKind, TransferWarning};

/// Creates collections in the target project
#[async_trait]
pub trait CollectionFactory: Send + Sync {
    /// Create a collection named `name`, returning its host id
    async fn create_collection(&self, name: &str) -> Result<String, HostError>;
}

/// Which family of collections is being reconciled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    MatchReplace,
    Replay,
}

impl CollectionKind {
    pub fn entity_kind(&self) -> EntityKind {
        match self {
            CollectionKind::MatchReplace => EntityKind::MatchReplaceCollection,
            CollectionKind::Replay => EntityKind::ReplayCollection,
        }
    }
}

/// [`CollectionFactory`] that creates collections through the host
pub struct HostCollections<'a> {
    host: &'a dyn ProjectHost,
    kind: CollectionKind,
}

impl<'a> HostCollections<'a> {
    pub fn new(host: &'a dyn ProjectHost, kind: CollectionKind) -> Self {
        Self { host, kind }
    }
}

#[async_trait]
impl CollectionFactory for HostCollections<'_> {
    async fn create_collection(&self, name: &str) -> Result<String, HostError> {
        match self.kind {
            CollectionKind::MatchReplace => self.host.create_match_replace_collection(name).await,
            CollectionKind::Replay => self.host.create_replay_collection(name).await,
        }
    }
}

/// Snapshot-local collection id → target host id, for one apply run and one
/// collection kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityMap {
    entries: HashMap<String, String>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, old_id: impl Into<String>, new_id: impl Into<String>) {
        self.entries.insert(old_id.into(), new_id.into());
    }

    pub fn get(&self, old_id: &str) -> Option<&str> {
        self.entries.get(old_id).map(String::as_str)
    }

    /// Translate an optional reference. Absent, empty and unknown ids all
    /// resolve to `None`.
    pub fn resolve(&self, old_id: Option<&str>) -> Option<&str> {
        old_id.filter(|id| !id.is_empty()).and_then(|id| self.get(id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of reconciling one list of collections
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    pub map: IdentityMap,
    pub created: usize,
    pub reused: usize,
    pub warnings: Vec<TransferWarning>,
}

pub struct CollectionReconciler {
    kind: CollectionKind,
}

impl CollectionReconciler {
    pub fn new(kind: CollectionKind) -> Self {
        Self { kind }
    }

    /// Map each source collection to an existing or newly created target
    /// collection, in source order.
    ///
    /// `target` is the target project's collection list as it was before this
    /// call. A failed creation leaves the source id unmapped and is reported
    /// as a warning.
    pub async fn reconcile<F>(
        &self,
        source: &[CollectionInfo],
        target: &[CollectionInfo],
        factory: &F,
    ) -> Reconciliation
    where
        F: CollectionFactory + ?Sized,
    {
        let mut outcome = Reconciliation::default();

        for collection in source {
            if let Some(existing) = target.iter().find(|t| t.name == collection.name) {
                debug!(
                    kind = ?self.kind,
                    name = %collection.name,
                    target_id = %existing.id,
                    "Reusing existing collection"
                );
                outcome.map.insert(collection.id.clone(), existing.id.clone());
                outcome.reused += 1;
                continue;
            }

            match factory.create_collection(&collection.name).await {
                Ok(new_id) => {
                    debug!(
                        kind = ?self.kind,
                        name = %collection.name,
                        target_id = %new_id,
                        "Created collection"
                    );
                    outcome.map.insert(collection.id.clone(), new_id);
                    outcome.created += 1;
                }
                Err(e) => {
                    warn!(
                        kind = ?self.kind,
                        name = %collection.name,
                        error = %e,
                        "Failed to create collection"
                    );
                    outcome.warnings.push(TransferWarning::CreateFailed {
                        kind: self.kind.entity_kind(),
                        name: collection.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        outcome
    }
}

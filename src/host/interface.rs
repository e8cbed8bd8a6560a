use async_trait::async_trait;

use crate::host::error::HostError;
use crate::host::types::{
    CollectionInfo, FilterDefinition, MatchReplaceRuleInfo, NewMatchReplaceRule, Project,
    ReplayEntry, ReplaySessionInfo, RequestData, ScopeDefinition,
};

/// Capabilities the host application exposes for the currently selected project.
///
/// Every call is scoped to whatever project the host has selected at the time
/// of the call. Implementations must not retry; callers decide what a failure
/// means for the surrounding operation.
#[async_trait]
pub trait ProjectHost: Send + Sync {
    /// The selected project, or `None` when nothing is selected
    async fn current_project(&self) -> Result<Option<Project>, HostError>;

    async fn list_scopes(&self) -> Result<Vec<ScopeDefinition>, HostError>;

    async fn list_filters(&self) -> Result<Vec<FilterDefinition>, HostError>;

    async fn list_match_replace_collections(&self) -> Result<Vec<CollectionInfo>, HostError>;

    async fn list_match_replace_rules(&self) -> Result<Vec<MatchReplaceRuleInfo>, HostError>;

    async fn list_replay_collections(&self) -> Result<Vec<CollectionInfo>, HostError>;

    async fn list_replay_sessions(&self) -> Result<Vec<ReplaySessionInfo>, HostError>;

    /// Look up a replay entry by id
    async fn replay_entry(&self, entry_id: &str) -> Result<Option<ReplayEntry>, HostError>;

    /// Fetch raw request bytes and destination URL
    async fn request(&self, request_id: &str) -> Result<Option<RequestData>, HostError>;

    async fn create_scope(&self, scope: &ScopeDefinition) -> Result<String, HostError>;

    async fn create_filter(&self, filter: &FilterDefinition) -> Result<String, HostError>;

    /// Create a match/replace collection, returning its host id
    async fn create_match_replace_collection(&self, name: &str) -> Result<String, HostError>;

    async fn create_match_replace_rule(
        &self,
        rule: &NewMatchReplaceRule,
    ) -> Result<String, HostError>;

    /// Create a replay collection, returning its host id
    async fn create_replay_collection(&self, name: &str) -> Result<String, HostError>;

    /// Create a replay session seeded with a raw request
    async fn create_replay_session(
        &self,
        raw: &[u8],
        url: &str,
        collection_id: Option<&str>,
    ) -> Result<String, HostError>;

    async fn rename_replay_session(&self, session_id: &str, name: &str) -> Result<(), HostError>;
}

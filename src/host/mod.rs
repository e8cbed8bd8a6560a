//! Host application boundary
//!
//! The transfer core only talks to the host through [`ProjectHost`]. The
//! in-process [`MemoryHost`] backs the CLI (via a JSON workspace file) and the
//! test suite.

pub mod error;
pub mod interface;
pub mod memory;
pub mod types;
pub mod workspace;

pub use error::HostError;
pub use interface::ProjectHost;
pub use memory::{HostCall, HostOp, MemoryHost};
pub use types::{
    CollectionInfo, FilterDefinition, MatchReplaceRuleInfo, NewMatchReplaceRule, Project,
    ProjectChanged, ReplayEntry, ReplaySessionInfo, RequestData, ScopeDefinition,
};
pub use workspace::{ProjectData, StoredRequest, Workspace};

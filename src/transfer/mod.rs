//! Cross-project transfer: capture a project, hold the snapshot, and apply it
//! to whichever project is selected next.

mod apply;
mod assembler;
mod controller;
mod error;
mod reconcile;
mod report;
mod snapshot;
mod store;

pub use apply::{ApplyCoordinator, ApplyOptions};
pub use assembler::{CaptureOptions, CaptureOutcome, SnapshotAssembler};
pub use controller::{ApplyOutcome, ControllerOptions, TransferController};
pub use error::TransferError;
pub use reconcile::{
    CollectionFactory, CollectionKind, CollectionReconciler, HostCollections, IdentityMap,
    Reconciliation,
};
pub use report::{ApplyCounts, ApplyReport, EntityKind, TransferWarning};
pub use snapshot::{
    MatchReplaceSnapshot, RuleRecord, SessionRecord, SnapshotEnvelope, TransferSnapshot,
    SNAPSHOT_VERSION,
};
pub use store::{TransferState, TransferStore};

use crate::host::{Project, ProjectHost};

/// The selected project, or why there is none
pub(crate) async fn resolve_project(host: &dyn ProjectHost) -> Result<Project, TransferError> {
    host.current_project()
        .await
        .map_err(TransferError::ProjectLookup)?
        .ok_or(TransferError::NoProject)
}

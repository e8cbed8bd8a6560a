use thiserror::Error;

use crate::host::HostError;

/// Failures that end a capture or apply phase.
///
/// Per-item problems are never errors; they are collected as
/// [`TransferWarning`](crate::transfer::TransferWarning)s instead.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("No project is currently selected")]
    NoProject,
    #[error("Failed to resolve the current project: {0}")]
    ProjectLookup(#[source] HostError),
    #[error("No transfer is armed")]
    NothingArmed,
    #[error("No snapshot has been captured")]
    SnapshotMissing,
    #[error("Failed to read {what}: {source}")]
    Read {
        what: &'static str,
        #[source]
        source: HostError,
    },
    #[error("Snapshot version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u64, supported: u32 },
    #[error("Failed to decode snapshot: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransferError {
    pub(crate) fn read(what: &'static str) -> impl FnOnce(HostError) -> TransferError {
        move |source| TransferError::Read { what, source }
    }
}

pub mod config;
pub mod feedback;
pub mod host;
pub mod transfer;
pub mod util;

pub use config::Config;
pub use feedback::{ConsoleNotifier, Notifier, RecordingNotifier, TracingNotifier, Variant};
pub use host::{HostError, MemoryHost, Project, ProjectChanged, ProjectHost, Workspace};
pub use transfer::{
    ApplyCoordinator, ApplyOutcome, ApplyReport, CollectionReconciler, IdentityMap,
    SnapshotAssembler, SnapshotEnvelope, TransferController, TransferError, TransferSnapshot,
    TransferStore, TransferWarning,
};

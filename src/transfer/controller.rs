//! Ties capture, the store and apply to project-changed notifications

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::feedback::{Notifier, Variant};
use crate::host::{ProjectChanged, ProjectHost};
use crate::transfer::apply::{ApplyCoordinator, ApplyOptions};
use crate::transfer::assembler::{CaptureOptions, SnapshotAssembler};
use crate::transfer::error::TransferError;
use crate::transfer::report::ApplyReport;
use crate::transfer::snapshot::SnapshotEnvelope;
use crate::transfer::store::TransferStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerOptions {
    pub capture: CaptureOptions,
    pub apply: ApplyOptions,
    /// Drop the snapshot once it has been applied
    pub clear_after_apply: bool,
    /// Warn when the snapshot being applied was already applied once
    pub warn_on_reapply: bool,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            capture: CaptureOptions::default(),
            apply: ApplyOptions::default(),
            clear_after_apply: false,
            warn_on_reapply: true,
        }
    }
}

/// What handling one project-changed notification led to
#[derive(Debug)]
pub enum ApplyOutcome {
    /// Nothing was armed, so the notification was ignored
    NotArmed,
    Applied(ApplyReport),
    Aborted(TransferError),
}

impl ApplyOutcome {
    pub fn report(&self) -> Option<&ApplyReport> {
        match self {
            ApplyOutcome::Applied(report) => Some(report),
            _ => None,
        }
    }
}

pub struct TransferController {
    host: Arc<dyn ProjectHost>,
    notifier: Arc<dyn Notifier>,
    store: Arc<TransferStore>,
    options: ControllerOptions,
}

impl TransferController {
    pub fn new(
        host: Arc<dyn ProjectHost>,
        notifier: Arc<dyn Notifier>,
        store: Arc<TransferStore>,
        options: ControllerOptions,
    ) -> Self {
        Self {
            host,
            notifier,
            store,
            options,
        }
    }

    pub fn store(&self) -> &Arc<TransferStore> {
        &self.store
    }

    /// Capture the selected project and arm the transfer.
    ///
    /// The snapshot is applied when the next project-changed notification
    /// arrives. Nothing is stored if the capture fails.
    pub async fn duplicate(&self) -> Result<SnapshotEnvelope, TransferError> {
        let outcome = match SnapshotAssembler::new(self.host.as_ref())
            .with_options(self.options.capture)
            .capture()
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "Capture failed");
                self.notifier
                    .notify(&format!("Could not capture project: {}", e), Variant::Error);
                return Err(e);
            }
        };

        for warning in &outcome.warnings {
            self.notifier.notify(&warning.to_string(), warning.variant());
        }

        let envelope = outcome.envelope;
        self.stage(envelope.clone());
        self.notifier.notify(
            &format!(
                "Captured '{}' ({}). Switch to the target project to apply it.",
                envelope.source_name(),
                envelope.snapshot.describe()
            ),
            Variant::Success,
        );
        Ok(envelope)
    }

    /// Store a snapshot and arm it for the next project change
    pub fn stage(&self, envelope: SnapshotEnvelope) {
        info!(
            source = %envelope.source_name(),
            fingerprint = %envelope.fingerprint(),
            "Snapshot staged"
        );
        self.store.save(envelope);
        self.store.arm();
    }

    /// Handle one project-changed notification.
    ///
    /// Only the first notification after an arm does any work; the store is
    /// disarmed before the first host call.
    pub async fn on_project_changed(&self, event: &ProjectChanged) -> ApplyOutcome {
        let envelope = match self.store.begin_apply() {
            Ok(envelope) => envelope,
            Err(TransferError::NothingArmed) => {
                debug!(project = ?event.project_name, "Project changed, nothing armed");
                return ApplyOutcome::NotArmed;
            }
            Err(e) => {
                error!(error = %e, "Cannot start apply");
                self.notifier.notify(&e.to_string(), Variant::Error);
                return ApplyOutcome::Aborted(e);
            }
        };

        let fingerprint = envelope.fingerprint();
        if self.options.warn_on_reapply
            && self.store.last_applied_fingerprint().as_deref() == Some(fingerprint.as_str())
        {
            warn!(%fingerprint, "Snapshot was already applied once");
            self.notifier.notify(
                "This snapshot was already applied; entities may be duplicated",
                Variant::Warning,
            );
        }

        let result = ApplyCoordinator::new(self.host.as_ref(), self.notifier.as_ref())
            .with_options(self.options.apply)
            .apply(&envelope)
            .await;

        match result {
            Ok(report) => {
                self.store.mark_applied(report.fingerprint.clone());
                if self.options.clear_after_apply {
                    self.store.clear();
                }
                let variant = if report.failures() > 0 {
                    Variant::Warning
                } else {
                    Variant::Success
                };
                self.notifier.notify(&report.summary(), variant);
                ApplyOutcome::Applied(report)
            }
            Err(e) => {
                error!(error = %e, "Apply aborted");
                self.notifier
                    .notify(&format!("Could not apply snapshot: {}", e), Variant::Error);
                ApplyOutcome::Aborted(e)
            }
        }
    }

    /// Handle notifications from `events` until the channel closes.
    ///
    /// Each notification gets its own task, so notifications that arrive
    /// while an apply is running are handled concurrently with it.
    pub fn listen(
        self: Arc<Self>,
        mut events: mpsc::UnboundedReceiver<ProjectChanged>,
        outcomes: Option<mpsc::UnboundedSender<ApplyOutcome>>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let controller = Arc::clone(&self);
                let outcomes = outcomes.clone();
                tokio::spawn(async move {
                    let outcome = controller.on_project_changed(&event).await;
                    if let Some(tx) = outcomes {
                        let _ = tx.send(outcome);
                    }
                });
            }
            debug!("Project-changed channel closed");
        })
    }
}

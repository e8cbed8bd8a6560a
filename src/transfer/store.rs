//! Single-slot holder for the pending transfer
//!
//! The store moves between two states. `arm` takes it to
//! [`TransferState::Armed`]; [`TransferStore::begin_apply`] takes it back to
//! [`TransferState::Idle`] with one atomic swap, so at most one apply run
//! starts per arm no matter how many notifications race for it.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::transfer::error::TransferError;
use crate::transfer::snapshot::SnapshotEnvelope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    Armed,
}

/// Holds at most one snapshot plus the armed flag
#[derive(Debug, Default)]
pub struct TransferStore {
    slot: Mutex<Option<SnapshotEnvelope>>,
    armed: AtomicBool,
    last_applied: Mutex<Option<String>>,
}

impl TransferStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a snapshot, replacing whatever was there
    pub fn save(&self, envelope: SnapshotEnvelope) {
        let mut slot = self.slot.lock();
        if let Some(previous) = slot.as_ref() {
            tracing::debug!(
                previous = %previous.fingerprint(),
                "Replacing stored snapshot"
            );
        }
        *slot = Some(envelope);
    }

    /// Copy of the stored snapshot
    pub fn load(&self) -> Option<SnapshotEnvelope> {
        self.slot.lock().clone()
    }

    /// Let the next project-changed notification apply the stored snapshot
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Clear the armed flag, returning whether it was set
    pub fn disarm(&self) -> bool {
        self.armed.swap(false, Ordering::SeqCst)
    }

    pub fn state(&self) -> TransferState {
        if self.armed.load(Ordering::SeqCst) {
            TransferState::Armed
        } else {
            TransferState::Idle
        }
    }

    /// Claim the armed transfer.
    ///
    /// Disarms before touching the slot. Only the first caller after an
    /// `arm` gets the snapshot; later callers get `NothingArmed`.
    pub fn begin_apply(&self) -> Result<SnapshotEnvelope, TransferError> {
        if !self.disarm() {
            return Err(TransferError::NothingArmed);
        }
        self.load().ok_or(TransferError::SnapshotMissing)
    }

    /// Drop the stored snapshot and disarm
    pub fn clear(&self) {
        self.disarm();
        *self.slot.lock() = None;
    }

    /// Remember which snapshot was applied last
    pub fn mark_applied(&self, fingerprint: String) {
        *self.last_applied.lock() = Some(fingerprint);
    }

    pub fn last_applied_fingerprint(&self) -> Option<String> {
        self.last_applied.lock().clone()
    }
}

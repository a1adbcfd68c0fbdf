//! Slot store — the two model references, swapped atomically

use crate::error::{Result, ServeError};
use crate::model::{ModelHandle, ModelVersion};
use crate::rollout::Slot;
use arc_swap::ArcSwapOption;
use std::sync::Arc;

/// Holds the `current` and `candidate` model handles.
///
/// Reads and writes are lock-free reference swaps: a `get` racing a `set`
/// sees either the old or the new handle, never a partial one. Handles that
/// were already resolved stay alive until their last request finishes.
pub struct SlotStore {
    current: ArcSwapOption<ModelHandle>,
    candidate: ArcSwapOption<ModelHandle>,
}

impl SlotStore {
    /// Create a store with both slots uninitialized
    pub fn new() -> Self {
        Self {
            current: ArcSwapOption::empty(),
            candidate: ArcSwapOption::empty(),
        }
    }

    fn cell(&self, slot: Slot) -> &ArcSwapOption<ModelHandle> {
        match slot {
            Slot::Current => &self.current,
            Slot::Candidate => &self.candidate,
        }
    }

    /// Resolve a slot to its handle
    pub fn get(&self, slot: Slot) -> Result<Arc<ModelHandle>> {
        self.cell(slot).load_full().ok_or(ServeError::NotReady(slot))
    }

    /// Replace a slot's handle, returning the previous one
    pub fn set(&self, slot: Slot, handle: Arc<ModelHandle>) -> Option<Arc<ModelHandle>> {
        let version = handle.version().clone();
        let previous = self.cell(slot).swap(Some(handle));
        tracing::debug!(
            slot = %slot,
            version = %version,
            previous = %previous.as_ref().map(|h| h.version().to_string()).unwrap_or_default(),
            "Slot updated"
        );
        previous
    }

    /// Whether a slot has ever been set
    pub fn is_ready(&self, slot: Slot) -> bool {
        self.cell(slot).load().is_some()
    }

    /// Version currently held by a slot
    pub fn version(&self, slot: Slot) -> Option<ModelVersion> {
        self.cell(slot).load().as_ref().map(|h| h.version().clone())
    }
}

impl Default for SlotStore {
    fn default() -> Self {
        Self::new()
    }
}

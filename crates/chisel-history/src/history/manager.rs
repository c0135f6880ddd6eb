use super::state::{HistoryShared, HistoryState};
use super::{HistoryError, HistoryLayer, ResourceKey};
use crate::DiskCache;

use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

/// The undo/redo timeline shared by every [`HistoryLayer`] created from it.
///
/// Cloning is cheap and yields another handle to the same timeline.
#[derive(Clone)]
pub struct HistoryManager {
    shared: Arc<HistoryShared>,
}

impl HistoryManager {
    /// Creates an empty history whose payloads are stored in `cache`.
    pub fn new(cache: Arc<DiskCache>) -> Self {
        Self {
            shared: Arc::new(HistoryShared {
                state: Mutex::new(HistoryState::default()),
                cache,
            }),
        }
    }

    pub fn cache(&self) -> &Arc<DiskCache> {
        &self.shared.cache
    }

    /// Creates an empty layer with a fresh UUID.
    ///
    /// The layer's resources live exactly as long as the returned handle. Undo bins that still refer to them after that are
    /// skipped.
    pub fn new_layer<K: ResourceKey>(&self) -> HistoryLayer<K> {
        let uuid = Uuid::new_v4();
        let id = self.shared.state.lock().register_layer::<K>(uuid);
        HistoryLayer::new(self.shared.clone(), id, uuid)
    }

    /// Closes the current undo bin. Every change made until the next call is undone and redone as one unit.
    ///
    /// Any bins that could be redone are destroyed.
    pub fn create_undo_bin(&self) -> Result<(), HistoryError> {
        let mut state = self.shared.state.lock();
        state.create_undo_bin(&self.shared.cache)?;
        log::debug!("Created undo bin {}", state.history_index());
        Ok(())
    }

    /// Records the active version of every resource in every layer as the saved one.
    pub fn mark_saved(&self) {
        self.shared.state.lock().mark_saved();
    }

    pub fn undo(&self) -> Result<(), HistoryError> {
        let mut state = self.shared.state.lock();
        if !state.undo() {
            return Err(HistoryError::NothingToUndo);
        }
        log::debug!("Undo to bin {}", state.history_index());
        Ok(())
    }

    pub fn redo(&self) -> Result<(), HistoryError> {
        let mut state = self.shared.state.lock();
        if !state.redo() {
            return Err(HistoryError::NothingToRedo);
        }
        log::debug!("Redo to bin {}", state.history_index());
        Ok(())
    }

    pub fn undo_count(&self) -> usize {
        self.shared.state.lock().undo_count()
    }

    pub fn redo_count(&self) -> usize {
        self.shared.state.lock().redo_count()
    }

    /// Forgets all resources in all layers and all undo bins. Layers stay registered, so the next access to a resource must
    /// initialize it again.
    pub fn reset(&self) -> Result<(), HistoryError> {
        // Keep the lock until the old versions are gone; a resource initialized again reuses their keys.
        let mut state = self.shared.state.lock();
        let keys = state.reset();
        log::debug!("Reset history, deleting {} cached versions", keys.len());
        for key in keys {
            self.shared.cache.delete(&key)?;
        }
        Ok(())
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

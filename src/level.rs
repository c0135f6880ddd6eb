use chisel_core::Signal;
use chisel_history::{DiskCache, HistoryError, HistoryManager};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The state shared by every dimension of an open level: its history and its "changed" signal.
///
/// Cloning is cheap and yields another handle to the same level.
#[derive(Clone)]
pub struct Level {
    inner: Arc<LevelInner>,
}

struct LevelInner {
    history: HistoryManager,
    history_enabled: AtomicBool,
    changed: Signal<()>,
}

impl Level {
    pub fn new(cache: Arc<DiskCache>) -> Self {
        Self {
            inner: Arc::new(LevelInner {
                history: HistoryManager::new(cache),
                history_enabled: AtomicBool::new(true),
                changed: Signal::new(),
            }),
        }
    }

    pub fn history(&self) -> &HistoryManager {
        &self.inner.history
    }

    /// When history is disabled, chunks that are overwritten before ever being read are not loaded first, so their previous
    /// state can't be restored with undo.
    pub fn history_enabled(&self) -> bool {
        self.inner.history_enabled.load(Ordering::Acquire)
    }

    pub fn set_history_enabled(&self, enabled: bool) {
        self.inner.history_enabled.store(enabled, Ordering::Release);
    }

    /// Emitted after any chunk in the level is set, edited or deleted.
    pub fn changed(&self) -> &Signal<()> {
        &self.inner.changed
    }

    pub fn create_undo_bin(&self) -> Result<(), HistoryError> {
        self.inner.history.create_undo_bin()
    }

    pub fn undo(&self) -> Result<(), HistoryError> {
        self.inner.history.undo()
    }

    pub fn redo(&self) -> Result<(), HistoryError> {
        self.inner.history.redo()
    }

    pub fn mark_saved(&self) {
        self.inner.history.mark_saved()
    }
}

use crate::{ChunkCoord, ChunkHandle, ComponentKey, Level, RawDimension};

use chisel_core::{SmallKeyHashMap, SmallKeyHashSet};
use chisel_history::HistoryLayer;

use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// The chunks of one dimension of a [`Level`].
///
/// Hands out one [`ChunkHandle`] per coordinate. Handles are only kept alive by their users, but while any handle for a
/// coordinate is alive, every request for that coordinate returns the same handle (and therefore the same lock).
pub struct Dimension<D: RawDimension> {
    level: Level,
    raw: Arc<D>,
    chunk_history: Arc<HistoryLayer<ChunkCoord>>,
    chunk_data_history: Arc<HistoryLayer<ComponentKey>>,
    handles: Mutex<HandleRegistry<D>>,
}

struct HandleRegistry<D: RawDimension> {
    handles: SmallKeyHashMap<ChunkCoord, Weak<ChunkHandle<D>>>,
    prune_at: usize,
}

const MIN_PRUNE_LEN: usize = 64;

impl<D: RawDimension> Dimension<D> {
    pub fn new(level: &Level, raw: D) -> Self {
        Self {
            level: level.clone(),
            raw: Arc::new(raw),
            chunk_history: Arc::new(level.history().new_layer()),
            chunk_data_history: Arc::new(level.history().new_layer()),
            handles: Mutex::new(HandleRegistry {
                handles: SmallKeyHashMap::default(),
                prune_at: MIN_PRUNE_LEN,
            }),
        }
    }

    pub fn level(&self) -> &Level {
        &self.level
    }

    pub fn raw(&self) -> &Arc<D> {
        &self.raw
    }

    pub fn chunk_handle(&self, coord: ChunkCoord) -> Arc<ChunkHandle<D>> {
        let mut registry = self.handles.lock();
        if let Some(handle) = registry.handles.get(&coord).and_then(Weak::upgrade) {
            return handle;
        }

        // Drop the entries of handles nobody uses anymore, amortized over insertions.
        if registry.handles.len() >= registry.prune_at {
            registry.handles.retain(|_, h| h.strong_count() > 0);
            registry.prune_at = (2 * registry.handles.len()).max(MIN_PRUNE_LEN);
        }

        let handle = Arc::new(ChunkHandle::new(
            coord,
            self.level.clone(),
            self.raw.clone(),
            self.chunk_history.clone(),
            self.chunk_data_history.clone(),
        ));
        registry.handles.insert(coord, Arc::downgrade(&handle));
        handle
    }

    /// Every chunk that exists, whether it is only in the level data or was created since it was loaded.
    pub fn chunk_coords(&self) -> SmallKeyHashSet<ChunkCoord> {
        let mut coords: SmallKeyHashSet<_> = self.raw.all_chunk_coords().into_iter().collect();
        for (coord, exists) in self.chunk_history.resources_exist_map() {
            if exists {
                coords.insert(coord);
            } else {
                coords.remove(&coord);
            }
        }
        coords
    }

    /// Every chunk that changed since the last [`Level::mark_saved`].
    pub fn changed_chunk_coords(&self) -> SmallKeyHashSet<ChunkCoord> {
        self.chunk_history.changed_resources().into_iter().collect()
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{test_level, MemoryDimension, TestChunk, FULL_CLASS};

    fn coords(list: &[(i64, i64)]) -> SmallKeyHashSet<ChunkCoord> {
        list.iter().map(|&(cx, cz)| ChunkCoord::new(cx, cz)).collect()
    }

    #[test]
    fn one_handle_per_coordinate() {
        let (_dir, level) = test_level();
        let dimension = Dimension::new(&level, MemoryDimension::default());

        let a = dimension.chunk_handle(ChunkCoord::new(1, 2));
        let b = dimension.chunk_handle(ChunkCoord::new(1, 2));
        let c = dimension.chunk_handle(ChunkCoord::new(2, 1));
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn unused_handles_are_released() {
        let (_dir, level) = test_level();
        let dimension = Dimension::new(&level, MemoryDimension::default());

        let weak = Arc::downgrade(&dimension.chunk_handle(ChunkCoord::new(0, 0)));
        assert!(weak.upgrade().is_none());
        for i in 0..(2 * MIN_PRUNE_LEN as i64) {
            dimension.chunk_handle(ChunkCoord::new(i, 0));
        }
        assert!(dimension.handles.lock().handles.len() <= MIN_PRUNE_LEN + 1);
    }

    #[test]
    fn coords_merge_level_data_and_history() {
        let (_dir, level) = test_level();
        let raw = MemoryDimension::default();
        let full = TestChunk::new(FULL_CLASS)
            .with("blocks", b"b")
            .with("entities", b"e");
        raw.insert(ChunkCoord::new(0, 0), full.clone());
        raw.insert(ChunkCoord::new(1, 0), full.clone());
        let dimension = Dimension::new(&level, raw);
        assert_eq!(dimension.chunk_coords(), coords(&[(0, 0), (1, 0)]));

        dimension.chunk_handle(ChunkCoord::new(1, 0)).delete().unwrap();
        dimension.chunk_handle(ChunkCoord::new(7, 7)).set(&full).unwrap();
        assert_eq!(dimension.chunk_coords(), coords(&[(0, 0), (7, 7)]));
        assert_eq!(dimension.changed_chunk_coords(), coords(&[(1, 0), (7, 7)]));

        level.mark_saved();
        assert!(dimension.changed_chunk_coords().is_empty());
    }
}

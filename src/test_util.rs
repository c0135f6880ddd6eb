//! An in-memory raw dimension with a two-class chunk type.

use crate::{
    Chunk, ChunkCoord, ChunkError, ChunkLoadError, ComponentMap, Level, RawChunkError,
    RawDimension,
};

use chisel_core::SmallKeyHashMap;
use chisel_history::DiskCache;

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const FULL_CLASS: &str = "test:full";
pub const FLAT_CLASS: &str = "test:flat";

pub fn test_level() -> (tempfile::TempDir, Level) {
    let dir = tempfile::tempdir().unwrap();
    let cache = DiskCache::open(dir.path().join("db"), 1 << 20).unwrap();
    (dir, Level::new(Arc::new(cache)))
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TestChunk {
    class_id: String,
    components: ComponentMap,
}

impl TestChunk {
    pub fn new(class_id: &str) -> Self {
        Self {
            class_id: class_id.to_owned(),
            components: ComponentMap::new(),
        }
    }

    pub fn with(mut self, component: &str, data: &[u8]) -> Self {
        self.set_component(component, data);
        self
    }

    pub fn without(mut self, component: &str) -> Self {
        self.components.insert(component.to_owned(), None);
        self
    }

    pub fn set_component(&mut self, component: &str, data: &[u8]) {
        self.components
            .insert(component.to_owned(), Some(data.to_vec()));
    }

    pub fn component(&self, component: &str) -> Option<&[u8]> {
        self.components.get(component)?.as_deref()
    }

    pub fn has_component(&self, component: &str) -> bool {
        self.components.contains_key(component)
    }
}

fn class_components(class_id: &str) -> Option<Vec<String>> {
    match class_id {
        FULL_CLASS => Some(vec!["blocks".into(), "entities".into()]),
        FLAT_CLASS => Some(vec!["blocks".into()]),
        _ => None,
    }
}

impl Chunk for TestChunk {
    fn class_id(&self) -> &str {
        &self.class_id
    }

    fn component_ids(&self) -> Vec<String> {
        class_components(&self.class_id).unwrap_or_default()
    }

    fn serialize_components(&self) -> Result<ComponentMap, ChunkError> {
        Ok(self.components.clone())
    }

    fn reconstruct_components(&mut self, components: ComponentMap) -> Result<(), ChunkError> {
        self.components = components;
        Ok(())
    }
}

enum StoredChunk {
    Chunk(TestChunk),
    Broken(String),
}

#[derive(Default)]
pub struct MemoryDimension {
    chunks: Mutex<SmallKeyHashMap<ChunkCoord, StoredChunk>>,
    /// Number of calls to `get_raw_chunk`.
    pub loads: AtomicUsize,
}

impl MemoryDimension {
    pub fn insert(&self, coord: ChunkCoord, chunk: TestChunk) {
        self.chunks.lock().insert(coord, StoredChunk::Chunk(chunk));
    }

    pub fn insert_broken(&self, coord: ChunkCoord, message: &str) {
        self.chunks
            .lock()
            .insert(coord, StoredChunk::Broken(message.to_owned()));
    }
}

impl RawDimension for MemoryDimension {
    type RawChunk = TestChunk;
    type Chunk = TestChunk;

    fn has_chunk(&self, coord: ChunkCoord) -> bool {
        self.chunks.lock().contains_key(&coord)
    }

    fn all_chunk_coords(&self) -> Vec<ChunkCoord> {
        self.chunks.lock().keys().copied().collect()
    }

    fn get_raw_chunk(&self, coord: ChunkCoord) -> Result<TestChunk, RawChunkError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        match self.chunks.lock().get(&coord) {
            Some(StoredChunk::Chunk(chunk)) => Ok(chunk.clone()),
            Some(StoredChunk::Broken(message)) => Err(ChunkLoadError::new(message.clone()).into()),
            None => Err(RawChunkError::DoesNotExist),
        }
    }

    fn raw_chunk_to_native_chunk(
        &self,
        raw: TestChunk,
        _coord: ChunkCoord,
    ) -> Result<TestChunk, RawChunkError> {
        Ok(raw)
    }

    fn null_chunk(&self, class_id: &str) -> Result<TestChunk, ChunkError> {
        match class_components(class_id) {
            Some(_) => Ok(TestChunk::new(class_id)),
            None => Err(ChunkError::UnknownClass {
                class_id: class_id.to_owned(),
            }),
        }
    }
}

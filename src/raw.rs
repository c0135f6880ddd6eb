use crate::{Chunk, ChunkCoord, ChunkError, ChunkLoadError};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RawChunkError {
    #[error("chunk does not exist")]
    DoesNotExist,
    #[error(transparent)]
    Load(#[from] ChunkLoadError),
}

/// The read-only level data that chunks are loaded from the first time they are accessed.
pub trait RawDimension: Send + Sync + 'static {
    /// The chunk as stored in the level data.
    type RawChunk;
    type Chunk: Chunk;

    /// Must not load the chunk.
    fn has_chunk(&self, coord: ChunkCoord) -> bool;

    fn all_chunk_coords(&self) -> Vec<ChunkCoord>;

    fn get_raw_chunk(&self, coord: ChunkCoord) -> Result<Self::RawChunk, RawChunkError>;

    fn raw_chunk_to_native_chunk(
        &self,
        raw: Self::RawChunk,
        coord: ChunkCoord,
    ) -> Result<Self::Chunk, RawChunkError>;

    /// A chunk of class `class_id` with no components loaded.
    fn null_chunk(&self, class_id: &str) -> Result<Self::Chunk, ChunkError>;
}

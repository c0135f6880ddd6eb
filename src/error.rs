use crate::ChunkCoord;

use chisel_history::HistoryError;
use rkyv::{Archive, Deserialize, Serialize};
use thiserror::Error;

/// A chunk could not be loaded from the raw level data for a reason other than not existing.
///
/// The first time a chunk fails to load, the error is stored in the chunk's history and returned by every read until the
/// chunk is overwritten.
#[derive(Archive, Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
#[archive(check_bytes)]
#[error("failed to load chunk: {message}")]
pub struct ChunkLoadError {
    pub message: String,
}

impl ChunkLoadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("the chunk lock was not acquired")]
    LockNotAcquired,
    #[error("chunk {coord} does not exist")]
    DoesNotExist { coord: ChunkCoord },
    #[error(transparent)]
    Load(#[from] ChunkLoadError),
    #[error("component {component} of chunk {coord} was not serialized")]
    MissingComponent { coord: ChunkCoord, component: String },
    #[error("changing the class of chunk {coord} requires all of its components")]
    IncompleteClassChange { coord: ChunkCoord },
    #[error("unknown chunk class {class_id}")]
    UnknownClass { class_id: String },
    #[error("the stored record of chunk {coord} is corrupt")]
    CorruptRecord { coord: ChunkCoord },
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error("{0}")]
    Chunk(String),
}

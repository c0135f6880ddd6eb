//! Lockable, undoable, lazily loaded access to the chunks of a level.
//!
//! A [`Level`] owns the undo/redo timeline of an editing session. Each [`Dimension`] of the level loads chunks on demand from
//! a [`RawDimension`] (the read-only level data) and records every change in the level's history, so that any number of
//! chunk edits can be undone together.
//!
//! Chunk data lives in a [`DiskCache`](chisel_history::DiskCache), so an editing session does not need to hold every
//! touched chunk in memory.

mod chunk;
mod chunk_handle;
mod dimension;
mod error;
mod level;
mod raw;

#[cfg(test)]
mod test_util;

pub use chunk::{Chunk, ChunkCoord, ComponentKey, ComponentMap};
pub use chunk_handle::{ChunkHandle, ChunkLock};
pub use dimension::Dimension;
pub use error::{ChunkError, ChunkLoadError};
pub use level::Level;
pub use raw::{RawChunkError, RawDimension};

// Re-exports.
pub use chisel_core;
pub use chisel_history;

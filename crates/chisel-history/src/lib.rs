//! Versioned storage for the resources of an editing session.
//!
//! # Resources
//!
//! A resource is an opaque blob of bytes identified by a [`ResourceKey`]. Keys are grouped into [`HistoryLayer`]s, one per
//! logical namespace (e.g. "which chunks exist" and "serialized chunk components"). Every layer created from the same
//! [`HistoryManager`] shares one linear undo/redo timeline.
//!
//! ## Versions
//!
//! Each resource keeps an append-only list of versions. Undo and redo only move the resource's active version index; payloads
//! are never rewritten except when the active version is amended inside the bin that created it.
//!
//! ## Undo Bins
//!
//! [`HistoryManager::create_undo_bin`] closes the current bin. Every resource that changes before the next call belongs to
//! the new bin, and all of them are undone or redone together.
//!
//! # Cache
//!
//! Payload bytes live in a [`DiskCache`]: a bounded RAM tier that spills its least recently used entries into a `sled` store
//! inside a locked scratch directory. The cache is scratch space only; it is deleted when the last handle to it is dropped.

mod cache;
mod config;
mod history;

pub use cache::*;
pub use config::*;
pub use history::*;

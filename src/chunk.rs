use crate::{ChunkError, ChunkLoadError};

use chisel_history::ResourceKey;
use rkyv::{AlignedVec, Archive, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The position of a chunk within its dimension, in chunk units.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ChunkCoord {
    pub cx: i64,
    pub cz: i64,
}

impl ChunkCoord {
    pub const fn new(cx: i64, cz: i64) -> Self {
        Self { cx, cz }
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.cx, self.cz)
    }
}

impl ResourceKey for ChunkCoord {
    fn write_canonical(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.to_string().as_bytes());
    }
}

/// Identifies one serialized component of one chunk.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ComponentKey {
    pub coord: ChunkCoord,
    pub component: String,
}

impl ComponentKey {
    pub fn new(coord: ChunkCoord, component: impl Into<String>) -> Self {
        Self {
            coord,
            component: component.into(),
        }
    }
}

impl ResourceKey for ComponentKey {
    fn write_canonical(&self, out: &mut Vec<u8>) {
        self.coord.write_canonical(out);
        out.push(b'/');
        out.extend_from_slice(self.component.as_bytes());
    }
}

/// Serialized components by ID. `None` means the component is not loaded.
pub type ComponentMap = BTreeMap<String, Option<Vec<u8>>>;

/// A chunk in the editor's native format, made of independently serialized components.
///
/// A chunk may be only partially loaded. Components that were not loaded serialize to `None`, and are left untouched in the
/// history when the chunk is set. An empty payload is treated the same as a missing one.
pub trait Chunk: Send + Sized {
    /// Identifies the chunk's class. Chunks of one class always have the same components.
    fn class_id(&self) -> &str;

    /// Every component of this chunk's class.
    fn component_ids(&self) -> Vec<String>;

    fn serialize_components(&self) -> Result<ComponentMap, ChunkError>;

    /// Loads the given components into the chunk. A `None` value means the component has no stored data.
    fn reconstruct_components(&mut self, components: ComponentMap) -> Result<(), ChunkError>;
}

/// What the chunk layer of the history stores for an existing chunk. A chunk that does not exist has an empty payload.
#[derive(Archive, Debug, Deserialize, PartialEq, Serialize)]
#[archive(check_bytes)]
pub(crate) enum ChunkRecord {
    Class(String),
    LoadError(ChunkLoadError),
}

impl ChunkRecord {
    pub fn encode(&self) -> Option<Vec<u8>> {
        rkyv::to_bytes::<_, 256>(self).ok().map(|bytes| bytes.to_vec())
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        // History payloads carry no alignment guarantee.
        let mut aligned = AlignedVec::with_capacity(bytes.len());
        aligned.extend_from_slice(bytes);
        rkyv::from_bytes::<Self>(&aligned).ok()
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

    #[test]
    fn canonical_keys() {
        let mut bytes = Vec::new();
        ComponentKey::new(ChunkCoord::new(-2, 7), "blocks").write_canonical(&mut bytes);
        assert_eq!(bytes, b"-2/7/blocks");
    }

    #[test]
    fn load_errors_survive_the_record_encoding() {
        let record = ChunkRecord::LoadError(ChunkLoadError::new("bad region header"));
        let bytes = record.encode().unwrap();
        assert_eq!(ChunkRecord::decode(&bytes), Some(record));
    }

    #[test]
    fn garbage_is_not_a_record() {
        assert_eq!(ChunkRecord::decode(&[0xff; 3]), None);
    }
}

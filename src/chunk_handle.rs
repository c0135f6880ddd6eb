use crate::chunk::ChunkRecord;
use crate::{
    Chunk, ChunkCoord, ChunkError, ChunkLoadError, ComponentKey, ComponentMap, Level, RawChunkError,
    RawDimension,
};

use chisel_core::Signal;
use chisel_history::HistoryLayer;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::sync::Arc;
use std::time::Duration;

/// Proof that the current thread holds a [`ChunkHandle`]'s lock. Released on drop.
pub struct ChunkLock<'a> {
    _guard: ReentrantMutexGuard<'a, ()>,
}

/// Lockable, undoable access to one chunk of a [`Dimension`](crate::Dimension).
///
/// # History
///
/// A chunk is stored as two kinds of resources: a record in the chunk layer that says whether the chunk exists and what class
/// it is (or why it failed to load), and one resource per serialized component in the component layer.
///
/// # Loading
///
/// The first time a chunk is read or written, it is loaded from the [`RawDimension`] and its state becomes version 0 of its
/// resources. A chunk that fails to load, or whose loaded state cannot be serialized, keeps failing with the same
/// [`ChunkLoadError`] until it is overwritten.
///
/// # Locking
///
/// Each handle has its own re-entrant lock. [`get`](Self::get) and [`class_id`](Self::class_id) wait for it, while
/// [`set`](Self::set) and [`delete`](Self::delete) fail with [`ChunkError::LockNotAcquired`] instead of waiting if another
/// thread holds the lock. Use [`lock`](Self::lock) to hold it
/// across several calls, or [`edit`](Self::edit) for a read-modify-write.
pub struct ChunkHandle<D: RawDimension> {
    coord: ChunkCoord,
    lock: ReentrantMutex<()>,
    level: Level,
    raw: Arc<D>,
    chunk_history: Arc<HistoryLayer<ChunkCoord>>,
    chunk_data_history: Arc<HistoryLayer<ComponentKey>>,
    changed: Signal<()>,
}

impl<D: RawDimension> ChunkHandle<D> {
    pub(crate) fn new(
        coord: ChunkCoord,
        level: Level,
        raw: Arc<D>,
        chunk_history: Arc<HistoryLayer<ChunkCoord>>,
        chunk_data_history: Arc<HistoryLayer<ComponentKey>>,
    ) -> Self {
        Self {
            coord,
            lock: ReentrantMutex::new(()),
            level,
            raw,
            chunk_history,
            chunk_data_history,
            changed: Signal::new(),
        }
    }

    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// Emitted after this chunk is set, edited or deleted.
    pub fn changed(&self) -> &Signal<()> {
        &self.changed
    }

    /// Acquires the chunk's lock.
    ///
    /// If `blocking` is false, fails immediately when another thread holds the lock. Otherwise waits, for at most `timeout` if
    /// one is given.
    pub fn lock(
        &self,
        blocking: bool,
        timeout: Option<Duration>,
    ) -> Result<ChunkLock<'_>, ChunkError> {
        let guard = match (blocking, timeout) {
            (false, _) => self.lock.try_lock(),
            (true, Some(timeout)) => self.lock.try_lock_for(timeout),
            (true, None) => Some(self.lock.lock()),
        };
        guard
            .map(|g| ChunkLock { _guard: g })
            .ok_or(ChunkError::LockNotAcquired)
    }

    /// Whether the chunk exists, without loading it.
    ///
    /// A chunk that exists may still fail to load.
    pub fn exists(&self) -> bool {
        match self.chunk_history.resource(&self.coord) {
            Some(resource) => resource.exists(),
            None => self.raw.has_chunk(self.coord),
        }
    }

    pub fn class_id(&self) -> Result<String, ChunkError> {
        let _lock = self.lock(true, None)?;
        self.preload()?;
        self.stored_class_id()
    }

    /// A fresh copy of the chunk.
    ///
    /// With `Some(components)`, only those components are loaded. IDs that the chunk's class does not have are ignored.
    pub fn get(&self, components: Option<&[&str]>) -> Result<D::Chunk, ChunkError> {
        let _lock = self.lock(true, None)?;
        self.get_locked(components)
    }

    /// Overwrites the chunk. Components that `chunk` has not loaded keep their current data.
    pub fn set(&self, chunk: &D::Chunk) -> Result<(), ChunkError> {
        {
            let _lock = self.lock(false, None)?;
            self.set_locked(Some(chunk))?;
        }
        self.emit_changed();
        Ok(())
    }

    pub fn delete(&self) -> Result<(), ChunkError> {
        {
            let _lock = self.lock(false, None)?;
            self.set_locked(None)?;
        }
        self.emit_changed();
        Ok(())
    }

    /// Locks the chunk, loads it, and passes it to `f`. The chunk is written back only if `f` returns `Ok`.
    pub fn edit<R, E>(
        &self,
        components: Option<&[&str]>,
        blocking: bool,
        timeout: Option<Duration>,
        f: impl FnOnce(&mut D::Chunk) -> Result<R, E>,
    ) -> Result<R, E>
    where
        E: From<ChunkError>,
    {
        let output = {
            let _lock = self.lock(blocking, timeout)?;
            let mut chunk = self.get_locked(components)?;
            let output = f(&mut chunk)?;
            self.set_locked(Some(&chunk))?;
            output
        };
        self.emit_changed();
        Ok(output)
    }

    fn emit_changed(&self) {
        self.changed.emit(());
        self.level.changed().emit(());
    }

    fn component_key(&self, component: &str) -> ComponentKey {
        ComponentKey::new(self.coord, component)
    }

    /// Loads the chunk from the raw dimension if the history doesn't know about it yet. Lock must be held.
    fn preload(&self) -> Result<(), ChunkError> {
        if self.chunk_history.has_resource(&self.coord) {
            return Ok(());
        }

        let record = match self.load_native() {
            Ok(chunk) => match self.initial_components(&chunk) {
                Ok(components) => {
                    for (key, data) in components {
                        if !self.chunk_data_history.has_resource(&key) {
                            self.chunk_data_history.set_initial_resource(key, data)?;
                        }
                    }
                    ChunkRecord::Class(chunk.class_id().to_owned())
                }
                Err(e) => {
                    log::debug!("Chunk {} could not be captured: {}", self.coord, e);
                    ChunkRecord::LoadError(ChunkLoadError::new(e.to_string()))
                }
            },
            Err(RawChunkError::DoesNotExist) => {
                self.chunk_history
                    .set_initial_resource(self.coord, Vec::new())?;
                return Ok(());
            }
            Err(RawChunkError::Load(e)) => {
                log::debug!("Chunk {} failed to load: {}", self.coord, e);
                ChunkRecord::LoadError(e)
            }
        };
        let bytes = self.encode(&record)?;
        self.chunk_history.set_initial_resource(self.coord, bytes)?;
        Ok(())
    }

    /// Every component of a freshly loaded chunk, keyed for the component layer.
    fn initial_components(
        &self,
        chunk: &D::Chunk,
    ) -> Result<Vec<(ComponentKey, Vec<u8>)>, ChunkError> {
        let mut components = Vec::new();
        for (component, data) in chunk.serialize_components()? {
            let data = data.ok_or_else(|| ChunkError::MissingComponent {
                coord: self.coord,
                component: component.clone(),
            })?;
            components.push((self.component_key(&component), data));
        }
        Ok(components)
    }

    fn load_native(&self) -> Result<D::Chunk, RawChunkError> {
        let raw_chunk = self.raw.get_raw_chunk(self.coord)?;
        self.raw.raw_chunk_to_native_chunk(raw_chunk, self.coord)
    }

    fn encode(&self, record: &ChunkRecord) -> Result<Vec<u8>, ChunkError> {
        record
            .encode()
            .ok_or(ChunkError::CorruptRecord { coord: self.coord })
    }

    /// The class recorded for the active version, replaying a stored load error.
    fn stored_class_id(&self) -> Result<String, ChunkError> {
        let bytes = self.chunk_history.get_resource(&self.coord)?;
        if bytes.is_empty() {
            return Err(ChunkError::DoesNotExist { coord: self.coord });
        }
        match ChunkRecord::decode(&bytes) {
            Some(ChunkRecord::Class(class_id)) => Ok(class_id),
            Some(ChunkRecord::LoadError(e)) => Err(e.into()),
            None => Err(ChunkError::CorruptRecord { coord: self.coord }),
        }
    }

    fn get_locked(&self, components: Option<&[&str]>) -> Result<D::Chunk, ChunkError> {
        self.preload()?;
        let class_id = self.stored_class_id()?;
        let mut chunk = self.raw.null_chunk(&class_id)?;

        let mut component_ids = chunk.component_ids();
        if let Some(wanted) = components {
            component_ids.retain(|id| wanted.contains(&id.as_str()));
        }

        let mut loaded = ComponentMap::new();
        for id in component_ids {
            let key = self.component_key(&id);
            let data = if self.chunk_data_history.has_resource(&key) {
                Some(self.chunk_data_history.get_resource(&key)?).filter(|d| !d.is_empty())
            } else {
                None
            };
            loaded.insert(id, data);
        }
        chunk.reconstruct_components(loaded)?;
        Ok(chunk)
    }

    /// Lock must be held.
    fn set_locked(&self, chunk: Option<&D::Chunk>) -> Result<(), ChunkError> {
        if !self.chunk_history.has_resource(&self.coord) {
            if self.level.history_enabled() {
                // Capture the current state so it can be restored with undo.
                self.preload()?;
            } else {
                self.chunk_history
                    .set_initial_resource(self.coord, Vec::new())?;
            }
        }

        let chunk = match chunk {
            Some(chunk) => chunk,
            None => {
                self.chunk_history.set_resource(&self.coord, Vec::new())?;
                return Ok(());
            }
        };

        let old_class_id = match self.stored_class_id() {
            Ok(class_id) => Some(class_id),
            Err(ChunkError::DoesNotExist { .. } | ChunkError::Load(_)) => None,
            Err(e) => return Err(e),
        };
        let class_id = chunk.class_id();
        let components = chunk.serialize_components()?;
        if old_class_id.as_deref() != Some(class_id) && components.values().any(Option::is_none) {
            return Err(ChunkError::IncompleteClassChange { coord: self.coord });
        }

        let record = self.encode(&ChunkRecord::Class(class_id.to_owned()))?;

        // Components first, so a failed write never records the new class over stale components.
        for (component, data) in components {
            let data = match data {
                Some(data) => data,
                None => continue,
            };
            let key = self.component_key(&component);
            if self.chunk_data_history.has_resource(&key) {
                if self.chunk_data_history.get_resource(&key)? == data {
                    continue;
                }
            } else {
                // Undo must be able to return the component to "absent".
                self.chunk_data_history
                    .set_initial_resource(key.clone(), Vec::new())?;
            }
            self.chunk_data_history.set_resource(&key, data)?;
        }
        self.chunk_history.set_resource(&self.coord, record)?;
        Ok(())
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

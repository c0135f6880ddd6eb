use super::{cache_key, Resource, ResourceKey};
use crate::{CacheError, DiskCache};

use chisel_core::{AllocId32, Allocator32, SmallKeyHashMap, SmallKeyHashSet};

use parking_lot::Mutex;
use std::any::Any;
use std::sync::Arc;
use uuid::Uuid;

/// Everything behind the history lock, plus the cache that payloads are written to.
pub(crate) struct HistoryShared {
    pub state: Mutex<HistoryState>,
    pub cache: Arc<DiskCache>,
}

/// Identifies a registered layer. The generation tells a live layer apart from a dropped one whose slot was reused.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) struct LayerId {
    pub slot: AllocId32,
    pub generation: u64,
}

/// A resource that changed during some undo bin.
pub(crate) type BinEntry = (LayerId, AllocId32);

pub(crate) struct LayerEntry {
    generation: u64,
    uuid: Uuid,
    table: Box<dyn ResourceTable>,
}

/// The key-type-erased view of a layer's resources that undo, redo and friends operate on.
pub(crate) trait ResourceTable: Send {
    fn resource_mut(&mut self, slot: AllocId32) -> Option<&mut Resource>;

    fn for_each_resource_mut(&mut self, f: &mut dyn FnMut(AllocId32, &mut Resource));

    /// The cache keys of every stored version of every resource.
    fn all_cache_keys(&self, layer: &Uuid) -> Vec<Vec<u8>>;

    fn cache_key(&self, layer: &Uuid, slot: AllocId32, version: usize) -> Option<Vec<u8>>;

    fn clear(&mut self);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// The resources of one layer. Resources are stored in an arena so undo bins can refer to them by slot.
pub(crate) struct KeyedResources<K> {
    slots: SmallKeyHashMap<K, AllocId32>,
    arena: Allocator32<(K, Resource)>,
}

impl<K> Default for KeyedResources<K> {
    fn default() -> Self {
        Self {
            slots: Default::default(),
            arena: Default::default(),
        }
    }
}

impl<K: ResourceKey> KeyedResources<K> {
    pub fn get(&self, key: &K) -> Option<&Resource> {
        let slot = self.slots.get(key)?;
        self.arena.get(*slot).map(|(_, r)| r)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<(AllocId32, &mut Resource)> {
        let slot = *self.slots.get(key)?;
        self.arena.get_mut(slot).map(|(_, r)| (slot, r))
    }

    pub fn contains(&self, key: &K) -> bool {
        self.slots.contains_key(key)
    }

    pub fn insert(&mut self, key: K, resource: Resource) {
        let slot = self.arena.insert((key.clone(), resource));
        self.slots.insert(key, slot);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &Resource)> {
        self.arena.iter().map(|(_, (k, r))| (k, r))
    }
}

impl<K: ResourceKey> ResourceTable for KeyedResources<K> {
    fn resource_mut(&mut self, slot: AllocId32) -> Option<&mut Resource> {
        self.arena.get_mut(slot).map(|(_, r)| r)
    }

    fn for_each_resource_mut(&mut self, f: &mut dyn FnMut(AllocId32, &mut Resource)) {
        for (slot, (_, resource)) in self.arena.iter_mut() {
            f(slot, resource);
        }
    }

    fn all_cache_keys(&self, layer: &Uuid) -> Vec<Vec<u8>> {
        self.iter()
            .flat_map(|(key, resource)| {
                (0..resource.num_versions()).map(move |version| cache_key(layer, key, version))
            })
            .collect()
    }

    fn cache_key(&self, layer: &Uuid, slot: AllocId32, version: usize) -> Option<Vec<u8>> {
        self.arena
            .get(slot)
            .map(|(key, _)| cache_key(layer, key, version))
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.arena.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// The registered layers and the undo bins that refer into them.
///
/// Bin 0 is the bin in effect before the first call to [`create_undo_bin`](Self::create_undo_bin). Nothing is ever added
/// to it, so changes made in it can't be undone.
pub(crate) struct HistoryState {
    layers: Allocator32<LayerEntry>,
    next_generation: u64,
    bins: Vec<SmallKeyHashSet<BinEntry>>,
    history_index: usize,
    has_redo: bool,
}

impl Default for HistoryState {
    fn default() -> Self {
        Self {
            layers: Default::default(),
            next_generation: 0,
            bins: vec![SmallKeyHashSet::default()],
            history_index: 0,
            has_redo: false,
        }
    }
}

impl HistoryState {
    pub fn history_index(&self) -> usize {
        self.history_index
    }

    pub fn undo_count(&self) -> usize {
        self.history_index
    }

    pub fn redo_count(&self) -> usize {
        self.bins.len() - self.history_index - 1
    }

    pub fn register_layer<K: ResourceKey>(&mut self, uuid: Uuid) -> LayerId {
        let generation = self.next_generation;
        self.next_generation += 1;
        let slot = self.layers.insert(LayerEntry {
            generation,
            uuid,
            table: Box::new(KeyedResources::<K>::default()),
        });
        LayerId { slot, generation }
    }

    /// Unregisters the layer and returns the cache keys of all of its versions.
    pub fn unregister_layer(&mut self, id: LayerId) -> Vec<Vec<u8>> {
        if !self.is_live(id) {
            return Vec::new();
        }
        match self.layers.remove(id.slot) {
            Some(entry) => entry.table.all_cache_keys(&entry.uuid),
            None => Vec::new(),
        }
    }

    fn is_live(&self, id: LayerId) -> bool {
        matches!(self.layers.get(id.slot), Some(entry) if entry.generation == id.generation)
    }

    pub fn table<K: ResourceKey>(&self, id: LayerId) -> Option<&KeyedResources<K>> {
        let entry = self.layers.get(id.slot)?;
        if entry.generation != id.generation {
            return None;
        }
        entry.table.as_any().downcast_ref()
    }

    pub fn table_mut<K: ResourceKey>(&mut self, id: LayerId) -> Option<&mut KeyedResources<K>> {
        let entry = self.layers.get_mut(id.slot)?;
        if entry.generation != id.generation {
            return None;
        }
        entry.table.as_any_mut().downcast_mut()
    }

    /// Adds the resource to the current bin. Changes made in bin 0 are not recorded.
    pub fn record_change(&mut self, entry: BinEntry) {
        if self.history_index > 0 {
            self.bins[self.history_index].insert(entry);
        }
    }

    pub fn create_undo_bin(&mut self, cache: &DiskCache) -> Result<(), CacheError> {
        self.invalidate_future(cache)?;
        self.history_index += 1;
        self.bins.push(SmallKeyHashSet::default());
        Ok(())
    }

    /// Destroys every bin that could be redone, along with the versions those bins produced.
    pub fn invalidate_future(&mut self, cache: &DiskCache) -> Result<(), CacheError> {
        if !self.has_redo {
            return Ok(());
        }
        self.has_redo = false;
        let history_index = self.history_index;
        self.bins.truncate(history_index + 1);

        let mut discarded_keys = Vec::new();
        let mut lost_bin = SmallKeyHashSet::default();
        for (slot, layer) in self.layers.iter_mut() {
            let layer_id = LayerId {
                slot,
                generation: layer.generation,
            };
            let mut discarded_versions = Vec::new();
            layer.table.for_each_resource_mut(&mut |resource_slot, resource| {
                let had_global = resource.global_index().is_some();
                let dropped = resource.discard_future(history_index);
                if had_global && resource.global_index().is_none() {
                    lost_bin.insert((layer_id, resource_slot));
                }
                if !dropped.is_empty() {
                    discarded_versions.push((resource_slot, dropped));
                }
            });
            for (resource_slot, versions) in discarded_versions {
                for version in versions {
                    if let Some(key) = layer.table.cache_key(&layer.uuid, resource_slot, version) {
                        discarded_keys.push(key);
                    }
                }
            }
        }

        // A resource whose newest change was discarded still belongs to the most recent surviving bin that changed it, so
        // another edit in that bin amends rather than appends.
        let Self { layers, bins, .. } = self;
        for (bin_index, bin) in bins.iter().enumerate() {
            for entry in bin.iter().filter(|e| lost_bin.contains(*e)) {
                if let Some(resource) = resource_mut(layers, *entry) {
                    resource.restore_global_index(bin_index);
                }
            }
        }

        log::debug!(
            "Discarded redo history, deleting {} cached versions",
            discarded_keys.len()
        );
        for key in discarded_keys {
            cache.delete(&key)?;
        }
        Ok(())
    }

    pub fn undo(&mut self) -> bool {
        if self.history_index == 0 {
            return false;
        }
        let history_index = self.history_index;
        let Self { layers, bins, .. } = self;
        for entry in bins[history_index].iter() {
            if let Some(resource) = resource_mut(layers, *entry) {
                resource.step_back();
            }
        }
        self.history_index -= 1;
        self.has_redo = true;
        true
    }

    pub fn redo(&mut self) -> bool {
        if !self.has_redo {
            return false;
        }
        self.history_index += 1;
        let history_index = self.history_index;
        let Self { layers, bins, .. } = self;
        for entry in bins[history_index].iter() {
            if let Some(resource) = resource_mut(layers, *entry) {
                resource.step_forward();
            }
        }
        self.has_redo = self.redo_count() > 0;
        true
    }

    pub fn mark_saved(&mut self) {
        for layer in self.layers.values_mut() {
            layer.table.for_each_resource_mut(&mut |_, resource| resource.mark_saved());
        }
    }

    /// Forgets every resource and every bin. Returns the cache keys of all versions.
    pub fn reset(&mut self) -> Vec<Vec<u8>> {
        let mut keys = Vec::new();
        for layer in self.layers.values_mut() {
            keys.extend(layer.table.all_cache_keys(&layer.uuid));
            layer.table.clear();
        }
        self.bins = vec![SmallKeyHashSet::default()];
        self.history_index = 0;
        self.has_redo = false;
        keys
    }
}

fn resource_mut(layers: &mut Allocator32<LayerEntry>, (layer, slot): BinEntry) -> Option<&mut Resource> {
    let entry = layers.get_mut(layer.slot)?;
    if entry.generation != layer.generation {
        return None;
    }
    entry.table.resource_mut(slot)
}

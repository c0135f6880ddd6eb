use super::state::{HistoryShared, KeyedResources, LayerId};
use super::{cache_key, HistoryError, Resource, ResourceKey};

use chisel_core::SmallKeyHashMap;

use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

/// One namespace of resources on a [`HistoryManager`](crate::HistoryManager)'s timeline.
///
/// A resource must be created with [`set_initial_resource`](Self::set_initial_resource) before it can be changed with
/// [`set_resource`](Self::set_resource). An empty payload means "does not exist".
///
/// Dropping the layer drops its resources and deletes their payloads from the cache.
pub struct HistoryLayer<K: ResourceKey> {
    shared: Arc<HistoryShared>,
    id: LayerId,
    uuid: Uuid,
    marker: PhantomData<fn() -> K>,
}

impl<K: ResourceKey> HistoryLayer<K> {
    pub(crate) fn new(shared: Arc<HistoryShared>, id: LayerId, uuid: Uuid) -> Self {
        Self {
            shared,
            id,
            uuid,
            marker: PhantomData,
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// The cache key of the active version of `key`.
    pub fn cache_key(&self, key: &K) -> Result<Vec<u8>, HistoryError> {
        let resource = self.resource(key).ok_or_else(|| HistoryError::not_found(key))?;
        Ok(cache_key(&self.uuid, key, resource.index()))
    }

    fn read<R>(&self, f: impl FnOnce(&KeyedResources<K>) -> R) -> Option<R> {
        let state = self.shared.state.lock();
        state.table::<K>(self.id).map(f)
    }

    /// A snapshot of the version chain of `key`.
    pub fn resource(&self, key: &K) -> Option<Resource> {
        self.read(|table| table.get(key).cloned()).flatten()
    }

    pub fn resources(&self) -> Vec<K> {
        self.read(|table| table.iter().map(|(k, _)| k.clone()).collect())
            .unwrap_or_default()
    }

    /// The keys whose active version is not the saved one.
    pub fn changed_resources(&self) -> Vec<K> {
        self.read(|table| {
            table
                .iter()
                .filter(|(_, r)| r.is_changed())
                .map(|(k, _)| k.clone())
                .collect()
        })
        .unwrap_or_default()
    }

    pub fn resources_exist_map(&self) -> SmallKeyHashMap<K, bool> {
        self.read(|table| table.iter().map(|(k, r)| (k.clone(), r.exists())).collect())
            .unwrap_or_default()
    }

    pub fn has_resource(&self, key: &K) -> bool {
        self.read(|table| table.contains(key)).unwrap_or(false)
    }

    pub fn resource_exists(&self, key: &K) -> Result<bool, HistoryError> {
        self.resource(key)
            .map(|r| r.exists())
            .ok_or_else(|| HistoryError::not_found(key))
    }

    /// The payload of the active version, or an empty `Vec` if the resource does not exist in that version.
    ///
    /// The history lock is held while reading the cache, which may go to the disk tier. Releasing it earlier would let a
    /// concurrent edit amend or discard the version between looking it up and reading its payload.
    pub fn get_resource(&self, key: &K) -> Result<Vec<u8>, HistoryError> {
        let state = self.shared.state.lock();
        let resource = state
            .table::<K>(self.id)
            .and_then(|table| table.get(key))
            .ok_or_else(|| HistoryError::not_found(key))?;
        if !resource.exists() {
            return Ok(Vec::new());
        }
        let value = self
            .shared
            .cache
            .get(&cache_key(&self.uuid, key, resource.index()))?;
        Ok(value)
    }

    /// Creates the resource at version 0.
    pub fn set_initial_resource(&self, key: K, data: Vec<u8>) -> Result<(), HistoryError> {
        let mut state = self.shared.state.lock();
        let table = state
            .table_mut::<K>(self.id)
            .ok_or_else(|| HistoryError::not_found(&key))?;
        if table.contains(&key) {
            return Err(HistoryError::already_exists(&key));
        }
        let exists = !data.is_empty();
        if exists {
            self.shared.cache.set(&cache_key(&self.uuid, &key, 0), data)?;
        }
        table.insert(key, Resource::new(exists));
        Ok(())
    }

    /// Records a new payload for an existing resource.
    ///
    /// The first change to a resource in an undo bin creates a new version; later changes in the same bin overwrite it.
    pub fn set_resource(&self, key: &K, data: Vec<u8>) -> Result<(), HistoryError> {
        let mut state = self.shared.state.lock();
        if !state
            .table::<K>(self.id)
            .map_or(false, |table| table.contains(key))
        {
            return Err(HistoryError::not_found(key));
        }
        state.invalidate_future(&self.shared.cache)?;

        let history_index = state.history_index();
        let table = state
            .table_mut::<K>(self.id)
            .ok_or_else(|| HistoryError::not_found(key))?;
        let (slot, resource) = table
            .get_mut(key)
            .ok_or_else(|| HistoryError::not_found(key))?;

        let (version, is_new) = resource.edit_version(history_index);
        let version_key = cache_key(&self.uuid, key, version);
        let exists = !data.is_empty();
        if exists {
            self.shared.cache.set(&version_key, data)?;
        } else if !is_new {
            self.shared.cache.delete(&version_key)?;
        }
        resource.commit_edit(history_index, exists);

        state.record_change((self.id, slot));
        Ok(())
    }
}

impl<K: ResourceKey> Drop for HistoryLayer<K> {
    fn drop(&mut self) {
        let keys = self.shared.state.lock().unregister_layer(self.id);
        for key in keys {
            if let Err(e) = self.shared.cache.delete(&key) {
                log::warn!("Failed to delete a cached version of layer {}: {}", self.uuid, e);
            }
        }
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
    use crate::{DiskCache, HistoryManager};

    fn manager(max_size: usize) -> (tempfile::TempDir, HistoryManager) {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(dir.path().join("db"), max_size).unwrap();
        (dir, HistoryManager::new(Arc::new(cache)))
    }

    #[test]
    fn undo_redo_single_resource() {
        let (_dir, history) = manager(1 << 20);
        let layer = history.new_layer::<&'static str>();

        layer.set_initial_resource("a", b"v0".to_vec()).unwrap();
        history.create_undo_bin().unwrap();
        layer.set_resource(&"a", b"v1".to_vec()).unwrap();
        assert_eq!(layer.get_resource(&"a").unwrap(), b"v1");

        history.undo().unwrap();
        assert_eq!(layer.get_resource(&"a").unwrap(), b"v0");

        history.redo().unwrap();
        assert_eq!(layer.get_resource(&"a").unwrap(), b"v1");
    }

    #[test]
    fn empty_initial_payload_does_not_exist() {
        let (_dir, history) = manager(1 << 20);
        let layer = history.new_layer::<&'static str>();

        layer.set_initial_resource("c", Vec::new()).unwrap();
        assert!(layer.has_resource(&"c"));
        assert!(!layer.resource_exists(&"c").unwrap());
        assert!(layer.get_resource(&"c").unwrap().is_empty());
    }

    #[test]
    fn unknown_key_is_reported() {
        let (_dir, history) = manager(1 << 20);
        let layer = history.new_layer::<String>();
        let key = "missing".to_string();

        assert!(!layer.has_resource(&key));
        assert!(matches!(
            layer.resource_exists(&key),
            Err(HistoryError::ResourceNotFound { .. })
        ));
        assert!(matches!(
            layer.get_resource(&key),
            Err(HistoryError::ResourceNotFound { .. })
        ));
        assert!(matches!(
            layer.set_resource(&key, b"x".to_vec()),
            Err(HistoryError::ResourceNotFound { .. })
        ));
    }

    #[test]
    fn initializing_twice_fails() {
        let (_dir, history) = manager(1 << 20);
        let layer = history.new_layer::<u64>();
        layer.set_initial_resource(1, b"a".to_vec()).unwrap();
        assert!(matches!(
            layer.set_initial_resource(1, b"b".to_vec()),
            Err(HistoryError::ResourceAlreadyExists { .. })
        ));
        assert_eq!(layer.get_resource(&1).unwrap(), b"a");
    }

    #[test]
    fn delete_and_restore_existence() {
        let (_dir, history) = manager(1 << 20);
        let layer = history.new_layer::<u64>();
        layer.set_initial_resource(5, b"data".to_vec()).unwrap();

        history.create_undo_bin().unwrap();
        layer.set_resource(&5, Vec::new()).unwrap();
        assert!(!layer.resource_exists(&5).unwrap());
        assert_eq!(layer.resources_exist_map().get(&5), Some(&false));

        history.undo().unwrap();
        assert!(layer.resource_exists(&5).unwrap());
        assert_eq!(layer.get_resource(&5).unwrap(), b"data");
    }

    #[test]
    fn amending_to_empty_within_a_bin() {
        let (_dir, history) = manager(1 << 20);
        let layer = history.new_layer::<u64>();
        layer.set_initial_resource(0, b"a".to_vec()).unwrap();

        history.create_undo_bin().unwrap();
        layer.set_resource(&0, b"b".to_vec()).unwrap();
        let amended_key = layer.cache_key(&0).unwrap();
        layer.set_resource(&0, Vec::new()).unwrap();

        assert!(layer.get_resource(&0).unwrap().is_empty());
        assert!(!history.cache().contains(&amended_key).unwrap());
    }

    #[test]
    fn resources_survive_spilling_to_disk() {
        let (_dir, history) = manager(16);
        let layer = history.new_layer::<u64>();
        for i in 0..20 {
            layer.set_initial_resource(i, vec![i as u8; 8]).unwrap();
        }
        history.create_undo_bin().unwrap();
        for i in 0..20 {
            layer.set_resource(&i, vec![i as u8 + 100; 8]).unwrap();
        }
        history.undo().unwrap();
        for i in 0..20 {
            assert_eq!(layer.get_resource(&i).unwrap(), vec![i as u8; 8]);
        }
        assert!(history.cache().ram_size() <= 16);
    }

    #[test]
    fn dropping_a_layer_deletes_its_payloads() {
        let (_dir, history) = manager(1 << 20);
        let layer = history.new_layer::<u64>();
        layer.set_initial_resource(1, b"a".to_vec()).unwrap();
        let key = layer.cache_key(&1).unwrap();
        assert!(history.cache().contains(&key).unwrap());

        drop(layer);
        assert!(!history.cache().contains(&key).unwrap());
    }
}

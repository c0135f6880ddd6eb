use super::{CacheError, ScratchDir};
use crate::CacheConfig;

use chisel_core::LruMap;

use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};

/// The directory name of the disk tier inside a scratch directory.
const DISK_TIER_DIR: &str = "history_db";

/// A byte key, byte value store with a bounded RAM tier and an unbounded disk tier.
///
/// ## RAM Tier
///
/// Values are first written into an [`LruMap`]. Whenever the total size of the resident values exceeds
/// [`max_size`](Self::max_size), least recently used entries are evicted. Entries that were written since they were last
/// loaded are "dirty" and get written to the disk tier as they are evicted. Key sizes are not counted.
///
/// ## Disk Tier
///
/// A [`sled::Db`] that only receives evicted values. Reads that miss the RAM tier are served from here and the value is pulled
/// back into RAM (clean).
///
/// This is scratch storage. The disk tier's directory is deleted when the cache is dropped.
pub struct DiskCache {
    ram: Mutex<RamTier>,
    // Field order matters: the database must be closed before its directory is removed.
    disk: sled::Db,
    disk_dir: RemoveDirOnDrop,
    _scratch: Option<ScratchDir>,
}

struct RamTier {
    entries: LruMap<Box<[u8]>, RamEntry>,
    size: usize,
    max_size: usize,
}

struct RamEntry {
    value: Vec<u8>,
    dirty: bool,
}

impl DiskCache {
    /// Opens (or creates) the disk tier at `path`. The directory at `path` is deleted when the cache is dropped.
    pub fn open(path: impl Into<PathBuf>, max_size: usize) -> Result<Self, CacheError> {
        Self::open_inner(path.into(), max_size, None)
    }

    /// Creates a fresh scratch directory under the configured base directory and opens the disk tier inside of it.
    pub fn open_scratch(config: &CacheConfig) -> Result<Self, CacheError> {
        let scratch = ScratchDir::create(&config.base_dir(), "level_data")?;
        let path = scratch.path().join(DISK_TIER_DIR);
        Self::open_inner(path, config.max_size, Some(scratch))
    }

    fn open_inner(
        path: PathBuf,
        max_size: usize,
        scratch: Option<ScratchDir>,
    ) -> Result<Self, CacheError> {
        let disk = sled::Config::default()
            .path(&path)
            .mode(sled::Mode::LowSpace)
            .flush_every_ms(None)
            .open()?;
        log::debug!("Opened disk cache at {:?} with a {} byte RAM budget", path, max_size);

        Ok(Self {
            ram: Mutex::new(RamTier {
                entries: LruMap::new(),
                size: 0,
                max_size,
            }),
            disk,
            disk_dir: RemoveDirOnDrop(path),
            _scratch: scratch,
        })
    }

    pub fn path(&self) -> &Path {
        &self.disk_dir.0
    }

    pub fn max_size(&self) -> usize {
        self.ram.lock().max_size
    }

    /// Changes the RAM budget, immediately evicting entries if the new budget is exceeded.
    pub fn set_max_size(&self, max_size: usize) -> Result<(), CacheError> {
        let mut ram = self.ram.lock();
        ram.max_size = max_size;
        ram.free(&self.disk)
    }

    /// The number of value bytes currently resident in RAM.
    pub fn ram_size(&self) -> usize {
        self.ram.lock().size
    }

    pub fn contains(&self, key: &[u8]) -> Result<bool, CacheError> {
        if self.ram.lock().entries.contains_key(key) {
            return Ok(true);
        }
        Ok(self.disk.contains_key(key)?)
    }

    pub fn set(&self, key: &[u8], value: Vec<u8>) -> Result<(), CacheError> {
        let mut ram = self.ram.lock();
        ram.remove(key);
        ram.size += value.len();
        ram.entries
            .insert(key.into(), RamEntry { value, dirty: true });
        ram.free(&self.disk)
    }

    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>, CacheError> {
        let mut ram = self.ram.lock();
        if let Some(entry) = ram.entries.get(key) {
            return Ok(entry.value.clone());
        }

        let value = self.disk.get(key)?.ok_or(CacheError::NotFound)?.to_vec();
        log::debug!("Loaded {} bytes from the disk tier", value.len());
        ram.size += value.len();
        ram.entries.insert(
            key.into(),
            RamEntry {
                value: value.clone(),
                dirty: false,
            },
        );
        ram.free(&self.disk)?;
        Ok(value)
    }

    pub fn delete(&self, key: &[u8]) -> Result<(), CacheError> {
        let mut ram = self.ram.lock();
        ram.remove(key);
        self.disk.remove(key)?;
        Ok(())
    }
}

impl RamTier {
    fn remove(&mut self, key: &[u8]) {
        if let Some(entry) = self.entries.remove(key) {
            self.size -= entry.value.len();
        }
    }

    /// Evicts least recently used entries until the RAM budget is met.
    fn free(&mut self, disk: &sled::Db) -> Result<(), CacheError> {
        while self.size > self.max_size {
            let (key, entry) = match self.entries.pop_lru() {
                Some(lru) => lru,
                None => break,
            };
            self.size -= entry.value.len();
            if entry.dirty {
                log::debug!("Spilling {} bytes to the disk tier", entry.value.len());
                if let Err(e) = disk.insert(&key[..], entry.value.as_slice()) {
                    // Put the value back so it is not lost.
                    self.size += entry.value.len();
                    self.entries.insert(key, entry);
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }
}

struct RemoveDirOnDrop(PathBuf);

impl Drop for RemoveDirOnDrop {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.0) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Failed to remove disk cache {:?}: {}", self.0, e);
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

    fn open_cache(max_size: usize) -> (tempfile::TempDir, DiskCache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(dir.path().join("db"), max_size).unwrap();
        (dir, cache)
    }

    #[test]
    fn set_then_get_from_ram() {
        let (_dir, cache) = open_cache(1024);
        cache.set(b"a", b"hello".to_vec()).unwrap();
        assert_eq!(cache.get(b"a").unwrap(), b"hello");
        assert_eq!(cache.ram_size(), 5);
    }

    #[test]
    fn missing_key_is_not_found() {
        let (_dir, cache) = open_cache(1024);
        assert!(matches!(cache.get(b"nope"), Err(CacheError::NotFound)));
        assert!(!cache.contains(b"nope").unwrap());
    }

    #[test]
    fn evicted_values_are_read_back_from_disk() {
        let (_dir, cache) = open_cache(10);
        cache.set(b"a", vec![1; 6]).unwrap();
        cache.set(b"b", vec![2; 6]).unwrap();

        // "a" was least recently used, so it spilled.
        assert_eq!(cache.ram_size(), 6);
        assert!(cache.contains(b"a").unwrap());

        assert_eq!(cache.get(b"a").unwrap(), vec![1; 6]);
        assert_eq!(cache.get(b"b").unwrap(), vec![2; 6]);
        assert!(cache.ram_size() <= 10);
    }

    #[test]
    fn ram_size_never_exceeds_budget() {
        let (_dir, cache) = open_cache(100);
        for i in 0..50u8 {
            cache.set(&[i], vec![i; (i as usize % 17) + 1]).unwrap();
            assert!(cache.ram_size() <= 100);
        }
        for i in 0..50u8 {
            assert_eq!(cache.get(&[i]).unwrap(), vec![i; (i as usize % 17) + 1]);
            assert!(cache.ram_size() <= 100);
        }
    }

    #[test]
    fn oversized_value_still_round_trips() {
        let (_dir, cache) = open_cache(4);
        cache.set(b"big", vec![9; 64]).unwrap();
        assert_eq!(cache.ram_size(), 0);
        assert_eq!(cache.get(b"big").unwrap(), vec![9; 64]);
    }

    #[test]
    fn overwrite_replaces_spilled_value() {
        let (_dir, cache) = open_cache(4);
        cache.set(b"k", vec![1; 8]).unwrap();
        cache.set(b"k", vec![2; 2]).unwrap();
        assert_eq!(cache.get(b"k").unwrap(), vec![2; 2]);
        assert_eq!(cache.ram_size(), 2);
    }

    #[test]
    fn delete_removes_from_both_tiers() {
        let (_dir, cache) = open_cache(4);
        cache.set(b"ram", vec![1; 2]).unwrap();
        cache.set(b"disk", vec![2; 8]).unwrap();
        cache.delete(b"ram").unwrap();
        cache.delete(b"disk").unwrap();
        assert!(matches!(cache.get(b"ram"), Err(CacheError::NotFound)));
        assert!(matches!(cache.get(b"disk"), Err(CacheError::NotFound)));
        assert_eq!(cache.ram_size(), 0);
    }

    #[test]
    fn shrinking_budget_evicts_immediately() {
        let (_dir, cache) = open_cache(1000);
        for i in 0..10u8 {
            cache.set(&[i], vec![i; 10]).unwrap();
        }
        assert_eq!(cache.ram_size(), 100);
        cache.set_max_size(25).unwrap();
        assert_eq!(cache.max_size(), 25);
        assert_eq!(cache.ram_size(), 20);
        for i in 0..10u8 {
            assert_eq!(cache.get(&[i]).unwrap(), vec![i; 10]);
        }
    }

    #[test]
    fn dropping_cache_deletes_its_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");
        let cache = DiskCache::open(&path, 4).unwrap();
        cache.set(b"k", vec![0; 8]).unwrap();
        assert!(path.exists());
        drop(cache);
        assert!(!path.exists());
    }

    #[test]
    fn scratch_cache_lives_in_locked_scratch_dir() {
        let base = tempfile::tempdir().unwrap();
        let config = CacheConfig {
            cache_dir: Some(base.path().to_owned()),
            max_size: 16,
        };
        let cache = DiskCache::open_scratch(&config).unwrap();
        let db_path = cache.path().to_owned();
        assert_eq!(db_path.file_name().unwrap(), DISK_TIER_DIR);
        let scratch_path = db_path.parent().unwrap().to_owned();
        assert!(scratch_path.join("lock").exists());

        drop(cache);
        assert!(!scratch_path.exists());
    }
}

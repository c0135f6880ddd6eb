//! The process-wide cache service.
//!
//! Nothing here is created implicitly. A process that wants a shared cache calls [`init_global_cache`] once at startup and
//! [`shutdown_global_cache`] before exit. Shutting down only drops the service's own handle; the cache is torn down when
//! the last [`Arc`] handed out by [`global_cache`] is dropped.

use super::{clear_stale_scratch_dirs, CacheError, DiskCache};
use crate::{CacheConfig, DEFAULT_CACHE_SIZE};

use parking_lot::{const_mutex, Mutex};
use std::sync::Arc;

struct GlobalCache {
    instance: Option<Arc<DiskCache>>,
    /// Set by [`set_global_cache_size`]; takes precedence over the config passed to [`init_global_cache`].
    cache_size: Option<usize>,
}

static GLOBAL: Mutex<GlobalCache> = const_mutex(GlobalCache {
    instance: None,
    cache_size: None,
});

/// Sweeps stale scratch directories under the configured base directory, then opens the global cache in a new scratch
/// directory.
///
/// The RAM budget is `config.max_size`, unless [`set_global_cache_size`] was called with a different value beforehand.
pub fn init_global_cache(config: &CacheConfig) -> Result<Arc<DiskCache>, CacheError> {
    let mut global = GLOBAL.lock();
    if global.instance.is_some() {
        return Err(CacheError::AlreadyInitialized);
    }

    let removed = clear_stale_scratch_dirs(&config.base_dir());
    if removed > 0 {
        log::debug!("Removed {} stale scratch directories", removed);
    }

    let config = CacheConfig {
        max_size: global.cache_size.unwrap_or(config.max_size),
        ..config.clone()
    };
    let cache = Arc::new(DiskCache::open_scratch(&config)?);
    global.instance = Some(cache.clone());
    Ok(cache)
}

/// The global cache, if [`init_global_cache`] has been called and the service has not been shut down.
pub fn global_cache() -> Option<Arc<DiskCache>> {
    GLOBAL.lock().instance.clone()
}

/// Releases the service's handle to the global cache.
pub fn shutdown_global_cache() {
    // Drop outside of the lock; closing the disk tier touches the filesystem.
    let instance = GLOBAL.lock().instance.take();
    drop(instance);
}

pub fn global_cache_size() -> usize {
    let global = GLOBAL.lock();
    match &global.instance {
        Some(cache) => cache.max_size(),
        None => global.cache_size.unwrap_or(DEFAULT_CACHE_SIZE),
    }
}

/// Sets the RAM budget of the global cache, whether or not it currently exists.
pub fn set_global_cache_size(size: usize) -> Result<(), CacheError> {
    let mut global = GLOBAL.lock();
    global.cache_size = Some(size);
    if let Some(cache) = &global.instance {
        cache.set_max_size(size)?;
    }
    Ok(())
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

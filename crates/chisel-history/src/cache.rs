mod disk_cache;
mod error;
mod global;
mod scratch_dir;

pub use disk_cache::DiskCache;
pub use error::CacheError;
pub use global::{
    global_cache, global_cache_size, init_global_cache, set_global_cache_size,
    shutdown_global_cache,
};
pub use scratch_dir::{clear_stale_scratch_dirs, ScratchDir, SCRATCH_DIR_PREFIX, STALE_AFTER};

use crate::CacheError;

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Overrides the base directory that scratch directories are created in.
pub const CACHE_DIR_ENV: &str = "CHISEL_CACHE_DIR";
/// Overrides the RAM budget of the cache, in bytes.
pub const CACHE_SIZE_ENV: &str = "CHISEL_CACHE_SIZE";

pub const DEFAULT_CACHE_SIZE: usize = 100_000_000;

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Base directory for scratch directories. Falls back to a `chisel` directory inside the platform temp directory.
    pub cache_dir: Option<PathBuf>,
    /// Number of payload bytes the RAM tier may hold before spilling to disk.
    pub max_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            max_size: DEFAULT_CACHE_SIZE,
        }
    }
}

impl CacheConfig {
    pub fn read_file(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let reader = std::fs::File::open(path)?;

        Ok(ron::de::from_reader(reader)?)
    }

    /// The default config with any overrides found in the environment applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(dir) = env::var_os(CACHE_DIR_ENV) {
            config.cache_dir = Some(PathBuf::from(dir));
        }
        if let Ok(size) = env::var(CACHE_SIZE_ENV) {
            match size.trim().parse() {
                Ok(size) => config.max_size = size,
                Err(_) => log::warn!("Ignoring invalid {}={:?}", CACHE_SIZE_ENV, size),
            }
        }
        config
    }

    pub fn base_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| env::temp_dir().join("chisel"))
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

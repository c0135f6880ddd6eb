use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache key not found")]
    NotFound,
    #[error("the global cache has already been initialized")]
    AlreadyInitialized,
    #[error("disk tier error: {0}")]
    Sled(#[from] sled::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid cache config: {0}")]
    Config(#[from] ron::error::SpannedError),
}

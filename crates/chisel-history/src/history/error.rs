use crate::CacheError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("there is nothing to undo")]
    NothingToUndo,
    #[error("there is nothing to redo")]
    NothingToRedo,
    #[error("resource {key} has not been initialized")]
    ResourceNotFound { key: String },
    #[error("resource {key} has already been initialized")]
    ResourceAlreadyExists { key: String },
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl HistoryError {
    pub(crate) fn not_found(key: &impl std::fmt::Debug) -> Self {
        Self::ResourceNotFound {
            key: format!("{:?}", key),
        }
    }

    pub(crate) fn already_exists(key: &impl std::fmt::Debug) -> Self {
        Self::ResourceAlreadyExists {
            key: format!("{:?}", key),
        }
    }
}

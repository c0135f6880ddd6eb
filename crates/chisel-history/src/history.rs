mod error;
mod key;
mod layer;
mod manager;
mod resource;
mod state;

pub use error::HistoryError;
pub use key::{cache_key, ResourceKey};
pub use layer::HistoryLayer;
pub use manager::HistoryManager;
pub use resource::Resource;

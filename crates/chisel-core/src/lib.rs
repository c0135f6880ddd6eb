pub mod allocator;
pub mod lru;
pub mod signal;

use ahash::{AHashMap, AHashSet};
pub type SmallKeyHashMap<K, V> = AHashMap<K, V>;
pub type SmallKeyHashSet<K> = AHashSet<K>;

pub use allocator::{AllocId32, Allocator32};
pub use lru::LruMap;
pub use signal::Signal;

// Re-exports.
pub use crossbeam;
pub use static_assertions;

use std::fmt::Debug;
use std::hash::Hash;
use uuid::Uuid;

/// Identifies one resource within a [`HistoryLayer`](crate::HistoryLayer).
///
/// The canonical bytes are used to build cache keys, so two keys that compare equal must write the same bytes, and two keys
/// that differ must write different bytes.
pub trait ResourceKey: Clone + Debug + Eq + Hash + Send + 'static {
    fn write_canonical(&self, out: &mut Vec<u8>);
}

/// The cache key of one version of one resource: `uuid/canonical key/version`.
pub fn cache_key<K: ResourceKey>(layer: &Uuid, key: &K, version: usize) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(32);
    bytes.extend_from_slice(layer.as_bytes());
    bytes.push(b'/');
    key.write_canonical(&mut bytes);
    bytes.push(b'/');
    bytes.extend_from_slice(version.to_string().as_bytes());
    bytes
}

impl ResourceKey for String {
    fn write_canonical(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.as_bytes());
    }
}

impl ResourceKey for &'static str {
    fn write_canonical(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.as_bytes());
    }
}

impl ResourceKey for Vec<u8> {
    fn write_canonical(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self);
    }
}

macro_rules! impl_decimal_key {
    ($($t:ty),*) => {
        $(
            impl ResourceKey for $t {
                fn write_canonical(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(self.to_string().as_bytes());
                }
            }
        )*
    };
}

impl_decimal_key!(u32, u64, i32, i64);

impl<A: ResourceKey, B: ResourceKey> ResourceKey for (A, B) {
    fn write_canonical(&self, out: &mut Vec<u8>) {
        self.0.write_canonical(out);
        out.push(b'/');
        self.1.write_canonical(out);
    }
}

impl<A: ResourceKey, B: ResourceKey, C: ResourceKey> ResourceKey for (A, B, C) {
    fn write_canonical(&self, out: &mut Vec<u8>) {
        self.0.write_canonical(out);
        out.push(b'/');
        self.1.write_canonical(out);
        out.push(b'/');
        self.2.write_canonical(out);
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

    #[test]
    fn cache_key_layout() {
        let layer = Uuid::from_bytes([7; 16]);
        let key = cache_key(&layer, &(-3i64, 12i64), 4);

        let mut expected = vec![7; 16];
        expected.extend_from_slice(b"/-3/12/4");
        assert_eq!(key, expected);
    }

    #[test]
    fn distinct_layers_give_distinct_keys() {
        let a = cache_key(&Uuid::new_v4(), &"chunk".to_string(), 0);
        let b = cache_key(&Uuid::new_v4(), &"chunk".to_string(), 0);
        assert_ne!(a, b);
    }
}

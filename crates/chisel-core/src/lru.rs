use crate::SmallKeyHashMap;

use slab::Slab;
use std::borrow::Borrow;
use std::hash::Hash;

/// A map that remembers the order in which its entries were last touched.
///
/// Entries live in a [`Slab`] and are threaded onto an intrusive doubly linked list, with the least recently used entry at
/// the front and the most recently used at the back. A hash index maps keys to slab slots, so inserting, touching, removing
/// and popping the least recently used entry are all O(1).
pub struct LruMap<K, V> {
    index: SmallKeyHashMap<K, usize>,
    nodes: Slab<Node<K, V>>,
    /// Least recently used.
    front: Option<usize>,
    /// Most recently used.
    back: Option<usize>,
}

struct Node<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

impl<K, V> Default for LruMap<K, V> {
    fn default() -> Self {
        Self {
            index: SmallKeyHashMap::default(),
            nodes: Slab::new(),
            front: None,
            back: None,
        }
    }
}

impl<K, V> LruMap<K, V>
where
    K: Clone + Eq + Hash,
{
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.index.contains_key(key)
    }

    /// Inserts `value` as the most recently used entry. Returns the previous value for `key`, if any.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        if let Some(&slot) = self.index.get(&key) {
            self.unlink(slot);
            self.link_back(slot);
            return Some(std::mem::replace(&mut self.nodes[slot].value, value));
        }

        let slot = self.nodes.insert(Node {
            key: key.clone(),
            value,
            prev: None,
            next: None,
        });
        self.link_back(slot);
        self.index.insert(key, slot);
        None
    }

    /// Returns the value for `key` and marks it as the most recently used entry.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let slot = *self.index.get(key)?;
        self.unlink(slot);
        self.link_back(slot);
        Some(&self.nodes[slot].value)
    }

    /// Returns the value for `key` without changing the recency order.
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let slot = *self.index.get(key)?;
        Some(&self.nodes[slot].value)
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let slot = self.index.remove(key)?;
        self.unlink(slot);
        Some(self.nodes.remove(slot).value)
    }

    /// Removes and returns the least recently used entry.
    pub fn pop_lru(&mut self) -> Option<(K, V)> {
        let slot = self.front?;
        self.unlink(slot);
        let node = self.nodes.remove(slot);
        self.index.remove(&node.key);
        Some((node.key, node.value))
    }

    /// Iterates from the least recently used entry to the most recently used.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        let mut cursor = self.front;
        std::iter::from_fn(move || {
            let node = &self.nodes[cursor?];
            cursor = node.next;
            Some((&node.key, &node.value))
        })
    }

    pub fn clear(&mut self) {
        self.index.clear();
        self.nodes.clear();
        self.front = None;
        self.back = None;
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = {
            let node = &mut self.nodes[slot];
            (node.prev.take(), node.next.take())
        };
        match prev {
            Some(prev) => self.nodes[prev].next = next,
            None => self.front = next,
        }
        match next {
            Some(next) => self.nodes[next].prev = prev,
            None => self.back = prev,
        }
    }

    fn link_back(&mut self, slot: usize) {
        self.nodes[slot].prev = self.back;
        self.nodes[slot].next = None;
        match self.back {
            Some(back) => self.nodes[back].next = Some(slot),
            None => self.front = Some(slot),
        }
        self.back = Some(slot);
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

    fn keys(map: &LruMap<&'static str, u32>) -> Vec<&'static str> {
        map.iter().map(|(k, _)| *k).collect()
    }

    #[test]
    fn get_moves_entry_to_back() {
        let mut map = LruMap::new();
        map.insert("a", 1);
        map.insert("b", 2);
        map.insert("c", 3);
        assert_eq!(keys(&map), ["a", "b", "c"]);

        assert_eq!(map.get("a"), Some(&1));
        assert_eq!(keys(&map), ["b", "c", "a"]);

        assert_eq!(map.peek("b"), Some(&2));
        assert_eq!(keys(&map), ["b", "c", "a"]);
    }

    #[test]
    fn reinsert_replaces_value_and_refreshes() {
        let mut map = LruMap::new();
        map.insert("a", 1);
        map.insert("b", 2);
        assert_eq!(map.insert("a", 10), Some(1));
        assert_eq!(keys(&map), ["b", "a"]);
        assert_eq!(map.peek("a"), Some(&10));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn pop_lru_drains_in_recency_order() {
        let mut map = LruMap::new();
        map.insert("a", 1);
        map.insert("b", 2);
        map.insert("c", 3);
        map.get("a");
        assert_eq!(map.remove("c"), Some(3));

        assert_eq!(map.pop_lru(), Some(("b", 2)));
        assert_eq!(map.pop_lru(), Some(("a", 1)));
        assert_eq!(map.pop_lru(), None);
        assert!(map.is_empty());
        assert!(!map.contains_key("a"));
    }

    #[test]
    fn borrowed_lookup_on_boxed_slice_keys() {
        let mut map: LruMap<Box<[u8]>, usize> = LruMap::new();
        map.insert(b"key".to_vec().into_boxed_slice(), 3);
        assert_eq!(map.get(&b"key"[..]), Some(&3));
        assert_eq!(map.remove(&b"key"[..]), Some(3));
    }
}

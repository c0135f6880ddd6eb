use slab::Slab;
use static_assertions::const_assert_eq;
use std::{
    mem,
    num::NonZeroU32,
    ops::{Index, IndexMut},
};

/// An opaque number that uniquely identifies the value stored in a given [`Allocator32`].
///
/// An `Option<AllocId32>` still only requires 32 bits.
pub type AllocId32 = NonZeroU32;

const_assert_eq!(
    mem::size_of::<Option<AllocId32>>(),
    mem::size_of::<AllocId32>()
);

/// Stores up to `u32::MAX` values of type `T`. Indexed by 32-bit [`AllocId32`].
///
/// IDs are stable for the lifetime of the value, but a removed value's ID may be handed out again by a later
/// [`insert`](Self::insert). Callers that hold on to IDs past removal need their own generation check.
pub struct Allocator32<T> {
    values: Slab<T>,
}

impl<T> Default for Allocator32<T> {
    fn default() -> Self {
        Self { values: Slab::new() }
    }
}

impl<T> Allocator32<T> {
    #[inline]
    pub fn get(&self, id: AllocId32) -> Option<&T> {
        self.values.get(Self::id_to_index(id))
    }

    #[inline]
    pub fn get_mut(&mut self, id: AllocId32) -> Option<&mut T> {
        self.values.get_mut(Self::id_to_index(id))
    }

    #[inline]
    pub fn contains(&self, id: AllocId32) -> bool {
        self.values.contains(Self::id_to_index(id))
    }

    #[inline]
    pub fn insert(&mut self, value: T) -> AllocId32 {
        let index = self.values.insert(value);
        Self::index_to_id(index)
    }

    /// Removes the value for `id`, if any.
    #[inline]
    pub fn remove(&mut self, id: AllocId32) -> Option<T> {
        self.values.try_remove(Self::id_to_index(id))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (AllocId32, &T)> {
        self.values
            .iter()
            .map(|(index, value)| (Self::index_to_id(index), value))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (AllocId32, &mut T)> {
        self.values
            .iter_mut()
            .map(|(index, value)| (Self::index_to_id(index), value))
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.values.iter_mut().map(|(_, value)| value)
    }

    const MAX_VALID_INDEX: usize = (u32::MAX - 1) as usize;

    const fn id_to_index(id: AllocId32) -> usize {
        // XOR is used to flip all of the bits of id so that u32::MAX is mapped to zero (a valid slab index).
        (id.get() ^ u32::MAX) as usize
    }

    fn index_to_id(index: usize) -> AllocId32 {
        assert!(index <= Self::MAX_VALID_INDEX);
        // Flipping the bits of an index below u32::MAX can never produce zero.
        match AllocId32::new((index as u32) ^ u32::MAX) {
            Some(id) => id,
            None => unreachable!("index {} out of range", index),
        }
    }
}

impl<C> Index<AllocId32> for Allocator32<C> {
    type Output = C;

    #[inline]
    fn index(&self, id: AllocId32) -> &Self::Output {
        self.values.index(Self::id_to_index(id))
    }
}

impl<C> IndexMut<AllocId32> for Allocator32<C> {
    #[inline]
    fn index_mut(&mut self, id: AllocId32) -> &mut Self::Output {
        self.values.index_mut(Self::id_to_index(id))
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

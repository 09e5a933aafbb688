//! Storage abstractions behind the pool and the container.
//!
//! The pool keeps idle instances in a [`FreeList`]; the container keeps its
//! entries in a [`MapStorage`]. Both are plain, unsynchronized collections:
//! the owning pool or container guards them with its own lock.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::hash::{BuildHasher, Hash};

/// Sequence used as a pool's free list
///
/// `push` and `pop` both work on the tail, so the list behaves as a stack
/// and the most recently returned item is reused first.
pub trait FreeList<T>: Default {
    fn push(&mut self, item: T);

    fn pop(&mut self) -> Option<T>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Release spare capacity held by the storage
    fn shrink_to_fit(&mut self);
}

impl<T> FreeList<T> for Vec<T> {
    fn push(&mut self, item: T) {
        Vec::push(self, item);
    }

    fn pop(&mut self) -> Option<T> {
        Vec::pop(self)
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn shrink_to_fit(&mut self) {
        Vec::shrink_to_fit(self);
    }
}

impl<T> FreeList<T> for VecDeque<T> {
    fn push(&mut self, item: T) {
        self.push_back(item);
    }

    fn pop(&mut self) -> Option<T> {
        self.pop_back()
    }

    fn len(&self) -> usize {
        VecDeque::len(self)
    }

    fn shrink_to_fit(&mut self) {
        VecDeque::shrink_to_fit(self);
    }
}

/// Associative storage used by a keyed container
///
/// Draining goes through `IntoIterator`, and `Default` must produce an
/// empty map that holds no allocation.
pub trait MapStorage<K, V>: Default + IntoIterator<Item = (K, V)> {
    /// Insert or overwrite, handing back the previous value
    fn insert(&mut self, key: K, value: V) -> Option<V>;

    fn get(&self, key: &K) -> Option<&V>;

    fn get_mut(&mut self, key: &K) -> Option<&mut V>;

    fn remove(&mut self, key: &K) -> Option<V>;

    fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn iter<'a>(&'a self) -> impl Iterator<Item = (&'a K, &'a V)>
    where
        K: 'a,
        V: 'a;

    fn shrink_to_fit(&mut self);
}

impl<K, V, H> MapStorage<K, V> for HashMap<K, V, H>
where
    K: Eq + Hash,
    H: BuildHasher + Default,
{
    fn insert(&mut self, key: K, value: V) -> Option<V> {
        HashMap::insert(self, key, value)
    }

    fn get(&self, key: &K) -> Option<&V> {
        HashMap::get(self, key)
    }

    fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        HashMap::get_mut(self, key)
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        HashMap::remove(self, key)
    }

    fn contains_key(&self, key: &K) -> bool {
        HashMap::contains_key(self, key)
    }

    fn len(&self) -> usize {
        HashMap::len(self)
    }

    fn iter<'a>(&'a self) -> impl Iterator<Item = (&'a K, &'a V)>
    where
        K: 'a,
        V: 'a,
    {
        HashMap::iter(self)
    }

    fn shrink_to_fit(&mut self) {
        HashMap::shrink_to_fit(self);
    }
}

impl<K: Ord, V> MapStorage<K, V> for BTreeMap<K, V> {
    fn insert(&mut self, key: K, value: V) -> Option<V> {
        BTreeMap::insert(self, key, value)
    }

    fn get(&self, key: &K) -> Option<&V> {
        BTreeMap::get(self, key)
    }

    fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        BTreeMap::get_mut(self, key)
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        BTreeMap::remove(self, key)
    }

    fn contains_key(&self, key: &K) -> bool {
        BTreeMap::contains_key(self, key)
    }

    fn len(&self) -> usize {
        BTreeMap::len(self)
    }

    fn iter<'a>(&'a self) -> impl Iterator<Item = (&'a K, &'a V)>
    where
        K: 'a,
        V: 'a,
    {
        BTreeMap::iter(self)
    }

    // Nodes are freed as entries go; nothing to give back.
    fn shrink_to_fit(&mut self) {}
}

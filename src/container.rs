//! Keyed container of exclusively-owned values guarded by a single lock
//!
//! Every value lives in a `Box` owned by the container. Ownership leaves the
//! container explicitly: `insert` hands back the value it replaces, `remove`
//! and `drain` hand back what they take out. Only `clear` and `Drop` destroy
//! values, and each value is destroyed exactly once.

use crate::lock::DefaultLock;
use crate::storage::MapStorage;

use parking_lot::lock_api::{MappedMutexGuard, Mutex, MutexGuard, RawMutex};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use tracing::{debug, trace};

/// Borrowed view of a value returned by [`KeyedContainer::find`]
///
/// The container lock stays held for as long as the view is alive, so the
/// value cannot be removed or destroyed underneath it. Calling back into the
/// same container while holding a `ValueRef` deadlocks with non-reentrant
/// locks.
pub type ValueRef<'a, R, V> = MappedMutexGuard<'a, R, V>;

/// Thread-safe map from `K` to boxed values of `V`
///
/// # Examples
///
/// ```
/// use locked_queue::KeyedContainer;
///
/// let sessions: KeyedContainer<u64, String> = KeyedContainer::new();
///
/// assert!(sessions.insert(7, "alice".to_string()).is_none());
/// assert_eq!(sessions.find(&7).as_deref().map(String::as_str), Some("alice"));
///
/// // Overwriting hands the previous value back.
/// let previous = sessions.insert(7, "bob".to_string());
/// assert_eq!(previous.as_deref().map(String::as_str), Some("alice"));
///
/// let removed = sessions.remove(&7);
/// assert_eq!(removed.as_deref().map(String::as_str), Some("bob"));
/// assert!(sessions.find(&7).is_none());
/// ```
pub struct KeyedContainer<K, V, R = DefaultLock, S = HashMap<K, Box<V>>>
where
    R: RawMutex,
    S: MapStorage<K, Box<V>>,
{
    entries: Mutex<R, S>,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V, R, S> KeyedContainer<K, V, R, S>
where
    R: RawMutex,
    S: MapStorage<K, Box<V>>,
{
    /// Create an empty container
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(S::default()),
            _marker: PhantomData,
        }
    }

    /// Store `value` under `key`, returning the value it replaces
    pub fn insert(&self, key: K, value: impl Into<Box<V>>) -> Option<Box<V>> {
        let previous = self.entries.lock().insert(key, value.into());
        if previous.is_some() {
            trace!("Replaced existing container entry");
        }
        previous
    }

    /// Remove the entry for `key` and hand its value to the caller
    pub fn remove(&self, key: &K) -> Option<Box<V>> {
        self.entries.lock().remove(key)
    }

    /// Look up `key`, keeping the container locked while the result is held
    pub fn find(&self, key: &K) -> Option<ValueRef<'_, R, V>> {
        MutexGuard::try_map(self.entries.lock(), |entries| {
            entries.get_mut(key).map(|value| &mut **value)
        })
        .ok()
    }

    /// Run `f` on the value for `key` and release the lock afterwards
    pub fn with<U>(&self, key: &K, f: impl FnOnce(&V) -> U) -> Option<U> {
        self.entries.lock().get(key).map(Box::as_ref).map(f)
    }

    /// Check whether `key` is present
    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Get entry count
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check whether the container holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Visit every entry while holding the lock
    pub fn for_each(&self, mut f: impl FnMut(&K, &V)) {
        let entries = self.entries.lock();
        for (key, value) in entries.iter() {
            f(key, value.as_ref());
        }
    }

    /// Take every entry out of the container, handing ownership to the caller
    pub fn drain(&self) -> Vec<(K, Box<V>)> {
        let taken = std::mem::take(&mut *self.entries.lock());
        let drained: Vec<_> = taken.into_iter().collect();
        debug!(drained = drained.len(), "Drained KeyedContainer");
        drained
    }

    /// Destroy every value, returning how many were destroyed
    ///
    /// The storage is swapped for a fresh, empty one under the lock; the
    /// values themselves are dropped after the lock is released.
    pub fn clear(&self) -> usize {
        let taken = std::mem::take(&mut *self.entries.lock());
        let destroyed = taken.len();
        drop(taken);
        if destroyed > 0 {
            debug!(destroyed, "Cleared KeyedContainer");
        }
        destroyed
    }

    /// Release spare capacity held by the storage
    pub fn shrink_to_fit(&self) {
        self.entries.lock().shrink_to_fit();
    }
}

impl<K, V, R, S> KeyedContainer<K, V, R, S>
where
    K: Clone,
    R: RawMutex,
    S: MapStorage<K, Box<V>>,
{
    /// Copy of the keys present at the moment of the call
    pub fn keys(&self) -> Vec<K> {
        self.entries.lock().iter().map(|(key, _)| key.clone()).collect()
    }
}

impl<K, V, R, S> KeyedContainer<K, V, R, S>
where
    V: Clone,
    R: RawMutex,
    S: MapStorage<K, Box<V>>,
{
    /// Copy of the value for `key`
    pub fn get_cloned(&self, key: &K) -> Option<V> {
        self.with(key, V::clone)
    }
}

impl<K, V, R, S> KeyedContainer<K, V, R, S>
where
    K: Clone,
    V: Clone,
    R: RawMutex,
    S: MapStorage<K, Box<V>>,
{
    /// Copy of every entry, taken under the lock
    ///
    /// # Examples
    ///
    /// ```
    /// use locked_queue::{DefaultLock, KeyedContainer};
    /// use std::collections::BTreeMap;
    ///
    /// let ports: KeyedContainer<&str, u16, DefaultLock, BTreeMap<&str, Box<u16>>> =
    ///     KeyedContainer::new();
    /// ports.insert("https", 443u16);
    /// ports.insert("http", 80u16);
    ///
    /// assert_eq!(ports.snapshot(), vec![("http", 80), ("https", 443)]);
    /// ```
    pub fn snapshot(&self) -> Vec<(K, V)> {
        self.entries
            .lock()
            .iter()
            .map(|(key, value)| (key.clone(), V::clone(value)))
            .collect()
    }
}

impl<K, V, R, S> Default for KeyedContainer<K, V, R, S>
where
    R: RawMutex,
    S: MapStorage<K, Box<V>>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, R, S> fmt::Debug for KeyedContainer<K, V, R, S>
where
    R: RawMutex,
    S: MapStorage<K, Box<V>>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("KeyedContainer");
        match self.entries.try_lock() {
            Some(entries) => d.field("len", &entries.len()),
            None => d.field("len", &format_args!("<locked>")),
        };
        d.finish()
    }
}

impl<K, V, R, S> Drop for KeyedContainer<K, V, R, S>
where
    R: RawMutex,
    S: MapStorage<K, Box<V>>,
{
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::SpinLock;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    struct Session {
        id: u32,
        drops: Arc<AtomicUsize>,
    }

    impl Session {
        fn new(id: u32, drops: &Arc<AtomicUsize>) -> Self {
            Self {
                id,
                drops: Arc::clone(drops),
            }
        }
    }

    impl Drop for Session {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_insert_then_find() {
        let drops = Arc::new(AtomicUsize::new(0));
        let container: KeyedContainer<u32, Session> = KeyedContainer::new();

        container.insert(1, Session::new(10, &drops));
        assert_eq!(container.find(&1).map(|s| s.id), Some(10));
        assert!(container.find(&2).is_none());
        assert_eq!(container.with(&1, |s| s.id * 2), Some(20));
    }

    #[test]
    fn test_remove_returns_ownership() {
        let drops = Arc::new(AtomicUsize::new(0));
        let container: KeyedContainer<u32, Session> = KeyedContainer::new();
        container.insert(1, Session::new(10, &drops));

        let removed = container.remove(&1).unwrap();
        assert!(container.find(&1).is_none());
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        drop(removed);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert!(container.remove(&1).is_none());
    }

    #[test]
    fn test_overwrite_returns_previous_value() {
        let drops = Arc::new(AtomicUsize::new(0));
        let container: KeyedContainer<u32, Session> = KeyedContainer::new();

        assert!(container.insert(1, Session::new(1, &drops)).is_none());
        let previous = container.insert(1, Session::new(2, &drops));

        assert_eq!(previous.as_ref().map(|s| s.id), Some(1));
        assert_eq!(container.find(&1).map(|s| s.id), Some(2));
        assert_eq!(container.len(), 1);

        // Ignoring the returned value drops it instead of leaking it.
        drop(previous);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clear_destroys_each_value_once() {
        let drops = Arc::new(AtomicUsize::new(0));
        let container: KeyedContainer<u32, Session> = KeyedContainer::new();
        for id in 0..5 {
            container.insert(id, Session::new(id, &drops));
        }

        assert_eq!(container.clear(), 5);
        assert_eq!(drops.load(Ordering::SeqCst), 5);
        assert!(container.is_empty());

        assert_eq!(container.clear(), 0);
        drop(container);
        assert_eq!(drops.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_drop_destroys_remaining_values() {
        let drops = Arc::new(AtomicUsize::new(0));
        {
            let container: KeyedContainer<u32, Session> = KeyedContainer::new();
            container.insert(1, Session::new(1, &drops));
            container.insert(2, Session::new(2, &drops));
            drop(container.remove(&1));
        }
        assert_eq!(drops.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_drain_hands_values_back() {
        let drops = Arc::new(AtomicUsize::new(0));
        let container: KeyedContainer<u32, Session> = KeyedContainer::new();
        container.insert(1, Session::new(1, &drops));
        container.insert(2, Session::new(2, &drops));

        let mut drained = container.drain();
        drained.sort_by_key(|(key, _)| *key);
        assert!(container.is_empty());
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        assert_eq!(drained[1].1.id, 2);

        drop(drained);
        assert_eq!(drops.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_snapshot_and_keys() {
        let container: KeyedContainer<String, u32> = KeyedContainer::new();
        container.insert("a".to_string(), 1u32);
        container.insert("b".to_string(), Box::new(2u32));

        let mut snapshot = container.snapshot();
        snapshot.sort();
        assert_eq!(snapshot, vec![("a".to_string(), 1), ("b".to_string(), 2)]);

        let mut keys = container.keys();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);

        let mut total = 0;
        container.for_each(|_, value| total += value);
        assert_eq!(total, 3);
        assert_eq!(container.get_cloned(&"b".to_string()), Some(2));
    }

    #[test]
    fn test_find_blocks_removal_until_released() {
        let container: KeyedContainer<u32, String> = KeyedContainer::new();
        container.insert(1, "held".to_string());

        thread::scope(|s| {
            let guard = container.find(&1).unwrap();
            let remover = s.spawn(|| container.remove(&1));

            thread::sleep(Duration::from_millis(20));
            assert_eq!(guard.as_str(), "held");
            drop(guard);

            assert_eq!(remover.join().unwrap().as_deref().map(String::as_str), Some("held"));
        });

        assert!(container.is_empty());
    }

    #[test]
    fn test_debug_does_not_block_while_value_is_borrowed() {
        let container: KeyedContainer<u32, String> = KeyedContainer::new();
        container.insert(1, "held".to_string());
        assert_eq!(format!("{:?}", container), "KeyedContainer { len: 1 }");

        let guard = container.find(&1).unwrap();
        let rendered = format!("{:?} {}", container, *guard);
        assert_eq!(rendered, "KeyedContainer { len: <locked> } held");
    }

    #[test]
    fn test_find_allows_in_place_mutation() {
        let container: KeyedContainer<u32, Vec<u8>> = KeyedContainer::new();
        container.insert(1, Vec::new());

        if let Some(mut buf) = container.find(&1) {
            buf.push(42);
        }
        assert_eq!(container.get_cloned(&1), Some(vec![42]));
    }

    #[test]
    fn test_spin_lock_with_btree_storage() {
        let container: KeyedContainer<u32, &str, SpinLock, BTreeMap<u32, Box<&str>>> =
            KeyedContainer::new();
        container.insert(2, "two");
        container.insert(1, "one");

        assert_eq!(container.keys(), vec![1, 2]);
        assert!(container.contains_key(&2));
        container.shrink_to_fit();
        assert_eq!(container.snapshot(), vec![(1, "one"), (2, "two")]);
    }
}

//! Recycling object pool guarded by a single lock

use crate::config::PoolConfiguration;
use crate::errors::{PoolError, PoolResult};
use crate::lock::DefaultLock;
use crate::metrics::{MetricsExporter, MetricsTracker, PoolMetrics};
use crate::poolable::{KeyedPoolable, Poolable};
use crate::storage::FreeList;

use parking_lot::lock_api::{Mutex, RawMutex};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, trace};

/// What happened to an object handed back through [`ObjectPool::deallocate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Disposition {
    /// The object was pushed onto the free list
    Pooled,

    /// The pool was full and the object was dropped
    Destroyed,
}

/// A pooled object that automatically returns to the pool when dropped
pub struct PooledObject<'a, T, R = DefaultLock, S = Vec<Box<T>>>
where
    T: Poolable,
    R: RawMutex,
    S: FreeList<Box<T>>,
{
    value: Option<Box<T>>,
    pool: &'a ObjectPool<T, R, S>,
}

impl<T, R, S> PooledObject<'_, T, R, S>
where
    T: Poolable,
    R: RawMutex,
    S: FreeList<Box<T>>,
{
    /// Take the object out of the guard without returning it to the pool
    pub fn into_inner(mut self) -> Box<T> {
        self.value.take().expect("Value already taken")
    }
}

impl<T, R, S> Deref for PooledObject<'_, T, R, S>
where
    T: Poolable,
    R: RawMutex,
    S: FreeList<Box<T>>,
{
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.value.as_deref().expect("Value already taken")
    }
}

impl<T, R, S> DerefMut for PooledObject<'_, T, R, S>
where
    T: Poolable,
    R: RawMutex,
    S: FreeList<Box<T>>,
{
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.value.as_deref_mut().expect("Value already taken")
    }
}

impl<T, R, S> Drop for PooledObject<'_, T, R, S>
where
    T: Poolable,
    R: RawMutex,
    S: FreeList<Box<T>>,
{
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            self.pool.deallocate(value);
        }
    }
}

/// Thread-safe pool that recycles boxed instances of `T`
///
/// Idle instances live on a LIFO free list protected by one lock of type `R`.
/// The lock is only held to push or pop; building a new instance when the
/// list is empty and dropping an instance when the list is full both happen
/// outside it. The idle bound is checked before each push, so under
/// concurrent returns it is best-effort rather than exact.
///
/// # Examples
///
/// ```
/// use locked_queue::{Disposition, ObjectPool, Poolable};
///
/// #[derive(Default)]
/// struct Packet {
///     payload: Vec<u8>,
/// }
///
/// impl Poolable for Packet {
///     const MAX_POOL_SIZE: usize = 2;
///
///     fn reset(&mut self) {
///         self.payload.clear();
///     }
/// }
///
/// let pool: ObjectPool<Packet> = ObjectPool::new();
///
/// let mut packet = pool.allocate();
/// packet.payload.extend_from_slice(b"hello");
/// assert_eq!(pool.deallocate(packet), Disposition::Pooled);
/// assert_eq!(pool.free_size(), 1);
///
/// // Returned objects come back clean.
/// let packet = pool.allocate();
/// assert!(packet.payload.is_empty());
/// ```
pub struct ObjectPool<T, R = DefaultLock, S = Vec<Box<T>>>
where
    T: Poolable,
    R: RawMutex,
    S: FreeList<Box<T>>,
{
    free_list: Mutex<R, S>,
    // Mirrors free_list.len(); written with the lock held, read without it.
    idle: AtomicUsize,
    capacity: usize,
    reset_on_return: bool,
    metrics: MetricsTracker,
    _marker: PhantomData<fn() -> T>,
}

impl<T, R, S> ObjectPool<T, R, S>
where
    T: Poolable,
    R: RawMutex,
    S: FreeList<Box<T>>,
{
    /// Create an empty pool bounded by `T::MAX_POOL_SIZE`
    pub fn new() -> Self {
        Self::from_parts(T::MAX_POOL_SIZE, true)
    }

    fn from_parts(capacity: usize, reset_on_return: bool) -> Self {
        debug!(capacity, reset_on_return, "Creating ObjectPool");
        Self {
            free_list: Mutex::new(S::default()),
            idle: AtomicUsize::new(0),
            capacity,
            reset_on_return,
            metrics: MetricsTracker::new(),
            _marker: PhantomData,
        }
    }

    /// Maximum number of idle objects the pool keeps
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of idle objects at the moment of the call
    pub fn free_size(&self) -> usize {
        self.free_list.lock().len()
    }

    /// Hand an object back to the pool
    ///
    /// If the pool already holds `capacity` idle objects the object is
    /// dropped on the spot and [`Disposition::Destroyed`] is returned.
    /// Otherwise it is reset (unless disabled in the configuration) and
    /// pushed onto the free list.
    pub fn deallocate(&self, mut obj: Box<T>) -> Disposition {
        if self.idle.load(Ordering::Acquire) >= self.capacity {
            MetricsTracker::record(&self.metrics.discarded, 1);
            trace!(capacity = self.capacity, "Pool full, destroying returned object");
            drop(obj);
            return Disposition::Destroyed;
        }

        if self.reset_on_return {
            obj.reset();
        }

        {
            let mut list = self.free_list.lock();
            list.push(obj);
            self.idle.store(list.len(), Ordering::Release);
        }

        MetricsTracker::record(&self.metrics.pooled, 1);
        Disposition::Pooled
    }

    /// Reset and destroy every idle object, returning how many were destroyed
    ///
    /// The free list storage is replaced by a fresh, unallocated one, so the
    /// next allocation always constructs a new object.
    pub fn clear(&self) -> usize {
        let idle = {
            let mut list = self.free_list.lock();
            self.idle.store(0, Ordering::Release);
            std::mem::take(&mut *list)
        };

        let destroyed = Self::destroy_all(idle);
        if destroyed > 0 {
            MetricsTracker::record(&self.metrics.destroyed_idle, destroyed);
            debug!(destroyed, "Cleared ObjectPool");
        }
        destroyed
    }

    /// Destroy idle objects beyond `keep` and release spare storage
    pub fn trim(&self, keep: usize) -> usize {
        let mut excess = S::default();
        {
            let mut list = self.free_list.lock();
            while list.len() > keep {
                match list.pop() {
                    Some(obj) => excess.push(obj),
                    None => break,
                }
            }
            list.shrink_to_fit();
            self.idle.store(list.len(), Ordering::Release);
        }

        let destroyed = Self::destroy_all(excess);
        MetricsTracker::record(&self.metrics.destroyed_idle, destroyed);
        debug!(keep, destroyed, "Trimmed ObjectPool");
        destroyed
    }

    /// Get pool metrics
    pub fn metrics(&self) -> PoolMetrics {
        self.metrics
            .get_metrics(self.idle.load(Ordering::Acquire), self.capacity)
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.metrics().export()
    }

    /// Export metrics in Prometheus format
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        MetricsExporter::export_prometheus(&self.metrics(), pool_name, tags)
    }

    /// Create a pool from a configuration
    ///
    /// Applies the capacity override and the reset policy. A warm-up size
    /// needs a way to build objects, so it is rejected here; use
    /// [`ObjectPool::with_factory`] instead.
    ///
    /// # Examples
    ///
    /// ```
    /// use locked_queue::{KeyedPoolable, ObjectPool, PoolConfiguration, PoolError, Poolable};
    ///
    /// struct Channel {
    ///     id: u32,
    /// }
    ///
    /// impl Poolable for Channel {
    ///     const MAX_POOL_SIZE: usize = 64;
    ///     fn reset(&mut self) {}
    /// }
    ///
    /// impl KeyedPoolable for Channel {
    ///     type Key = u32;
    ///     fn from_key(id: u32) -> Self { Self { id } }
    ///     fn assign_key(&mut self, id: u32) { self.id = id; }
    /// }
    ///
    /// let config = PoolConfiguration::new().with_max_pool_size(4);
    /// let pool: ObjectPool<Channel> = ObjectPool::with_config(config).unwrap();
    /// assert_eq!(pool.capacity(), 4);
    /// assert_eq!(pool.allocate_keyed(9).id, 9);
    ///
    /// let warmed = PoolConfiguration::new().with_warmup(2);
    /// let result: Result<ObjectPool<Channel>, _> = ObjectPool::with_config(warmed);
    /// assert_eq!(result.err(), Some(PoolError::WarmupRequiresFactory { requested: 2 }));
    /// ```
    pub fn with_config(config: PoolConfiguration) -> PoolResult<Self> {
        if let Some(requested) = config.warmup_size {
            return Err(PoolError::WarmupRequiresFactory { requested });
        }
        Ok(Self::from_parts(config.capacity_for::<T>(), config.reset_on_return))
    }

    /// Create a pool from a configuration, warming it up with `make`
    ///
    /// # Examples
    ///
    /// ```
    /// use locked_queue::{ObjectPool, PoolConfiguration, PoolError, Poolable};
    ///
    /// #[derive(Default)]
    /// struct Row(Vec<String>);
    ///
    /// impl Poolable for Row {
    ///     const MAX_POOL_SIZE: usize = 64;
    ///     fn reset(&mut self) { self.0.clear(); }
    /// }
    ///
    /// let config = PoolConfiguration::new().with_max_pool_size(4).with_warmup(3);
    /// let pool: ObjectPool<Row> = ObjectPool::with_factory(config, Row::default).unwrap();
    /// assert_eq!(pool.capacity(), 4);
    /// assert_eq!(pool.free_size(), 3);
    ///
    /// let too_big = PoolConfiguration::new().with_max_pool_size(2).with_warmup(5);
    /// let result: Result<ObjectPool<Row>, _> = ObjectPool::with_factory(too_big, Row::default);
    /// assert_eq!(result.err(), Some(PoolError::WarmupExceedsCapacity { requested: 5, capacity: 2 }));
    /// ```
    pub fn with_factory(config: PoolConfiguration, make: impl FnMut() -> T) -> PoolResult<Self> {
        let pool = Self::from_parts(config.capacity_for::<T>(), config.reset_on_return);
        if let Some(count) = config.warmup_size {
            pool.warmup_with(count, make)?;
        }
        Ok(pool)
    }

    /// Pre-construct `count` objects with `make` and place them on the free list
    ///
    /// Returns how many were actually pooled; concurrent returns can fill
    /// the pool first, in which case the surplus is dropped.
    pub fn warmup_with(&self, count: usize, mut make: impl FnMut() -> T) -> PoolResult<usize> {
        if count > self.capacity {
            return Err(PoolError::WarmupExceedsCapacity {
                requested: count,
                capacity: self.capacity,
            });
        }

        let mut fresh: Vec<Box<T>> = (0..count).map(|_| Box::new(make())).collect();
        MetricsTracker::record(&self.metrics.constructed, count);

        let surplus = {
            let mut list = self.free_list.lock();
            let room = self.capacity.saturating_sub(list.len()).min(fresh.len());
            let surplus = fresh.split_off(room);
            for obj in fresh {
                list.push(obj);
            }
            self.idle.store(list.len(), Ordering::Release);
            surplus
        };

        let pooled = count - surplus.len();
        MetricsTracker::record(&self.metrics.pooled, pooled);
        MetricsTracker::record(&self.metrics.discarded, surplus.len());
        debug!(requested = count, pooled, "Warmed up ObjectPool");
        Ok(pooled)
    }

    fn recycle(&self) -> Option<Box<T>> {
        // Empty free list: skip the lock and let the caller construct.
        if self.idle.load(Ordering::Acquire) == 0 {
            return None;
        }

        let obj = {
            let mut list = self.free_list.lock();
            let obj = list.pop();
            self.idle.store(list.len(), Ordering::Release);
            obj
        }?;

        MetricsTracker::record(&self.metrics.recycled, 1);
        trace!("Recycled pooled object");
        Some(obj)
    }

    fn construct(&self, make: impl FnOnce() -> T) -> Box<T> {
        MetricsTracker::record(&self.metrics.constructed, 1);
        trace!("Free list empty, constructing object");
        Box::new(make())
    }

    fn destroy_all(mut list: S) -> usize {
        let mut destroyed = 0;
        while let Some(mut obj) = list.pop() {
            obj.reset();
            drop(obj);
            destroyed += 1;
        }
        destroyed
    }
}

impl<T, R, S> ObjectPool<T, R, S>
where
    T: Poolable + Default,
    R: RawMutex,
    S: FreeList<Box<T>>,
{
    /// Take an object from the free list, or construct one if it is empty
    pub fn allocate(&self) -> Box<T> {
        match self.recycle() {
            Some(obj) => obj,
            None => self.construct(T::default),
        }
    }

    /// Allocate an object that returns itself to the pool when dropped
    pub fn get(&self) -> PooledObject<'_, T, R, S> {
        PooledObject {
            value: Some(self.allocate()),
            pool: self,
        }
    }

    /// Pre-construct `count` default objects and place them on the free list
    pub fn warmup(&self, count: usize) -> PoolResult<usize> {
        self.warmup_with(count, T::default)
    }
}

impl<T, R, S> ObjectPool<T, R, S>
where
    T: KeyedPoolable,
    R: RawMutex,
    S: FreeList<Box<T>>,
{
    /// Allocate an object bound to `key`
    ///
    /// Fresh objects are built with [`KeyedPoolable::from_key`]; recycled
    /// ones are re-bound with [`KeyedPoolable::assign_key`].
    pub fn allocate_keyed(&self, key: T::Key) -> Box<T> {
        match self.recycle() {
            Some(mut obj) => {
                obj.assign_key(key);
                obj
            }
            None => self.construct(|| T::from_key(key)),
        }
    }
}

impl<T, R, S> Default for ObjectPool<T, R, S>
where
    T: Poolable,
    R: RawMutex,
    S: FreeList<Box<T>>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, R, S> fmt::Debug for ObjectPool<T, R, S>
where
    T: Poolable,
    R: RawMutex,
    S: FreeList<Box<T>>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectPool")
            .field("idle", &self.idle.load(Ordering::Relaxed))
            .field("capacity", &self.capacity)
            .field("reset_on_return", &self.reset_on_return)
            .finish()
    }
}

impl<T, R, S> Drop for ObjectPool<T, R, S>
where
    T: Poolable,
    R: RawMutex,
    S: FreeList<Box<T>>,
{
    fn drop(&mut self) {
        self.clear();
    }
}

//! Capabilities a type must provide to be recycled by an [`ObjectPool`].
//!
//! [`ObjectPool`]: crate::ObjectPool

/// A type whose instances can be recycled through an object pool.
///
/// # Examples
///
/// ```
/// use locked_queue::Poolable;
///
/// #[derive(Default)]
/// struct Buffer {
///     bytes: Vec<u8>,
/// }
///
/// impl Poolable for Buffer {
///     const MAX_POOL_SIZE: usize = 32;
///
///     fn reset(&mut self) {
///         self.bytes.clear();
///     }
/// }
/// ```
pub trait Poolable {
    /// Default upper bound on the number of idle instances a pool retains
    const MAX_POOL_SIZE: usize;

    /// Return the instance to a clean, reusable state
    fn reset(&mut self);
}

/// A pooled type that is constructed from a key rather than by default.
pub trait KeyedPoolable: Poolable {
    type Key;

    /// Build a fresh instance for `key`
    fn from_key(key: Self::Key) -> Self;

    /// Re-bind a recycled instance to `key` before it is handed out again
    fn assign_key(&mut self, key: Self::Key);
}

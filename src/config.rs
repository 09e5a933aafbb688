//! Pool configuration options

use crate::poolable::Poolable;

/// Configuration for object pool behavior
///
/// # Examples
///
/// ```
/// use locked_queue::PoolConfiguration;
///
/// let config = PoolConfiguration::new()
///     .with_max_pool_size(16)
///     .with_warmup(4)
///     .with_reset_on_return(false);
///
/// assert_eq!(config.max_pool_size, Some(16));
/// assert_eq!(config.warmup_size, Some(4));
/// assert!(!config.reset_on_return);
/// ```
#[derive(Debug, Clone)]
pub struct PoolConfiguration {
    /// Maximum number of idle objects kept by the pool.
    /// `None` uses the pooled type's `MAX_POOL_SIZE`.
    pub max_pool_size: Option<usize>,

    /// Number of objects to pre-construct when the pool is created
    pub warmup_size: Option<usize>,

    /// Whether objects are reset when they are returned to the pool
    pub reset_on_return: bool,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            max_pool_size: None,
            warmup_size: None,
            reset_on_return: true,
        }
    }
}

impl PoolConfiguration {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the maximum number of idle objects
    pub fn with_max_pool_size(mut self, size: usize) -> Self {
        self.max_pool_size = Some(size);
        self
    }

    /// Set warm-up size
    pub fn with_warmup(mut self, size: usize) -> Self {
        self.warmup_size = Some(size);
        self
    }

    /// Choose whether returned objects are reset before pooling
    pub fn with_reset_on_return(mut self, reset: bool) -> Self {
        self.reset_on_return = reset;
        self
    }

    /// Effective idle capacity for a pool of `T`
    pub fn capacity_for<T: Poolable>(&self) -> usize {
        self.max_pool_size.unwrap_or(T::MAX_POOL_SIZE)
    }
}

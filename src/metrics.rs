//! Metrics collection and export for object pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Metrics data for a pool
///
/// # Examples
///
/// ```
/// use locked_queue::{ObjectPool, Poolable};
///
/// #[derive(Default)]
/// struct Scratch(Vec<u8>);
///
/// impl Poolable for Scratch {
///     const MAX_POOL_SIZE: usize = 4;
///     fn reset(&mut self) { self.0.clear(); }
/// }
///
/// let pool: ObjectPool<Scratch> = ObjectPool::new();
/// let obj = pool.allocate();
/// pool.deallocate(obj);
/// let _again = pool.allocate();
///
/// let metrics = pool.metrics();
/// assert_eq!(metrics.constructed, 1);
/// assert_eq!(metrics.recycled, 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PoolMetrics {
    /// Objects built because the free list was empty
    pub constructed: usize,

    /// Allocations served from the free list
    pub recycled: usize,

    /// Objects accepted back into the free list
    pub pooled: usize,

    /// Objects destroyed on return because the pool was full
    pub discarded: usize,

    /// Idle objects destroyed by `clear` or `trim`
    pub destroyed_idle: usize,

    /// Current idle objects
    pub idle_objects: usize,

    /// Maximum idle capacity
    pub max_capacity: usize,

    /// Share of allocations served by recycling (0.0 to 1.0)
    pub reuse_ratio: f64,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("constructed".to_string(), self.constructed.to_string());
        metrics.insert("recycled".to_string(), self.recycled.to_string());
        metrics.insert("pooled".to_string(), self.pooled.to_string());
        metrics.insert("discarded".to_string(), self.discarded.to_string());
        metrics.insert("destroyed_idle".to_string(), self.destroyed_idle.to_string());
        metrics.insert("idle_objects".to_string(), self.idle_objects.to_string());
        metrics.insert("max_capacity".to_string(), self.max_capacity.to_string());
        metrics.insert("reuse_ratio".to_string(), format!("{:.2}", self.reuse_ratio));
        metrics
    }
}

/// Metrics exporter for Prometheus format
pub struct MetricsExporter;

impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use locked_queue::{MetricsExporter, ObjectPool, Poolable};
    /// use std::collections::HashMap;
    ///
    /// #[derive(Default)]
    /// struct Conn;
    ///
    /// impl Poolable for Conn {
    ///     const MAX_POOL_SIZE: usize = 8;
    ///     fn reset(&mut self) {}
    /// }
    ///
    /// let pool: ObjectPool<Conn> = ObjectPool::new();
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let output = MetricsExporter::export_prometheus(&pool.metrics(), "conns", Some(&tags));
    /// assert!(output.contains("lockedqueue_objects_idle"));
    /// assert!(output.contains("service=\"api\""));
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        let mut output = String::new();
        let labels = Self::format_labels(pool_name, tags);

        // Gauge metrics
        output.push_str("# HELP lockedqueue_objects_idle Current idle objects\n");
        output.push_str("# TYPE lockedqueue_objects_idle gauge\n");
        output.push_str(&format!("lockedqueue_objects_idle{{{}}} {}\n", labels, metrics.idle_objects));

        output.push_str("# HELP lockedqueue_capacity Maximum idle objects\n");
        output.push_str("# TYPE lockedqueue_capacity gauge\n");
        output.push_str(&format!("lockedqueue_capacity{{{}}} {}\n", labels, metrics.max_capacity));

        output.push_str("# HELP lockedqueue_reuse_ratio Share of allocations served from the free list\n");
        output.push_str("# TYPE lockedqueue_reuse_ratio gauge\n");
        output.push_str(&format!("lockedqueue_reuse_ratio{{{}}} {:.2}\n", labels, metrics.reuse_ratio));

        // Counter metrics
        output.push_str("# HELP lockedqueue_objects_constructed_total Objects constructed\n");
        output.push_str("# TYPE lockedqueue_objects_constructed_total counter\n");
        output.push_str(&format!("lockedqueue_objects_constructed_total{{{}}} {}\n", labels, metrics.constructed));

        output.push_str("# HELP lockedqueue_objects_recycled_total Allocations served from the free list\n");
        output.push_str("# TYPE lockedqueue_objects_recycled_total counter\n");
        output.push_str(&format!("lockedqueue_objects_recycled_total{{{}}} {}\n", labels, metrics.recycled));

        output.push_str("# HELP lockedqueue_objects_pooled_total Objects returned to the free list\n");
        output.push_str("# TYPE lockedqueue_objects_pooled_total counter\n");
        output.push_str(&format!("lockedqueue_objects_pooled_total{{{}}} {}\n", labels, metrics.pooled));

        output.push_str("# HELP lockedqueue_objects_discarded_total Objects destroyed because the pool was full\n");
        output.push_str("# TYPE lockedqueue_objects_discarded_total counter\n");
        output.push_str(&format!("lockedqueue_objects_discarded_total{{{}}} {}\n", labels, metrics.discarded));

        output.push_str("# HELP lockedqueue_objects_destroyed_idle_total Idle objects destroyed by clear or trim\n");
        output.push_str("# TYPE lockedqueue_objects_destroyed_idle_total counter\n");
        output.push_str(&format!("lockedqueue_objects_destroyed_idle_total{{{}}} {}\n", labels, metrics.destroyed_idle));

        output
    }

    fn format_labels(pool_name: &str, tags: Option<&HashMap<String, String>>) -> String {
        let mut labels = vec![format!("pool=\"{}\"", pool_name)];

        if let Some(tags) = tags {
            let mut sorted: Vec<_> = tags.iter().collect();
            sorted.sort();
            for (key, value) in sorted {
                labels.push(format!("{}=\"{}\"", key, value));
            }
        }

        labels.join(",")
    }
}

/// Internal metrics tracker
#[derive(Debug, Default)]
pub(crate) struct MetricsTracker {
    pub constructed: AtomicUsize,
    pub recycled: AtomicUsize,
    pub pooled: AtomicUsize,
    pub discarded: AtomicUsize,
    pub destroyed_idle: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(counter: &AtomicUsize, n: usize) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get_metrics(&self, idle: usize, capacity: usize) -> PoolMetrics {
        let constructed = self.constructed.load(Ordering::Relaxed);
        let recycled = self.recycled.load(Ordering::Relaxed);
        let allocations = constructed + recycled;
        let reuse_ratio = if allocations > 0 {
            recycled as f64 / allocations as f64
        } else {
            0.0
        };

        PoolMetrics {
            constructed,
            recycled,
            pooled: self.pooled.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            destroyed_idle: self.destroyed_idle.load(Ordering::Relaxed),
            idle_objects: idle,
            max_capacity: capacity,
            reuse_ratio,
        }
    }
}

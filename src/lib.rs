//! # locked_queue
//!
//! Lock-guarded building blocks for session and connection managers: an
//! object pool that recycles boxed instances and a keyed container that
//! owns boxed values under a single lock.
//!
//! ## Features
//!
//! - LIFO free list with a best-effort idle bound and lock-free fast paths
//!   for growing and for rejecting returns when full
//! - Explicit ownership: `deallocate` reports whether an object was pooled
//!   or destroyed, `insert` and `remove` hand displaced values back
//! - Pluggable locks through [`lock_api::RawMutex`](parking_lot::lock_api::RawMutex)
//!   (`parking_lot` by default, [`SpinLock`] included)
//! - Pluggable storage through [`FreeList`] and [`MapStorage`]
//! - Locked snapshots instead of unguarded iteration
//! - Pool warm-up, trimming, metrics and Prometheus export
//!
//! ## Quick Start
//!
//! ```rust
//! use locked_queue::{KeyedContainer, ObjectPool, Poolable};
//!
//! #[derive(Default)]
//! struct Session {
//!     user: String,
//! }
//!
//! impl Poolable for Session {
//!     const MAX_POOL_SIZE: usize = 128;
//!
//!     fn reset(&mut self) {
//!         self.user.clear();
//!     }
//! }
//!
//! let pool: ObjectPool<Session> = ObjectPool::new();
//! let sessions: KeyedContainer<u64, Session> = KeyedContainer::new();
//!
//! let mut session = pool.allocate();
//! session.user.push_str("alice");
//! sessions.insert(1, session);
//!
//! assert_eq!(sessions.with(&1, |s| s.user.clone()).as_deref(), Some("alice"));
//!
//! if let Some(session) = sessions.remove(&1) {
//!     pool.deallocate(session);
//! }
//! assert_eq!(pool.free_size(), 1);
//! ```

mod config;
mod container;
mod errors;
mod lock;
mod metrics;
mod pool;
mod poolable;
mod storage;

pub use config::PoolConfiguration;
pub use container::{KeyedContainer, ValueRef};
pub use errors::{PoolError, PoolResult};
pub use lock::{DefaultLock, SpinLock};
pub use metrics::{MetricsExporter, PoolMetrics};
pub use pool::{Disposition, ObjectPool, PooledObject};
pub use poolable::{KeyedPoolable, Poolable};
pub use storage::{FreeList, MapStorage};

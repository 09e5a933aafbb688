//! Pluggable lock capability.
//!
//! Pools and containers are generic over any [`lock_api::RawMutex`], so the
//! blocking behaviour is chosen by the caller. The default is
//! [`parking_lot::RawMutex`]; [`SpinLock`] spins with exponential backoff and
//! suits very short critical sections.

use crossbeam::utils::Backoff;
use parking_lot::lock_api::{self, GuardSend};
use std::sync::atomic::{AtomicBool, Ordering};

/// Lock used when no lock type is named explicitly
pub type DefaultLock = parking_lot::RawMutex;

/// Test-and-test-and-set spin lock
///
/// # Examples
///
/// ```
/// use locked_queue::{KeyedContainer, SpinLock};
///
/// let sessions: KeyedContainer<u32, String, SpinLock> = KeyedContainer::new();
/// sessions.insert(1, "alice".to_string());
/// assert_eq!(sessions.len(), 1);
/// ```
#[derive(Debug)]
pub struct SpinLock {
    locked: AtomicBool,
}

unsafe impl lock_api::RawMutex for SpinLock {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = Self {
        locked: AtomicBool::new(false),
    };

    type GuardMarker = GuardSend;

    fn lock(&self) {
        let backoff = Backoff::new();
        while !self.try_lock() {
            // Spin on a plain load so waiters don't bounce the cache line.
            while self.locked.load(Ordering::Relaxed) {
                backoff.snooze();
            }
        }
    }

    fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    unsafe fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }

    fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

use dashmap::DashSet;
use locked_queue::{KeyedContainer, ObjectPool, Poolable, SpinLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

const THREADS: usize = 8;
const ROUNDS: usize = 2_000;

#[derive(Default)]
struct Slot {
    owner: AtomicUsize,
}

impl Poolable for Slot {
    const MAX_POOL_SIZE: usize = 4;

    fn reset(&mut self) {
        *self.owner.get_mut() = usize::MAX;
    }
}

#[test]
fn test_pool_never_hands_out_an_object_twice() {
    let pool: ObjectPool<Slot> = ObjectPool::new();
    let live = DashSet::new();

    thread::scope(|s| {
        for worker in 0..THREADS {
            let pool = &pool;
            let live = &live;
            s.spawn(move || {
                for _ in 0..ROUNDS {
                    let slot = pool.allocate();
                    let addr = &*slot as *const Slot as usize;
                    assert!(live.insert(addr), "object handed to two callers");
                    slot.owner.store(worker, Ordering::Relaxed);
                    thread::yield_now();
                    assert_eq!(slot.owner.load(Ordering::Relaxed), worker);
                    assert!(live.remove(&addr).is_some());
                    pool.deallocate(slot);
                }
            });
        }
    });

    // The bound is best-effort: each racing returner can overshoot by one.
    assert!(pool.free_size() <= Slot::MAX_POOL_SIZE + THREADS);

    let metrics = pool.metrics();
    assert_eq!(metrics.constructed + metrics.recycled, THREADS * ROUNDS);
    assert_eq!(metrics.pooled + metrics.discarded, THREADS * ROUNDS);
}

#[test]
fn test_spin_locked_pool_under_contention() {
    let pool: ObjectPool<Slot, SpinLock> = ObjectPool::new();

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                for _ in 0..ROUNDS {
                    let held: Vec<_> = (0..3).map(|_| pool.allocate()).collect();
                    for slot in held {
                        pool.deallocate(slot);
                    }
                }
            });
        }
    });

    assert!(pool.free_size() <= Slot::MAX_POOL_SIZE + THREADS);
}

#[test]
fn test_container_concurrent_insert_find_remove() {
    let container: KeyedContainer<usize, usize> = KeyedContainer::new();

    thread::scope(|s| {
        for worker in 0..THREADS {
            let container = &container;
            s.spawn(move || {
                for round in 0..ROUNDS {
                    let key = worker * ROUNDS + round;
                    assert!(container.insert(key, key * 2).is_none());
                    assert_eq!(container.get_cloned(&key), Some(key * 2));
                    if round % 2 == 0 {
                        assert_eq!(container.remove(&key).map(|v| *v), Some(key * 2));
                        assert!(container.find(&key).is_none());
                    }
                }
            });
        }
    });

    assert_eq!(container.len(), THREADS * ROUNDS / 2);
    let snapshot = container.snapshot();
    assert!(snapshot.iter().all(|(key, value)| *value == key * 2 && key % ROUNDS % 2 == 1));
}

const SHARED_KEYS: usize = 4;

struct Ticket {
    id: usize,
    key: usize,
    dropped: Arc<DashSet<usize>>,
}

impl Drop for Ticket {
    fn drop(&mut self) {
        assert!(self.dropped.insert(self.id), "ticket {} dropped twice", self.id);
    }
}

#[test]
fn test_container_contended_keys() {
    let container: KeyedContainer<usize, Ticket> = KeyedContainer::new();
    let dropped = Arc::new(DashSet::new());
    let issued = AtomicUsize::new(0);

    thread::scope(|s| {
        for worker in 0..THREADS {
            let container = &container;
            let dropped = &dropped;
            let issued = &issued;
            s.spawn(move || {
                for round in 0..ROUNDS {
                    let key = (worker + round) % SHARED_KEYS;
                    match round % 3 {
                        0 => {
                            let ticket = Ticket {
                                id: issued.fetch_add(1, Ordering::Relaxed),
                                key,
                                dropped: Arc::clone(dropped),
                            };
                            if let Some(previous) = container.insert(key, ticket) {
                                assert_eq!(previous.key, key);
                            }
                        }
                        1 => {
                            if let Some(found) = container.find(&key) {
                                assert_eq!(found.key, key);
                            }
                        }
                        _ => {
                            if let Some(removed) = container.remove(&key) {
                                assert_eq!(removed.key, key);
                            }
                        }
                    }
                }
            });
        }
    });

    let live = container.keys();
    assert_eq!(container.len(), live.len());
    assert!(live.iter().all(|key| *key < SHARED_KEYS));
    container.for_each(|key, ticket| assert_eq!(ticket.key, *key));

    let issued = issued.load(Ordering::Relaxed);
    assert_eq!(dropped.len() + container.len(), issued);

    container.clear();
    assert!(container.is_empty());
    assert_eq!(dropped.len(), issued);
}

use super::Subscription;
use parking_lot::Mutex;

/// Identifies one acquisition in a registry.
///
/// Ids from before a [`SubscriptionRegistry::release_all`] are stale and no
/// longer match anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackedId {
    generation: u64,
    index: usize,
}

/// Outcome of draining a registry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReleaseReport {
    pub released: usize,
    pub failed: usize,
}

impl ReleaseReport {
    pub fn total(&self) -> usize {
        self.released + self.failed
    }
}

#[derive(Default)]
struct Slots {
    /// Bumped on every drain
    generation: u64,
    handles: Vec<Option<Box<dyn Subscription>>>,
}

/// Holds the subscriptions acquired under one scope and releases them together.
///
/// Draining returns the registry to its empty state, so a scope may keep
/// using it afterwards. Dropping the registry drains it.
#[derive(Default)]
pub struct SubscriptionRegistry {
    slots: Mutex<Slots>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a handle until the next drain
    pub fn acquire<S>(&self, handle: S) -> TrackedId
    where
        S: Subscription + 'static,
    {
        self.acquire_boxed(Box::new(handle))
    }

    pub fn acquire_boxed(&self, handle: Box<dyn Subscription>) -> TrackedId {
        let mut slots = self.slots.lock();
        slots.handles.push(Some(handle));
        TrackedId {
            generation: slots.generation,
            index: slots.handles.len() - 1,
        }
    }

    /// Release one handle ahead of the drain, clearing its position.
    ///
    /// Returns `false` when the id is stale or its handle was already released.
    pub fn release(&self, id: TrackedId) -> Result<bool, super::ReleaseError> {
        let handle = {
            let mut slots = self.slots.lock();
            if slots.generation != id.generation {
                return Ok(false);
            }
            slots.handles.get_mut(id.index).and_then(Option::take)
        };
        match handle {
            Some(mut handle) => handle.release().map(|()| true),
            None => Ok(false),
        }
    }

    /// Number of handles waiting to be released
    pub fn len(&self) -> usize {
        self.slots.lock().handles.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Release every stored handle in acquisition order, then reset to empty.
    ///
    /// Cleared positions are skipped. A failing handle is logged and the
    /// remaining handles are still released. Handles are taken out of the
    /// lock first, so a release may acquire into this registry again; such
    /// handles wait for the next drain.
    pub fn release_all(&self) -> ReleaseReport {
        let drained = {
            let mut slots = self.slots.lock();
            slots.generation += 1;
            std::mem::take(&mut slots.handles)
        };

        let mut report = ReleaseReport::default();
        for (index, slot) in drained.into_iter().enumerate() {
            let Some(mut handle) = slot else {
                continue;
            };
            match handle.release() {
                Ok(()) => report.released += 1,
                Err(e) => {
                    report.failed += 1;
                    log::warn!("subscription #{} failed to release: {}", index, e);
                }
            }
        }

        if report.total() > 0 {
            log::debug!(
                "released {} subscriptions ({} failed)",
                report.total(),
                report.failed
            );
        }
        report
    }
}

impl Drop for SubscriptionRegistry {
    fn drop(&mut self) {
        self.release_all();
    }
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::{teardown, ReleaseError, TeardownFn};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Counts how often it is released; releasing twice is counted too
    struct CountingHandle {
        releases: Arc<AtomicUsize>,
    }

    impl Subscription for CountingHandle {
        fn release(&mut self) -> Result<(), ReleaseError> {
            self.releases.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn counting_handle() -> (CountingHandle, Arc<AtomicUsize>) {
        let releases = Arc::new(AtomicUsize::new(0));
        (
            CountingHandle {
                releases: Arc::clone(&releases),
            },
            releases,
        )
    }

    fn recorder(log: &Arc<parking_lot::Mutex<Vec<usize>>>, n: usize) -> impl Subscription {
        let log = Arc::clone(log);
        teardown(move || log.lock().push(n))
    }

    #[test]
    fn test_empty_release_is_noop() {
        let registry = SubscriptionRegistry::new();
        assert_eq!(registry.release_all(), ReleaseReport::default());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_double_release_releases_each_handle_once() {
        let registry = SubscriptionRegistry::new();
        let counters: Vec<_> = (0..3)
            .map(|_| {
                let (p, count) = counting_handle();
                registry.acquire(p);
                count
            })
            .collect();

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.release_all().released, 3);
        assert_eq!(registry.release_all().released, 0);
        for count in counters {
            assert_eq!(count.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn test_registry_is_reusable_after_release() {
        let registry = SubscriptionRegistry::new();
        let (first, first_count) = counting_handle();
        registry.acquire(first);
        registry.release_all();

        let (second, second_count) = counting_handle();
        registry.acquire(second);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.release_all().released, 1);
        assert_eq!(first_count.load(Ordering::SeqCst), 1);
        assert_eq!(second_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_release_order_is_acquisition_order() {
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let registry = SubscriptionRegistry::new();
        for n in 0..4 {
            registry.acquire(recorder(&log, n));
        }
        registry.release_all();
        assert_eq!(*log.lock(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_failure_does_not_stop_the_drain() {
        let registry = SubscriptionRegistry::new();
        let (before, before_count) = counting_handle();
        let (after, after_count) = counting_handle();
        registry.acquire(before);
        registry.acquire(TeardownFn::new(|| Err(ReleaseError::Failed("boom".into()))));
        registry.acquire(after);

        let report = registry.release_all();
        assert_eq!(report, ReleaseReport { released: 2, failed: 1 });
        assert_eq!(before_count.load(Ordering::SeqCst), 1);
        assert_eq!(after_count.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_early_release_clears_position() {
        let registry = SubscriptionRegistry::new();
        let (early, early_count) = counting_handle();
        let id = registry.acquire(early);
        let (late, _) = counting_handle();
        registry.acquire(late);

        assert!(registry.release(id).unwrap());
        assert!(!registry.release(id).unwrap());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.release_all().released, 1);
        assert_eq!(early_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stale_id_after_drain() {
        let registry = SubscriptionRegistry::new();
        let (old, _) = counting_handle();
        let stale = registry.acquire(old);
        registry.release_all();

        let (fresh, fresh_count) = counting_handle();
        registry.acquire(fresh);
        assert!(!registry.release(stale).unwrap());
        assert_eq!(fresh_count.load(Ordering::SeqCst), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_release_may_reenter_registry() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let (inner, inner_count) = counting_handle();
        let inner = parking_lot::Mutex::new(Some(inner));
        let reentrant = Arc::clone(&registry);
        registry.acquire(teardown(move || {
            if let Some(p) = inner.lock().take() {
                reentrant.acquire(p);
            }
        }));

        assert_eq!(registry.release_all().released, 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(inner_count.load(Ordering::SeqCst), 0);
        registry.release_all();
        assert_eq!(inner_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_drains() {
        let (p, count) = counting_handle();
        {
            let registry = SubscriptionRegistry::new();
            registry.acquire(p);
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_acquire() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let total = Arc::new(AtomicUsize::new(0));
        let threads: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let total = Arc::clone(&total);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        registry.acquire(CountingHandle {
                            releases: Arc::clone(&total),
                        });
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(registry.release_all().released, 100);
        assert_eq!(total.load(Ordering::SeqCst), 100);
    }
}

use super::{ReleaseReport, SubscriptionRegistry};
use once_cell::sync::Lazy;

/// An owner whose lifetime bounds the subscriptions in its registry.
///
/// Lifecycle integrations call [`TrackedScope::on_destroy`] from whatever
/// event ends the scope.
pub trait TrackedScope {
    fn registry(&self) -> &SubscriptionRegistry;

    fn on_destroy(&self) -> ReleaseReport {
        self.registry().release_all()
    }
}

impl TrackedScope for SubscriptionRegistry {
    fn registry(&self) -> &SubscriptionRegistry {
        self
    }
}

/// Calls [`TrackedScope::on_destroy`] when dropped
pub struct ScopeGuard<'a, S: TrackedScope + ?Sized> {
    scope: &'a S,
}

impl<'a, S: TrackedScope + ?Sized> ScopeGuard<'a, S> {
    pub fn new(scope: &'a S) -> Self {
        Self { scope }
    }
}

impl<S: TrackedScope + ?Sized> Drop for ScopeGuard<'_, S> {
    fn drop(&mut self) {
        self.scope.on_destroy();
    }
}

static GLOBAL_REGISTRY: Lazy<SubscriptionRegistry> = Lazy::new(SubscriptionRegistry::new);

/// Process-wide registry for work that starts before any scope exists.
///
/// Statics are never dropped, so the application must call
/// [`shutdown_global_registry`] from its shutdown path.
pub fn global_registry() -> &'static SubscriptionRegistry {
    &GLOBAL_REGISTRY
}

/// Drain the process-wide registry
pub fn shutdown_global_registry() -> ReleaseReport {
    log::debug!("shutting down global subscription registry");
    GLOBAL_REGISTRY.release_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::teardown;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Widget {
        subscriptions: SubscriptionRegistry,
    }

    impl TrackedScope for Widget {
        fn registry(&self) -> &SubscriptionRegistry {
            &self.subscriptions
        }
    }

    fn counting(count: &Arc<AtomicUsize>) -> impl crate::tracker::Subscription {
        let count = Arc::clone(count);
        teardown(move || {
            count.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_on_destroy_drains_scope() {
        let count = Arc::new(AtomicUsize::new(0));
        let widget = Widget {
            subscriptions: SubscriptionRegistry::new(),
        };
        widget.registry().acquire(counting(&count));
        widget.registry().acquire(counting(&count));

        assert_eq!(widget.on_destroy().released, 2);
        assert_eq!(widget.on_destroy().released, 0);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_guard_drains_on_scope_exit() {
        let count = Arc::new(AtomicUsize::new(0));
        let registry = SubscriptionRegistry::new();
        {
            let _guard = ScopeGuard::new(&registry);
            registry.acquire(counting(&count));
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_global_registry_shutdown() {
        let count = Arc::new(AtomicUsize::new(0));
        global_registry().acquire(counting(&count));
        assert!(shutdown_global_registry().released >= 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}

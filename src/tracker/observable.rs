use super::{Subscription, SubscriptionRegistry, TrackedId};

type Callback<A> = Box<dyn FnMut(A) + Send>;

/// Callbacks receiving a source's notifications.
///
/// Only `next` is required. A missing error callback swallows errors, so an
/// erroring source never tears down the caller.
pub struct Observer<T, E> {
    next: Callback<T>,
    error: Callback<E>,
    complete: Option<Box<dyn FnMut() + Send>>,
}

impl<T, E> Observer<T, E> {
    pub fn new<F>(next: F) -> Self
    where
        F: FnMut(T) + Send + 'static,
    {
        Self {
            next: Box::new(next),
            error: Box::new(|_: E| {}),
            complete: None,
        }
    }

    pub fn on_error<F>(mut self, error: F) -> Self
    where
        F: FnMut(E) + Send + 'static,
    {
        self.error = Box::new(error);
        self
    }

    pub fn on_complete<F>(mut self, complete: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        self.complete = Some(Box::new(complete));
        self
    }

    pub fn next(&mut self, value: T) {
        (self.next)(value)
    }

    pub fn error(&mut self, error: E) {
        (self.error)(error)
    }

    pub fn complete(&mut self) {
        if let Some(complete) = self.complete.as_mut() {
            complete()
        }
    }
}

impl<T, E> std::fmt::Debug for Observer<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observer")
            .field("complete", &self.complete.is_some())
            .finish_non_exhaustive()
    }
}

/// A source that hands out a releasable handle per observer
pub trait Subscribable<T> {
    type Error;
    type Handle: Subscription + 'static;

    fn subscribe(&self, observer: Observer<T, Self::Error>) -> Self::Handle;
}

/// Subscribe to `source` and store the handle in `registry`
pub fn acquire_tracked<T, S>(
    source: &S,
    registry: &SubscriptionRegistry,
    observer: Observer<T, S::Error>,
) -> TrackedId
where
    S: Subscribable<T> + ?Sized,
{
    registry.acquire(source.subscribe(observer))
}

/// Method form of [`acquire_tracked`], available on every [`Subscribable`]
pub trait SubscribeAndTrack<T>: Subscribable<T> {
    fn subscribe_and_track(
        &self,
        registry: &SubscriptionRegistry,
        observer: Observer<T, Self::Error>,
    ) -> TrackedId {
        acquire_tracked(self, registry, observer)
    }
}

impl<T, S: Subscribable<T> + ?Sized> SubscribeAndTrack<T> for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::{teardown, ReleaseError, TeardownFn};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    type ReplayHandle = TeardownFn<Box<dyn FnOnce() -> Result<(), ReleaseError> + Send>>;

    /// Emits a fixed list on subscribe and records when it is released
    struct Replay {
        values: Vec<i32>,
        fail_with: Option<&'static str>,
        released: Arc<AtomicBool>,
    }

    impl Subscribable<i32> for Replay {
        type Error = &'static str;
        type Handle = ReplayHandle;

        fn subscribe(&self, mut observer: Observer<i32, &'static str>) -> Self::Handle {
            for v in &self.values {
                observer.next(*v);
            }
            match self.fail_with {
                Some(e) => observer.error(e),
                None => observer.complete(),
            }
            let released = Arc::clone(&self.released);
            let release: Box<dyn FnOnce() -> Result<(), ReleaseError> + Send> =
                Box::new(move || {
                    released.store(true, Ordering::SeqCst);
                    Ok(())
                });
            TeardownFn::new(release)
        }
    }

    fn replay(values: Vec<i32>) -> Replay {
        Replay {
            values,
            fail_with: None,
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    #[test]
    fn test_acquire_tracked_registers_handle() {
        let source = replay(vec![1, 2, 3]);
        let registry = SubscriptionRegistry::new();
        let sum = Arc::new(AtomicUsize::new(0));
        let completed = Arc::new(AtomicBool::new(false));

        let s = Arc::clone(&sum);
        let c = Arc::clone(&completed);
        acquire_tracked(
            &source,
            &registry,
            Observer::new(move |v: i32| {
                s.fetch_add(v as usize, Ordering::SeqCst);
            })
            .on_complete(move || c.store(true, Ordering::SeqCst)),
        );

        assert_eq!(sum.load(Ordering::SeqCst), 6);
        assert!(completed.load(Ordering::SeqCst));
        assert_eq!(registry.len(), 1);
        assert!(!source.released.load(Ordering::SeqCst));

        registry.release_all();
        assert!(source.released.load(Ordering::SeqCst));
    }

    #[test]
    fn test_missing_error_callback_is_noop() {
        let mut source = replay(vec![]);
        source.fail_with = Some("disconnected");
        let registry = SubscriptionRegistry::new();
        source.subscribe_and_track(&registry, Observer::new(|_| {}));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_error_callback_receives_error() {
        let mut source = replay(vec![]);
        source.fail_with = Some("disconnected");
        let registry = SubscriptionRegistry::new();
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let sink = Arc::clone(&seen);
        source.subscribe_and_track(
            &registry,
            Observer::new(|_| {}).on_error(move |e| *sink.lock() = Some(e)),
        );
        assert_eq!(*seen.lock(), Some("disconnected"));
    }

    #[test]
    fn test_trait_objects_track_too() {
        let source = replay(vec![7]);
        let registry = SubscriptionRegistry::new();
        let dynamic: &dyn Subscribable<i32, Error = &'static str, Handle = ReplayHandle> = &source;
        acquire_tracked(dynamic, &registry, Observer::new(|_| {}));
        registry.acquire(teardown(|| {}));
        assert_eq!(registry.release_all().released, 2);
    }
}

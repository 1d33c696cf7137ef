//! Runtime subscription tracking
//!
//! A [`SubscriptionRegistry`] collects the handles acquired during a scope's
//! lifetime and releases them together when the scope ends. Sources acquire
//! through [`acquire_tracked`] (or the [`SubscribeAndTrack`] extension) so the
//! handle lands in the registry instead of being dropped on the floor.
//!
//! ```
//! use subtrack::tracker::{Observer, Subject, SubscribeAndTrack, SubscriptionRegistry};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let registry = SubscriptionRegistry::new();
//! let clicks: Subject<u32> = Subject::new();
//! let seen = Arc::new(AtomicUsize::new(0));
//!
//! let counter = Arc::clone(&seen);
//! clicks.subscribe_and_track(
//!     &registry,
//!     Observer::new(move |_| {
//!         counter.fetch_add(1, Ordering::SeqCst);
//!     }),
//! );
//!
//! clicks.next(1);
//! registry.release_all();
//! clicks.next(2);
//! assert_eq!(seen.load(Ordering::SeqCst), 1);
//! ```

mod observable;
mod registry;
mod scope;
mod subject;

pub use observable::{acquire_tracked, Observer, Subscribable, SubscribeAndTrack};
pub use registry::{ReleaseReport, SubscriptionRegistry, TrackedId};
pub use scope::{global_registry, shutdown_global_registry, ScopeGuard, TrackedScope};
pub use subject::{StreamError, Subject, SubjectSubscription};

use thiserror::Error;

/// Failure to release a subscription
#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("subscription was already released")]
    AlreadyReleased,

    #[error("release failed: {0}")]
    Failed(String),
}

/// A disposable handle to an active subscription.
///
/// Handles are not required to be idempotent; the registry releases each one
/// at most once.
pub trait Subscription: Send {
    fn release(&mut self) -> Result<(), ReleaseError>;
}

impl<S: Subscription + ?Sized> Subscription for Box<S> {
    fn release(&mut self) -> Result<(), ReleaseError> {
        (**self).release()
    }
}

/// A subscription whose release runs a closure once
pub struct TeardownFn<F> {
    teardown: Option<F>,
}

impl<F> TeardownFn<F>
where
    F: FnOnce() -> Result<(), ReleaseError> + Send,
{
    pub fn new(teardown: F) -> Self {
        Self {
            teardown: Some(teardown),
        }
    }
}

impl<F> Subscription for TeardownFn<F>
where
    F: FnOnce() -> Result<(), ReleaseError> + Send,
{
    fn release(&mut self) -> Result<(), ReleaseError> {
        match self.teardown.take() {
            Some(teardown) => teardown(),
            None => Err(ReleaseError::AlreadyReleased),
        }
    }
}

/// Wrap an infallible cleanup closure as a [`Subscription`]
pub fn teardown<F>(cleanup: F) -> TeardownFn<impl FnOnce() -> Result<(), ReleaseError> + Send>
where
    F: FnOnce() + Send,
{
    TeardownFn::new(move || {
        cleanup();
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_teardown_runs_once() {
        let mut handle = teardown(|| {});
        assert!(handle.release().is_ok());
        assert!(matches!(handle.release(), Err(ReleaseError::AlreadyReleased)));
    }

    #[test]
    fn test_fallible_teardown() {
        let mut handle = TeardownFn::new(|| Err(ReleaseError::Failed("socket closed".into())));
        let err = handle.release().unwrap_err();
        assert_eq!(err.to_string(), "release failed: socket closed");
    }
}

use super::{Observer, ReleaseError, Subscribable, Subscription};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::{Arc, Weak};

/// Default error type carried by a [`Subject`]
pub type StreamError = Arc<dyn std::error::Error + Send + Sync>;

struct SubjectState<T, E> {
    observers: Vec<(u64, Observer<T, E>)>,
    /// Ids released while their observer was out for delivery
    detached: HashSet<u64>,
    next_id: u64,
    closed: bool,
}

/// A synchronous multicast source.
///
/// Every value passed to [`Subject::next`] is delivered to the observers
/// subscribed at that moment. After `error` or `complete` the subject is
/// closed: later subscribers are completed immediately and values are dropped.
///
/// Observer callbacks may release their own subscription or subscribe new
/// observers; those take effect from the next delivery.
pub struct Subject<T, E = StreamError> {
    state: Arc<Mutex<SubjectState<T, E>>>,
}

impl<T: Clone, E: Clone> Subject<T, E> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SubjectState {
                observers: Vec::new(),
                detached: HashSet::new(),
                next_id: 0,
                closed: false,
            })),
        }
    }

    pub fn next(&self, value: T) {
        self.deliver(false, |observer| observer.next(value.clone()));
    }

    pub fn error(&self, error: E) {
        self.deliver(true, |observer| observer.error(error.clone()));
    }

    pub fn complete(&self) {
        self.deliver(true, Observer::complete);
    }

    pub fn observer_count(&self) -> usize {
        self.state.lock().observers.len()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Run `notify` on each current observer with the lock released
    fn deliver(&self, close: bool, mut notify: impl FnMut(&mut Observer<T, E>)) {
        let mut current = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = close;
            std::mem::take(&mut state.observers)
        };

        for (id, observer) in current.iter_mut() {
            if !self.state.lock().detached.contains(id) {
                notify(observer);
            }
        }

        if close {
            // Observers are dropped once they have seen the terminal notification
            self.state.lock().detached.clear();
            return;
        }

        let mut state = self.state.lock();
        let detached = std::mem::take(&mut state.detached);
        current.retain(|(id, _)| !detached.contains(id));
        current.append(&mut state.observers);
        state.observers = current;
    }
}

impl<T: Clone, E: Clone> Default for Subject<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Clone for Subject<T, E> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T, E> Subscribable<T> for Subject<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    type Error = E;
    type Handle = SubjectSubscription<T, E>;

    fn subscribe(&self, mut observer: Observer<T, E>) -> SubjectSubscription<T, E> {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        if state.closed {
            drop(state);
            observer.complete();
        } else {
            state.observers.push((id, observer));
        }
        SubjectSubscription {
            id,
            state: Arc::downgrade(&self.state),
            released: false,
        }
    }
}

/// Handle detaching one observer from a [`Subject`]
pub struct SubjectSubscription<T, E> {
    id: u64,
    state: Weak<Mutex<SubjectState<T, E>>>,
    released: bool,
}

impl<T, E> Subscription for SubjectSubscription<T, E> {
    fn release(&mut self) -> Result<(), ReleaseError> {
        if self.released {
            return Err(ReleaseError::AlreadyReleased);
        }
        self.released = true;

        // A dropped subject has nothing left to detach from
        let Some(state) = self.state.upgrade() else {
            return Ok(());
        };
        let mut state = state.lock();
        if state.closed {
            return Ok(());
        }
        match state.observers.iter().position(|(id, _)| *id == self.id) {
            Some(index) => {
                state.observers.remove(index);
            }
            None => {
                state.detached.insert(self.id);
            }
        }
        Ok(())
    }
}

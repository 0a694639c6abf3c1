use std::sync::{Arc, Weak};

use parking_lot::Mutex;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct AtomInner<T> {
    value: T,
    subscribers: Vec<(u64, Callback<T>)>,
    next_id: u64,
}

/// Minimal observable value container.
///
/// `set` replaces the value and synchronously notifies every registered
/// subscriber in registration order. There is no equality check and no
/// batching: every `set` notifies, even when the new value is identical.
/// The internal lock is never held across a callback invocation, so
/// callbacks may freely call `get`, `set`, or `subscribe` on the same atom.
pub struct Atom<T> {
    inner: Arc<Mutex<AtomInner<T>>>,
}

impl<T> Clone for Atom<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> Atom<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(AtomInner {
                value,
                subscribers: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Get a clone of the current value.
    pub fn get(&self) -> T {
        self.inner.lock().value.clone()
    }

    /// Replace the value with `updater(current)` and notify all subscribers.
    pub fn set(&self, updater: impl FnOnce(T) -> T) {
        let (new_value, snapshot) = {
            let mut inner = self.inner.lock();
            let old = inner.value.clone();
            inner.value = updater(old);
            (inner.value.clone(), inner.subscribers.clone())
        };

        for (id, callback) in snapshot {
            // A subscriber removed mid-notification must not be invoked
            // for the in-progress notification.
            let still_registered = self
                .inner
                .lock()
                .subscribers
                .iter()
                .any(|(sid, _)| *sid == id);
            if still_registered {
                callback(&new_value);
            }
        }
    }

    /// Register a callback invoked on every `set` with the new value.
    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription<T> {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.push((id, Arc::new(callback)));
        Subscription {
            inner: Arc::downgrade(&self.inner),
            id,
        }
    }
}

/// Unsubscribe capability returned by [`Atom::subscribe`].
///
/// Dropping the handle without calling `unsubscribe` leaves the
/// subscription active for the lifetime of the atom.
pub struct Subscription<T> {
    inner: Weak<Mutex<AtomInner<T>>>,
    id: u64,
}

impl<T> Subscription<T> {
    pub fn unsubscribe(self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.lock().subscribers.retain(|(sid, _)| *sid != self.id);
        }
    }
}

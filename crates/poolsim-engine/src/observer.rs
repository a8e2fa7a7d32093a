//! Publish-subscribe channel for structural pool changes.
//!
//! [`Subscribers`] holds callbacks in registration order. Subscribing
//! returns a [`Subscription`] handle whose
//! [`unsubscribe`](Subscription::unsubscribe) removes the callback.
//! Dropping the handle does *not* unsubscribe.
//!
//! Callbacks run synchronously inside [`Subscribers::emit`] and must be
//! cheap. The registry lock is not held while they run, so a callback may
//! subscribe or unsubscribe on the same registry. A callback removed
//! mid-emit still sees the current event if its turn already came; one
//! added mid-emit first sees the next event.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use indexmap::IndexMap;

type Callback<E> = Box<dyn FnMut(&E) + Send>;

struct Registry<E> {
    next_id: u64,
    callbacks: IndexMap<u64, Callback<E>>,
    /// Ids of callbacks currently taken out by an `emit`.
    in_flight: Vec<u64>,
}

/// Puts taken callbacks back on drop, including when a callback panics.
struct Restore<'a, E> {
    registry: &'a Mutex<Registry<E>>,
    taken: IndexMap<u64, Callback<E>>,
}

impl<E> Drop for Restore<'_, E> {
    fn drop(&mut self) {
        let mut reg = lock(self.registry);
        let mut merged = std::mem::take(&mut self.taken);
        // Anything no longer in flight was unsubscribed during the emit.
        merged.retain(|id, _| match reg.in_flight.iter().position(|f| f == id) {
            Some(pos) => {
                reg.in_flight.swap_remove(pos);
                true
            }
            None => false,
        });
        let added = std::mem::take(&mut reg.callbacks);
        merged.extend(added);
        merged.sort_keys();
        reg.callbacks = merged;
    }
}

fn lock<E>(registry: &Mutex<Registry<E>>) -> MutexGuard<'_, Registry<E>> {
    // A panicking callback must not wedge the pool.
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Ordered set of observer callbacks for events of type `E`.
pub struct Subscribers<E> {
    registry: Arc<Mutex<Registry<E>>>,
}

impl<E> Subscribers<E> {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                callbacks: IndexMap::new(),
                in_flight: Vec::new(),
            })),
        }
    }

    /// Register `callback`. Returns the handle that removes it again.
    pub fn subscribe<F>(&self, callback: F) -> Subscription<E>
    where
        F: FnMut(&E) + Send + 'static,
    {
        let mut reg = lock(&self.registry);
        let id = reg.next_id;
        reg.next_id += 1;
        reg.callbacks.insert(id, Box::new(callback));
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Invoke every callback with `event`, in registration order.
    pub fn emit(&self, event: &E) {
        let taken = {
            let mut reg = lock(&self.registry);
            let taken = std::mem::take(&mut reg.callbacks);
            reg.in_flight.extend(taken.keys().copied());
            taken
        };
        let mut restore = Restore {
            registry: &self.registry,
            taken,
        };
        for callback in restore.taken.values_mut() {
            callback(event);
        }
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        let reg = lock(&self.registry);
        reg.callbacks.len() + reg.in_flight.len()
    }

    /// Whether no callbacks are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E> Default for Subscribers<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Subscribers<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("len", &self.len())
            .finish()
    }
}

/// Handle returned by [`Subscribers::subscribe`].
pub struct Subscription<E> {
    id: u64,
    registry: Weak<Mutex<Registry<E>>>,
}

impl<E> Subscription<E> {
    /// Remove the callback.
    ///
    /// Returns `false` if it was already removed or the registry has
    /// been dropped.
    pub fn unsubscribe(self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => {
                let mut reg = lock(&registry);
                if reg.callbacks.shift_remove(&self.id).is_some() {
                    return true;
                }
                match reg.in_flight.iter().position(|&f| f == self.id) {
                    Some(pos) => {
                        reg.in_flight.swap_remove(pos);
                        true
                    }
                    None => false,
                }
            }
            None => false,
        }
    }
}

impl<E> fmt::Debug for Subscription<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn emit_reaches_all_subscribers_in_order() {
        let subs = Subscribers::<u32>::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let (a, b) = (Arc::clone(&log), Arc::clone(&log));
        let _s1 = subs.subscribe(move |e| a.lock().unwrap().push(("a", *e)));
        let _s2 = subs.subscribe(move |e| b.lock().unwrap().push(("b", *e)));
        subs.emit(&7);
        assert_eq!(*log.lock().unwrap(), vec![("a", 7), ("b", 7)]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let subs = Subscribers::<()>::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let sub = subs.subscribe(move |_| {
            h.fetch_add(1, Ordering::Relaxed);
        });
        subs.emit(&());
        assert!(sub.unsubscribe());
        subs.emit(&());
        assert_eq!(hits.load(Ordering::Relaxed), 1);
        assert!(subs.is_empty());
    }

    #[test]
    fn unsubscribe_after_registry_dropped() {
        let subs = Subscribers::<()>::new();
        let sub = subs.subscribe(|_| {});
        drop(subs);
        assert!(!sub.unsubscribe());
    }

    #[test]
    fn callback_may_unsubscribe_itself() {
        let subs = Subscribers::<()>::new();
        let slot: Arc<Mutex<Option<Subscription<()>>>> = Arc::new(Mutex::new(None));
        let hits = Arc::new(AtomicUsize::new(0));
        let (s, h) = (Arc::clone(&slot), Arc::clone(&hits));
        let sub = subs.subscribe(move |_| {
            h.fetch_add(1, Ordering::Relaxed);
            if let Some(me) = s.lock().unwrap().take() {
                assert!(me.unsubscribe());
            }
        });
        *slot.lock().unwrap() = Some(sub);

        subs.emit(&());
        assert!(subs.is_empty());
        subs.emit(&());
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn callback_may_subscribe_during_emit() {
        let subs = Arc::new(Subscribers::<u32>::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let (inner_subs, outer_log) = (Arc::clone(&subs), Arc::clone(&log));
        let added = Arc::new(Mutex::new(Vec::new()));
        let keep = Arc::clone(&added);
        let _outer = subs.subscribe(move |e| {
            outer_log.lock().unwrap().push(("outer", *e));
            if *e == 1 {
                let l = Arc::clone(&outer_log);
                let handle = inner_subs.subscribe(move |e| l.lock().unwrap().push(("inner", *e)));
                keep.lock().unwrap().push(handle);
            }
        });

        subs.emit(&1);
        assert_eq!(subs.len(), 2);
        subs.emit(&2);
        assert_eq!(
            *log.lock().unwrap(),
            vec![("outer", 1), ("outer", 2), ("inner", 2)]
        );
        assert_eq!(added.lock().unwrap().len(), 1);
    }

    #[test]
    fn dropping_handle_keeps_subscription() {
        let subs = Subscribers::<()>::new();
        drop(subs.subscribe(|_| {}));
        assert_eq!(subs.len(), 1);
    }
}

//! Observer fixtures.
//!
//! [`EventLog`] records every event an observer channel emits so tests
//! can assert on the exact sequence afterwards.

use std::sync::{Arc, Mutex, PoisonError};

/// Thread-safe recorder of emitted events.
#[derive(Debug)]
pub struct EventLog<E> {
    events: Arc<Mutex<Vec<E>>>,
}

impl<E> Clone for EventLog<E> {
    fn clone(&self) -> Self {
        Self {
            events: Arc::clone(&self.events),
        }
    }
}

impl<E> Default for EventLog<E> {
    fn default() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<E: Clone + Send + 'static> EventLog<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A callback suitable for `subscribe` that appends to this log.
    pub fn recorder(&self) -> impl FnMut(&E) + Send + 'static {
        let events = Arc::clone(&self.events);
        move |event: &E| {
            events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(event.clone());
        }
    }

    /// Every event recorded so far, in emission order.
    pub fn events(&self) -> Vec<E> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return every recorded event.
    pub fn take(&self) -> Vec<E> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_appends_in_order() {
        let log = EventLog::<u32>::new();
        let mut cb = log.recorder();
        cb(&1);
        cb(&2);
        assert_eq!(log.events(), vec![1, 2]);
        assert_eq!(log.take(), vec![1, 2]);
        assert!(log.is_empty());
    }
}

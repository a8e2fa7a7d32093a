//! Unbounded FIFO request queue.
//!
//! [`RequestQueue`] buffers requests between arrival and dispatch to a
//! worker. Insertion order is processing order. There is no capacity
//! bound: when no worker can accept work the queue simply grows, which
//! is how the simulation expresses backpressure at this level.

use std::collections::VecDeque;

use poolsim_core::{Request, RequestId};

/// Strict FIFO buffer of pending [`Request`]s.
#[derive(Clone, Debug, Default)]
pub struct RequestQueue {
    items: VecDeque<Request>,
}

impl RequestQueue {
    /// An empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `request` at the tail.
    pub fn add(&mut self, request: Request) {
        self.items.push_back(request);
    }

    /// Append `request` if present. `None` is a no-op.
    ///
    /// Returns whether anything was enqueued.
    pub fn add_opt(&mut self, request: Option<Request>) -> bool {
        match request {
            Some(r) => {
                self.add(r);
                true
            }
            None => false,
        }
    }

    /// Remove and return the oldest request, or `None` when empty.
    pub fn pop(&mut self) -> Option<Request> {
        self.items.pop_front()
    }

    /// Put `request` back at the head, ahead of everything queued.
    ///
    /// Used when a popped request could not be admitted after all.
    pub fn push_front(&mut self, request: Request) {
        self.items.push_front(request);
    }

    /// The oldest request, without removing it.
    pub fn peek(&self) -> Option<&Request> {
        self.items.front()
    }

    /// Number of queued requests.
    pub fn size(&self) -> usize {
        self.items.len()
    }

    /// Alias for [`size`](Self::size).
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Discard every queued request.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Queued requests in processing order.
    pub fn iter(&self) -> impl Iterator<Item = &Request> + '_ {
        self.items.iter()
    }

    /// Ids of queued requests in processing order.
    pub fn ids(&self) -> Vec<RequestId> {
        self.items.iter().map(Request::id).collect()
    }
}

impl Extend<Request> for RequestQueue {
    fn extend<I: IntoIterator<Item = Request>>(&mut self, iter: I) {
        self.items.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(id: u64) -> Request {
        Request::new(RequestId(id))
    }

    #[test]
    fn pop_on_empty_returns_none() {
        let mut q = RequestQueue::new();
        assert!(q.pop().is_none());
        assert_eq!(q.size(), 0);
        assert!(q.is_empty());
    }

    #[test]
    fn add_opt_none_is_noop() {
        let mut q = RequestQueue::new();
        assert!(!q.add_opt(None));
        assert!(q.is_empty());
        assert!(q.add_opt(Some(req(1))));
        assert_eq!(q.size(), 1);
    }

    #[test]
    fn push_front_restores_head() {
        let mut q = RequestQueue::new();
        q.extend([req(1), req(2)]);
        let head = q.pop().unwrap();
        q.push_front(head);
        assert_eq!(q.ids(), vec![RequestId(1), RequestId(2)]);
        assert_eq!(q.peek().map(Request::id), Some(RequestId(1)));
    }

    #[test]
    fn clear_empties() {
        let mut q = RequestQueue::new();
        q.extend((0..5).map(req));
        q.clear();
        assert_eq!(q.len(), 0);
        assert!(q.pop().is_none());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn pops_in_insertion_order(ids in prop::collection::vec(any::<u64>(), 0..64)) {
                let mut q = RequestQueue::new();
                for &id in &ids {
                    q.add(req(id));
                }
                let mut popped = Vec::new();
                while let Some(r) = q.pop() {
                    popped.push(r.id().0);
                }
                prop_assert_eq!(popped, ids);
            }

            #[test]
            fn size_tracks_adds_and_pops(adds in 0usize..32, pops in 0usize..48) {
                let mut q = RequestQueue::new();
                q.extend((0..adds as u64).map(req));
                for _ in 0..pops {
                    q.pop();
                }
                prop_assert_eq!(q.size(), adds.saturating_sub(pops));
            }
        }
    }
}

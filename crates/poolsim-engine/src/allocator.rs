//! Fixed-capacity core allocator.
//!
//! [`CoreAllocator`] models a machine with a fixed number of execution
//! tokens (cores) shared by every worker and service running on it,
//! independent of how many logical workers exist. It owns an internal
//! task queue of its own, separate from the request queue.
//!
//! # Backpressure
//!
//! [`try_dispatch`](CoreAllocator::try_dispatch) pops the head of the
//! internal queue; if no token is free the task goes back to the *front*
//! so the relative order of waiting tasks never changes.
//!
//! # Token conservation
//!
//! `free_count() + assigned_count() == capacity()` after every call, and
//! a token is never on the free list while it holds a task. Freed
//! tokens are reused in FIFO order.

use std::collections::VecDeque;

use poolsim_core::{AllocatorError, TokenIndex};
use tracing::trace;

/// Default number of cores.
pub const DEFAULT_CORES: usize = 8;

/// Fixed set of execution tokens plus a FIFO queue of waiting tasks.
#[derive(Clone, Debug)]
pub struct CoreAllocator<T> {
    tokens: Vec<Option<T>>,
    free: VecDeque<TokenIndex>,
    queue: VecDeque<T>,
}

impl<T> CoreAllocator<T> {
    /// Create an allocator with `capacity` tokens, all free.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "CoreAllocator capacity must be at least 1");
        Self {
            tokens: (0..capacity).map(|_| None).collect(),
            free: (0..capacity).map(TokenIndex).collect(),
            queue: VecDeque::new(),
        }
    }

    /// Append `task` to the internal queue.
    pub fn enqueue(&mut self, task: T) {
        self.queue.push_back(task);
    }

    /// Grant a token to the task at the head of the internal queue.
    ///
    /// Returns the granted token and a reference to the task now
    /// occupying it. Returns `None` when the queue is empty, or when no
    /// token is free, in which case the task stays at the head.
    pub fn try_dispatch(&mut self) -> Option<(TokenIndex, &T)> {
        let task = self.queue.pop_front()?;
        let Some(token) = self.free.pop_front() else {
            self.queue.push_front(task);
            trace!(waiting = self.queue.len(), "core allocator saturated");
            return None;
        };
        let slot = &mut self.tokens[token.0];
        *slot = Some(task);
        slot.as_ref().map(|t| (token, t))
    }

    /// Grant a token directly to `task`, bypassing the internal queue.
    ///
    /// On saturation the task is handed back unchanged.
    pub fn try_acquire(&mut self, task: T) -> Result<TokenIndex, T> {
        match self.free.pop_front() {
            Some(token) => {
                self.tokens[token.0] = Some(task);
                Ok(token)
            }
            None => Err(task),
        }
    }

    /// Release `token`, returning the task that held it.
    ///
    /// # Errors
    ///
    /// - [`AllocatorError::InvalidToken`] if `token` is out of range.
    /// - [`AllocatorError::TokenNotAssigned`] if the token is already
    ///   free; nothing changes in that case.
    pub fn release(&mut self, token: TokenIndex) -> Result<T, AllocatorError> {
        let capacity = self.tokens.len();
        let slot = self
            .tokens
            .get_mut(token.0)
            .ok_or(AllocatorError::InvalidToken {
                index: token,
                capacity,
            })?;
        let task = slot
            .take()
            .ok_or(AllocatorError::TokenNotAssigned { index: token })?;
        self.free.push_back(token);
        Ok(task)
    }

    /// The task holding `token`, if any.
    pub fn task(&self, token: TokenIndex) -> Option<&T> {
        self.tokens.get(token.0).and_then(Option::as_ref)
    }

    /// Whether `token` is currently assigned.
    pub fn is_assigned(&self, token: TokenIndex) -> bool {
        self.task(token).is_some()
    }

    /// Total number of tokens.
    pub fn capacity(&self) -> usize {
        self.tokens.len()
    }

    /// Number of free tokens.
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Number of tokens currently holding a task.
    pub fn assigned_count(&self) -> usize {
        self.tokens.iter().filter(|t| t.is_some()).count()
    }

    /// Whether every token is assigned.
    pub fn is_saturated(&self) -> bool {
        self.free.is_empty()
    }

    /// Number of tasks waiting in the internal queue.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Tasks waiting in the internal queue, head first.
    pub fn queued(&self) -> impl Iterator<Item = &T> + '_ {
        self.queue.iter()
    }

    /// Assigned tokens and their tasks, in token order.
    pub fn assigned(&self) -> impl Iterator<Item = (TokenIndex, &T)> + '_ {
        self.tokens
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.as_ref().map(|t| (TokenIndex(i), t)))
    }
}

impl<T> Default for CoreAllocator<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CORES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_allocator_is_all_free() {
        let a: CoreAllocator<u32> = CoreAllocator::default();
        assert_eq!(a.capacity(), 8);
        assert_eq!(a.free_count(), 8);
        assert_eq!(a.assigned_count(), 0);
        assert!(!a.is_saturated());
    }

    #[test]
    #[should_panic(expected = "at least 1")]
    fn zero_capacity_panics() {
        let _ = CoreAllocator::<u32>::new(0);
    }

    #[test]
    fn dispatch_on_empty_queue_returns_none() {
        let mut a = CoreAllocator::<u32>::new(2);
        assert!(a.try_dispatch().is_none());
        assert_eq!(a.free_count(), 2);
    }

    #[test]
    fn dispatch_assigns_lowest_free_token_first() {
        let mut a = CoreAllocator::new(2);
        a.enqueue("a");
        a.enqueue("b");
        assert_eq!(a.try_dispatch(), Some((TokenIndex(0), &"a")));
        assert_eq!(a.try_dispatch(), Some((TokenIndex(1), &"b")));
        assert!(a.is_saturated());
        assert_eq!(a.task(TokenIndex(1)), Some(&"b"));
    }

    #[test]
    fn saturated_dispatch_requeues_at_front() {
        let mut a = CoreAllocator::new(1);
        a.enqueue(1);
        a.enqueue(2);
        a.enqueue(3);
        assert_eq!(a.try_dispatch().map(|(t, _)| t), Some(TokenIndex(0)));
        assert!(a.try_dispatch().is_none());
        assert!(a.try_dispatch().is_none());
        assert_eq!(a.queued().copied().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn release_returns_token_to_back_of_free_list() {
        let mut a = CoreAllocator::new(3);
        let t0 = a.try_acquire('x').unwrap();
        let t1 = a.try_acquire('y').unwrap();
        assert_eq!(a.release(t0), Ok('x'));
        // Token 2 was free before token 0 came back.
        assert_eq!(a.try_acquire('z'), Ok(TokenIndex(2)));
        assert_eq!(a.try_acquire('w'), Ok(TokenIndex(0)));
        assert_eq!(a.try_acquire('v'), Err('v'));
        assert!(a.is_assigned(t1));
    }

    #[test]
    fn release_out_of_range_is_invalid() {
        let mut a = CoreAllocator::<u8>::new(8);
        assert_eq!(
            a.release(TokenIndex(8)),
            Err(AllocatorError::InvalidToken {
                index: TokenIndex(8),
                capacity: 8
            })
        );
    }

    #[test]
    fn double_release_is_reported_without_corrupting_state() {
        let mut a = CoreAllocator::new(2);
        let t = a.try_acquire(7u8).unwrap();
        assert_eq!(a.release(t), Ok(7));
        assert_eq!(
            a.release(t),
            Err(AllocatorError::TokenNotAssigned { index: t })
        );
        assert_eq!(a.free_count(), 2);
        assert_eq!(a.free_count() + a.assigned_count(), a.capacity());
    }

    #[test]
    fn assigned_iterates_in_token_order() {
        let mut a = CoreAllocator::new(4);
        a.try_acquire(10).unwrap();
        a.try_acquire(11).unwrap();
        a.try_acquire(12).unwrap();
        a.release(TokenIndex(1)).unwrap();
        let held: Vec<_> = a.assigned().map(|(t, v)| (t.0, *v)).collect();
        assert_eq!(held, vec![(0, 10), (2, 12)]);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Clone, Debug)]
        enum Op {
            Enqueue(u32),
            Dispatch,
            Acquire(u32),
            Release(usize),
        }

        fn arb_op() -> impl Strategy<Value = Op> {
            prop_oneof![
                any::<u32>().prop_map(Op::Enqueue),
                Just(Op::Dispatch),
                any::<u32>().prop_map(Op::Acquire),
                (0usize..10).prop_map(Op::Release),
            ]
        }

        proptest! {
            #[test]
            fn tokens_are_conserved(cap in 1usize..9, ops in prop::collection::vec(arb_op(), 0..128)) {
                let mut a = CoreAllocator::new(cap);
                for op in ops {
                    match op {
                        Op::Enqueue(v) => a.enqueue(v),
                        Op::Dispatch => { a.try_dispatch(); }
                        Op::Acquire(v) => { let _ = a.try_acquire(v); }
                        Op::Release(i) => {
                            let r = a.release(TokenIndex(i));
                            if i >= cap {
                                let is_invalid = matches!(r, Err(AllocatorError::InvalidToken { .. }));
                                prop_assert!(is_invalid);
                            }
                        }
                    }
                    prop_assert_eq!(a.free_count() + a.assigned_count(), cap);
                    for (t, _) in a.assigned() {
                        prop_assert!(!a.free.contains(&t), "token {} both free and assigned", t);
                    }
                }
            }

            #[test]
            fn saturated_dispatch_preserves_queue_order(
                tasks in prop::collection::vec(any::<u32>(), 1..32),
                attempts in 1usize..16,
            ) {
                let mut a = CoreAllocator::new(1);
                a.try_acquire(u32::MAX).unwrap();
                for &t in &tasks {
                    a.enqueue(t);
                }
                for _ in 0..attempts {
                    prop_assert!(a.try_dispatch().is_none());
                }
                prop_assert_eq!(a.queued().copied().collect::<Vec<_>>(), tasks);
            }
        }
    }
}

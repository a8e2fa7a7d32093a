//! Error types for the poolsim engine.
//!
//! Two severities share these enums. Capacity and lookup failures are
//! *soft*: expected under load, returned as values, never raised.
//! Invalid token indices are *hard*: they indicate a caller bug and are
//! propagated out of the tick loop.

use std::error::Error;
use std::fmt;

use crate::id::{TokenIndex, WorkerId};

/// Soft failures of worker pool operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolError {
    /// Spawn refused: the pool already holds `max` workers.
    MaxWorkersReached {
        /// The configured maximum.
        max: usize,
    },
    /// Despawn refused: the pool holds `min` workers or fewer.
    MinWorkersReached {
        /// The configured minimum.
        min: usize,
    },
    /// Despawn refused: the named worker is not idle.
    WorkerBusy {
        /// The worker that was asked to despawn.
        id: WorkerId,
    },
    /// No worker with this id belongs to the pool.
    WorkerNotFound {
        /// The unknown id.
        id: WorkerId,
    },
    /// No worker is currently idle.
    NoIdleWorker,
    /// Every core token is assigned; the request cannot be admitted.
    CoresSaturated,
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxWorkersReached { max } => {
                write!(f, "maximum number of workers reached ({max})")
            }
            Self::MinWorkersReached { min } => {
                write!(f, "minimum number of workers reached ({min})")
            }
            Self::WorkerBusy { id } => write!(f, "worker {id} is currently busy"),
            Self::WorkerNotFound { id } => write!(f, "worker {id} not found"),
            Self::NoIdleWorker => write!(f, "no idle worker available"),
            Self::CoresSaturated => write!(f, "no free core token"),
        }
    }
}

impl Error for PoolError {}

/// Errors from the core allocator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AllocatorError {
    /// Token index outside `0..capacity`. Hard error.
    InvalidToken {
        /// The offending index.
        index: TokenIndex,
        /// Number of tokens the allocator manages.
        capacity: usize,
    },
    /// Release of a token that is not currently assigned. Soft: the
    /// allocator state is left untouched.
    TokenNotAssigned {
        /// The already-free token.
        index: TokenIndex,
    },
    /// Release refused: the token belongs to a busy worker and is only
    /// returned when that worker completes. Soft: nothing changes.
    TokenHeldByWorker {
        /// The token asked for.
        index: TokenIndex,
        /// The worker holding it.
        worker: WorkerId,
    },
}

impl AllocatorError {
    /// Whether this error indicates a caller bug rather than a benign
    /// lookup miss.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidToken { .. })
    }
}

impl fmt::Display for AllocatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidToken { index, capacity } => {
                write!(f, "invalid token index {index} (capacity {capacity})")
            }
            Self::TokenNotAssigned { index } => {
                write!(f, "token {index} is not assigned")
            }
            Self::TokenHeldByWorker { index, worker } => {
                write!(f, "token {index} is held by busy worker {worker}")
            }
        }
    }
}

impl Error for AllocatorError {}

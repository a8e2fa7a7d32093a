//! Owned, cloneable views of simulation state.
//!
//! Borrowed views ([`PoolState`](crate::pool::PoolState)) are the cheap
//! path for same-thread observers. The types here are full copies, for
//! consumers on another thread such as the realtime front end.

use poolsim_core::{PoolId, RequestId, TickId, Timestamp, TokenIndex, WorkerId};

use crate::metrics::{SimTotals, TickMetrics};
use crate::worker::{Worker, WorkerState};

/// Copy of one worker's state.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkerSnapshot {
    /// Worker id.
    pub id: WorkerId,
    /// Lifecycle phase.
    pub state: WorkerState,
    /// Request being processed, if Busy.
    pub request: Option<RequestId>,
    /// Core token held, if Busy with core contention enabled.
    pub token: Option<TokenIndex>,
    /// Start of the current startup or processing phase.
    pub started_at: Option<Timestamp>,
    /// End of the current startup or processing phase.
    pub deadline: Option<Timestamp>,
    /// Fraction of the current phase elapsed.
    pub progress: f64,
    /// Milliseconds in the current state.
    pub time_in_state_ms: u64,
    /// Requests completed so far.
    pub completed: u64,
}

impl WorkerSnapshot {
    /// Capture `worker` as of `now`.
    pub fn capture(worker: &Worker, now: Timestamp) -> Self {
        Self {
            id: worker.id(),
            state: worker.state(),
            request: worker.current_request().map(|r| r.id()),
            token: worker.token(),
            started_at: worker.processing_started_at(),
            deadline: worker.processing_deadline(),
            progress: worker.progress(now),
            time_in_state_ms: worker.time_in_state(now),
            completed: worker.completed(),
        }
    }
}

/// Copy of a worker pool's state.
#[derive(Clone, Debug, PartialEq)]
pub struct PoolSnapshot {
    /// Pool id.
    pub id: PoolId,
    /// Current lower bound.
    pub min_workers: usize,
    /// Current upper bound.
    pub max_workers: usize,
    /// Structural revision; changes on every spawn and despawn.
    pub revision: u64,
    /// Workers in pool order.
    pub workers: Vec<WorkerSnapshot>,
}

impl PoolSnapshot {
    /// Number of workers in `state`.
    pub fn count(&self, state: WorkerState) -> usize {
        self.workers.iter().filter(|w| w.state == state).count()
    }
}

/// Copy of the whole simulation after a tick.
#[derive(Clone, Debug, PartialEq)]
pub struct SimSnapshot {
    /// Ticks executed so far.
    pub tick: TickId,
    /// Simulated time of the last tick.
    pub now: Timestamp,
    /// Ids of queued requests, head first.
    pub queue: Vec<RequestId>,
    /// Worker pool state.
    pub pool: PoolSnapshot,
    /// Free core tokens.
    pub free_cores: usize,
    /// Total core tokens.
    pub cores: usize,
    /// Tasks waiting in the allocator's own queue.
    pub core_queue_len: usize,
    /// Metrics of the last tick.
    pub last_metrics: TickMetrics,
    /// Cumulative counters.
    pub totals: SimTotals,
}

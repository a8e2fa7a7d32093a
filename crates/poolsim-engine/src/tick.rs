//! The scheduler tick: one discrete step of the simulation.
//!
//! # Algorithm
//!
//! For every worker, in pool (spawn) order:
//!
//! 1. **Deadlines.** A Starting worker whose startup deadline has passed
//!    becomes Idle. A Busy worker whose processing deadline has passed
//!    completes its request, releases its core token and becomes Idle.
//! 2. **Assignment.** If the worker is now Idle and the queue is not
//!    empty, the head request is admitted on it. With core contention
//!    enabled the worker must also win a core token; if none is free the
//!    request stays at the queue head and no further assignment is
//!    attempted this tick.
//!
//! Then, once per tick:
//!
//! 3. **Reaping.** Surplus idle workers are despawned (over-max shrink,
//!    idle-despawn threshold), never below `min_workers`.
//! 4. **Autoscale** (opt-in). If requests are still queued and no worker
//!    is Idle or Starting, one worker is spawned.
//!
//! Because a worker completes before it is considered for assignment, a
//! worker whose deadline passed picks up the next request in the same tick.
//! Ties between workers are broken by spawn order, which makes a tick fully
//! deterministic given the same clock and duration source.

use std::fmt;

use poolsim_core::{
    AllocatorError, CoreTask, DurationSource, PoolError, RequestId, TickId, Timestamp,
};
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::allocator::CoreAllocator;
use crate::metrics::TickMetrics;
use crate::pool::WorkerPool;
use crate::queue::RequestQueue;
use crate::worker::WorkerState;

/// Mutable state a tick operates on.
pub struct TickContext<'a> {
    /// The tick's notion of "now"; every deadline is compared against it.
    pub now: Timestamp,
    /// Pending requests.
    pub queue: &'a mut RequestQueue,
    /// Workers to advance.
    pub pool: &'a mut WorkerPool,
    /// Shared core tokens.
    pub cores: &'a mut CoreAllocator<CoreTask>,
    /// Source of processing durations for newly admitted requests.
    pub durations: &'a mut dyn DurationSource,
    /// Require a core token for every admitted request.
    pub core_contention: bool,
    /// Spawn on backlog when nothing is Idle or Starting.
    pub autoscale: bool,
}

/// What a tick did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// Counters and gauges for this tick.
    pub metrics: TickMetrics,
    /// Requests completed this tick, in completion order.
    pub completed: SmallVec<[RequestId; 8]>,
}

// ── TickReport ──────────────────────────────────────────────────

/// Result of a successful [`Simulation::tick()`](crate::Simulation::tick).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TickReport {
    /// Sequence number of the tick that just ran (first tick is 1).
    pub tick: TickId,
    /// Clock reading the tick ran at.
    pub now: Timestamp,
    /// Counters and gauges for this tick.
    pub metrics: TickMetrics,
    /// Requests completed this tick, in completion order.
    pub completed: SmallVec<[RequestId; 8]>,
}

// ── TickError ───────────────────────────────────────────────────

/// Error returned from [`Simulation::tick()`](crate::Simulation::tick).
///
/// Only raised when worker and allocator bookkeeping disagree. The tick
/// is abandoned part-way; workers processed before the failure keep
/// their new state.
#[derive(Debug, PartialEq, Eq)]
pub struct TickError {
    /// Tick that failed.
    pub tick: TickId,
    /// The underlying allocator error.
    pub kind: AllocatorError,
}

impl fmt::Display for TickError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tick {}: {}", self.tick.0, self.kind)
    }
}

impl std::error::Error for TickError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

// ── Tick algorithm ──────────────────────────────────────────────

/// Advance every worker by one tick.
///
/// # Errors
///
/// Only a hard allocator error ([`AllocatorError::InvalidToken`]) escapes;
/// it means a worker held a token the allocator never issued. Every other
/// condition is soft and reflected in the returned metrics.
pub fn run(ctx: TickContext<'_>) -> Result<TickOutcome, AllocatorError> {
    let TickContext {
        now,
        queue,
        pool,
        cores,
        durations,
        core_contention,
        autoscale,
    } = ctx;
    let pool_id = pool.id();
    let mut out = TickOutcome::default();
    let mut cores_exhausted = false;

    for idx in 0..pool.len() {
        let worker = &mut pool.workers_mut()[idx];
        match worker.state() {
            WorkerState::Starting => {
                if worker.finish_startup(now) {
                    out.metrics.started += 1;
                    debug!(pool = %pool_id, worker = %worker.id(), "worker ready");
                }
            }
            WorkerState::Busy => {
                if let Some(done) = worker.stop_processing(now) {
                    if let Some(token) = done.token {
                        match cores.release(token) {
                            Ok(_) => {}
                            Err(e) if e.is_fatal() => return Err(e),
                            Err(e) => warn!(worker = %done.worker, "token release: {e}"),
                        }
                    }
                    debug!(
                        pool = %pool_id,
                        worker = %done.worker,
                        request = %done.request.id(),
                        took_ms = done.finished_at.saturating_since(done.started_at),
                        "finished request"
                    );
                    out.metrics.completed += 1;
                    out.completed.push(done.request.id());
                }
            }
            WorkerState::Idle => {}
        }

        if cores_exhausted || !worker.is_idle() {
            continue;
        }
        let Some(request) = queue.pop() else {
            continue;
        };
        let grant = if core_contention {
            Some(&mut *cores)
        } else {
            None
        };
        match pool.admit_at(idx, request, now, durations, grant) {
            Ok(_) => out.metrics.assigned += 1,
            Err(rejected) => {
                let reason = rejected.reason;
                queue.push_front(rejected.request);
                if reason == PoolError::CoresSaturated {
                    out.metrics.core_waits += 1;
                    cores_exhausted = true;
                    trace!(pool = %pool_id, queued = queue.len(), "all cores busy, request held");
                }
            }
        }
    }

    out.metrics.despawned += pool.reap_idle(now);

    if autoscale
        && !queue.is_empty()
        && pool.count(WorkerState::Idle) == 0
        && pool.count(WorkerState::Starting) == 0
        && pool.spawn_worker(now).is_ok()
    {
        out.metrics.spawned += 1;
    }

    out.metrics.queue_len = queue.len();
    out.metrics.idle = pool.count(WorkerState::Idle);
    out.metrics.busy = pool.count(WorkerState::Busy);
    out.metrics.starting = pool.count(WorkerState::Starting);
    out.metrics.free_cores = cores.free_count();
    Ok(out)
}

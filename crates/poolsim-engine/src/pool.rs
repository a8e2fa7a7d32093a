//! Elastic worker pool.
//!
//! [`WorkerPool`] owns a dynamically sized set of [`Worker`]s bounded by
//! `[min_workers, max_workers]` and notifies observers on every
//! structural change (spawn, despawn).
//!
//! # Bounds
//!
//! After any completed operation `min_workers <= len <= max_workers`,
//! with one documented exception: shrinking `max_workers` below the
//! number of busy workers leaves the pool above the new maximum until
//! those workers go idle. [`reap_idle`](WorkerPool::reap_idle), run by
//! every tick, finishes the shrink.
//!
//! # Ordering
//!
//! Workers are kept in spawn order. "First idle worker" always means
//! the earliest-spawned idle worker, for assignment and for despawn.

use poolsim_core::{
    CoreTask, DurationSource, PoolError, PoolId, Request, Timestamp, WorkerId,
};
use std::fmt;
use tracing::{debug, info, warn};

use crate::allocator::CoreAllocator;
use crate::config::{ConfigError, PoolConfig};
use crate::observer::{Subscribers, Subscription};
use crate::snapshot::{PoolSnapshot, WorkerSnapshot};
use crate::worker::{Worker, WorkerState};

/// Structural change notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolEvent {
    /// A worker was added in the Starting state.
    Spawned {
        /// Pool the worker belongs to.
        pool: PoolId,
        /// The new worker.
        worker: WorkerId,
    },
    /// An idle worker was destroyed.
    Despawned {
        /// Pool the worker belonged to.
        pool: PoolId,
        /// The removed worker.
        worker: WorkerId,
    },
}

/// Read-only view of a pool, borrowed from it.
///
/// Worker fields are always live. `revision` only moves on spawn and
/// despawn, so observers can compare it to detect "no structural change"
/// without walking the worker list.
#[derive(Clone, Copy, Debug)]
pub struct PoolState<'a> {
    /// Pool id.
    pub id: PoolId,
    /// Current lower bound.
    pub min_workers: usize,
    /// Current upper bound.
    pub max_workers: usize,
    /// Workers in spawn order.
    pub workers: &'a [Worker],
    /// Structural revision counter.
    pub revision: u64,
}

/// A request the pool could not admit, handed back to the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rejected {
    /// The request, unchanged. Callers usually put it back at the queue head.
    pub request: Request,
    /// Why it was not admitted.
    pub reason: PoolError,
}

impl fmt::Display for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request {} rejected: {}", self.request.id(), self.reason)
    }
}

impl std::error::Error for Rejected {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.reason)
    }
}

/// Dynamically sized, bounded collection of workers.
#[derive(Debug)]
pub struct WorkerPool {
    id: PoolId,
    min_workers: usize,
    max_workers: usize,
    workers: Vec<Worker>,
    startup_ms: u64,
    idle_despawn_threshold_ms: u64,
    next_worker_id: u64,
    revision: u64,
    spawned_total: u64,
    despawned_total: u64,
    subscribers: Subscribers<PoolEvent>,
}

impl WorkerPool {
    /// Create a pool and spawn `config.min_workers` workers at `now`.
    pub fn new(id: PoolId, config: &PoolConfig, now: Timestamp) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut pool = Self {
            id,
            min_workers: config.min_workers,
            max_workers: config.max_workers,
            workers: Vec::with_capacity(config.max_workers),
            startup_ms: config.startup_ms,
            idle_despawn_threshold_ms: config.idle_despawn_threshold_ms,
            next_worker_id: 0,
            revision: 0,
            spawned_total: 0,
            despawned_total: 0,
            subscribers: Subscribers::new(),
        };
        // Cannot hit the maximum: validate() guarantees min <= max.
        for _ in 0..config.min_workers {
            let _ = pool.spawn_worker(now);
        }
        Ok(pool)
    }

    // ── Structural operations ──────────────────────────────────────

    /// Add a worker in the Starting state.
    ///
    /// # Errors
    ///
    /// [`PoolError::MaxWorkersReached`] if the pool is full.
    pub fn spawn_worker(&mut self, now: Timestamp) -> Result<WorkerId, PoolError> {
        if self.workers.len() >= self.max_workers {
            debug!(pool = %self.id, max = self.max_workers, "spawn refused: maximum reached");
            return Err(PoolError::MaxWorkersReached {
                max: self.max_workers,
            });
        }
        let id = WorkerId(self.next_worker_id);
        self.next_worker_id += 1;
        self.workers.push(Worker::spawn(id, now, self.startup_ms));
        self.revision += 1;
        self.spawned_total += 1;
        debug!(pool = %self.id, worker = %id, ready_at = %now.after(self.startup_ms), "spawned worker");
        self.subscribers.emit(&PoolEvent::Spawned {
            pool: self.id,
            worker: id,
        });
        Ok(id)
    }

    /// Remove an idle worker.
    ///
    /// With `Some(id)`, removes that worker if it is idle. With `None`,
    /// removes the first idle worker.
    ///
    /// # Errors
    ///
    /// - [`PoolError::MinWorkersReached`] if the pool holds `min_workers`
    ///   or fewer.
    /// - [`PoolError::WorkerNotFound`] if `id` is unknown.
    /// - [`PoolError::WorkerBusy`] if `id` is Starting or Busy.
    /// - [`PoolError::NoIdleWorker`] if `id` is `None` and nothing is idle.
    pub fn despawn_worker(&mut self, id: Option<WorkerId>) -> Result<WorkerId, PoolError> {
        let result = self.try_despawn(id);
        if let Err(e) = &result {
            warn!(pool = %self.id, "cannot despawn worker: {e}");
        }
        result
    }

    fn try_despawn(&mut self, id: Option<WorkerId>) -> Result<WorkerId, PoolError> {
        if self.workers.len() <= self.min_workers {
            return Err(PoolError::MinWorkersReached {
                min: self.min_workers,
            });
        }
        let idx = match id {
            Some(id) => {
                let idx = self
                    .position(id)
                    .ok_or(PoolError::WorkerNotFound { id })?;
                if !self.workers[idx].can_destroy() {
                    return Err(PoolError::WorkerBusy { id });
                }
                idx
            }
            None => self
                .workers
                .iter()
                .position(Worker::can_destroy)
                .ok_or(PoolError::NoIdleWorker)?,
        };
        Ok(self.remove_at(idx))
    }

    fn remove_at(&mut self, idx: usize) -> WorkerId {
        let worker = self.workers.remove(idx);
        debug_assert!(worker.can_destroy(), "destroyed a non-idle worker");
        let id = worker.id();
        self.revision += 1;
        self.despawned_total += 1;
        debug!(pool = %self.id, worker = %id, completed = worker.completed(), "despawned worker");
        self.subscribers.emit(&PoolEvent::Despawned {
            pool: self.id,
            worker: id,
        });
        id
    }

    // ── Assignment ─────────────────────────────────────────────────

    /// Hand `request` to the first idle worker.
    ///
    /// When `cores` is given, the worker must also win a core token;
    /// the processing duration is drawn from `durations` only once the
    /// request is actually admitted.
    ///
    /// # Errors
    ///
    /// Returns the request inside [`Rejected`] with
    /// [`PoolError::NoIdleWorker`] or [`PoolError::CoresSaturated`].
    pub fn assign_worker(
        &mut self,
        request: Request,
        now: Timestamp,
        durations: &mut dyn DurationSource,
        cores: Option<&mut CoreAllocator<CoreTask>>,
    ) -> Result<WorkerId, Rejected> {
        match self.workers.iter().position(Worker::is_idle) {
            Some(idx) => self.admit_at(idx, request, now, durations, cores),
            None => Err(Rejected {
                request,
                reason: PoolError::NoIdleWorker,
            }),
        }
    }

    /// Admit `request` on the worker at `idx`.
    pub(crate) fn admit_at(
        &mut self,
        idx: usize,
        request: Request,
        now: Timestamp,
        durations: &mut dyn DurationSource,
        mut cores: Option<&mut CoreAllocator<CoreTask>>,
    ) -> Result<WorkerId, Rejected> {
        let pool_id = self.id;
        let worker = &mut self.workers[idx];
        if !worker.is_idle() {
            return Err(Rejected {
                request,
                reason: PoolError::NoIdleWorker,
            });
        }
        let token = match cores.as_deref_mut() {
            Some(cores) => {
                let task = CoreTask::Request {
                    worker: worker.id(),
                    request: request.id(),
                };
                match cores.try_acquire(task) {
                    Ok(token) => Some(token),
                    Err(_) => {
                        return Err(Rejected {
                            request,
                            reason: PoolError::CoresSaturated,
                        })
                    }
                }
            }
            None => None,
        };
        let request_id = request.id();
        let duration_ms = durations.next_duration_ms();
        let accepted = worker.process_request(request, now, duration_ms, token);
        debug_assert!(accepted.is_ok(), "idle worker refused a request");
        debug!(
            pool = %pool_id,
            worker = %worker.id(),
            request = %request_id,
            duration_ms,
            "assigned request"
        );
        Ok(worker.id())
    }

    /// Move every Starting worker whose startup deadline has passed to
    /// Idle. Returns how many became Idle.
    ///
    /// The tick does this per worker as part of its pass; this is for
    /// callers driving a pool without a [`Simulation`](crate::Simulation).
    pub fn finish_startups(&mut self, now: Timestamp) -> u32 {
        let mut started = 0;
        for worker in &mut self.workers {
            if worker.finish_startup(now) {
                started += 1;
            }
        }
        started
    }

    // ── Resizing ───────────────────────────────────────────────────

    /// Set the lower bound, clamped to at least 1, and spawn workers
    /// until it is met. Raises `max_workers` if it would fall below.
    ///
    /// Returns the effective minimum.
    pub fn set_min_workers(&mut self, n: usize, now: Timestamp) -> usize {
        self.min_workers = n.max(1);
        if self.max_workers < self.min_workers {
            self.max_workers = self.min_workers;
        }
        info!(pool = %self.id, min = self.min_workers, "new min workers");
        while self.workers.len() < self.min_workers {
            if self.spawn_worker(now).is_err() {
                break;
            }
        }
        self.min_workers
    }

    /// Set the upper bound, clamped to at least `min_workers`, and
    /// despawn idle workers until it is met.
    ///
    /// Busy and Starting workers are never killed: if too few are idle
    /// the pool stays above the new maximum and later ticks finish the
    /// shrink. Returns the effective maximum.
    pub fn set_max_workers(&mut self, n: usize) -> usize {
        self.max_workers = n.max(self.min_workers);
        info!(pool = %self.id, max = self.max_workers, "new max workers");
        while self.workers.len() > self.max_workers {
            if let Err(e) = self.try_despawn(None) {
                debug!(
                    pool = %self.id,
                    over_by = self.workers.len() - self.max_workers,
                    "shrink deferred: {e}"
                );
                break;
            }
        }
        self.max_workers
    }

    /// Despawn idle workers that are over `max_workers` or have been idle
    /// for at least the idle-despawn threshold, never going below
    /// `min_workers`.
    ///
    /// Returns the number of workers removed.
    pub fn reap_idle(&mut self, now: Timestamp) -> u32 {
        let mut removed = 0;
        while self.workers.len() > self.max_workers {
            if self.try_despawn(None).is_err() {
                break;
            }
            removed += 1;
        }
        let threshold = self.idle_despawn_threshold_ms;
        let mut i = 0;
        while i < self.workers.len() && self.workers.len() > self.min_workers {
            let expired = self.workers[i]
                .idle_for(now)
                .is_some_and(|idle| idle >= threshold);
            if expired {
                self.remove_at(i);
                removed += 1;
            } else {
                i += 1;
            }
        }
        removed
    }

    // ── Observation ────────────────────────────────────────────────

    /// Register an observer for spawn and despawn events.
    pub fn subscribe<F>(&self, callback: F) -> Subscription<PoolEvent>
    where
        F: FnMut(&PoolEvent) + Send + 'static,
    {
        self.subscribers.subscribe(callback)
    }

    /// Borrowed read-only view of the pool.
    pub fn state(&self) -> PoolState<'_> {
        PoolState {
            id: self.id,
            min_workers: self.min_workers,
            max_workers: self.max_workers,
            workers: &self.workers,
            revision: self.revision,
        }
    }

    /// Owned copy of the pool as of `now`.
    pub fn snapshot(&self, now: Timestamp) -> PoolSnapshot {
        PoolSnapshot {
            id: self.id,
            min_workers: self.min_workers,
            max_workers: self.max_workers,
            revision: self.revision,
            workers: self
                .workers
                .iter()
                .map(|w| WorkerSnapshot::capture(w, now))
                .collect(),
        }
    }

    // ── Accessors ──────────────────────────────────────────────────

    /// Pool id.
    pub fn id(&self) -> PoolId {
        self.id
    }

    /// Current lower bound.
    pub fn min_workers(&self) -> usize {
        self.min_workers
    }

    /// Current upper bound.
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Startup time of newly spawned workers.
    pub fn startup_ms(&self) -> u64 {
        self.startup_ms
    }

    /// Change the startup time of workers spawned from now on.
    pub fn set_startup_ms(&mut self, ms: u64) {
        self.startup_ms = ms;
    }

    /// Idle time after which surplus workers are reaped.
    pub fn idle_despawn_threshold_ms(&self) -> u64 {
        self.idle_despawn_threshold_ms
    }

    /// Change the idle-despawn threshold.
    pub fn set_idle_despawn_threshold_ms(&mut self, ms: u64) {
        self.idle_despawn_threshold_ms = ms;
    }

    /// Workers in spawn order.
    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    pub(crate) fn workers_mut(&mut self) -> &mut [Worker] {
        &mut self.workers
    }

    /// The worker with `id`, if present.
    pub fn worker(&self, id: WorkerId) -> Option<&Worker> {
        self.workers.iter().find(|w| w.id() == id)
    }

    fn position(&self, id: WorkerId) -> Option<usize> {
        self.workers.iter().position(|w| w.id() == id)
    }

    /// Number of workers.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Whether the pool holds no workers. Never true for a valid pool.
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Number of workers in `state`.
    pub fn count(&self, state: WorkerState) -> usize {
        self.workers.iter().filter(|w| w.state() == state).count()
    }

    /// Structural revision counter.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Workers spawned over the pool's lifetime.
    pub fn spawned_total(&self) -> u64 {
        self.spawned_total
    }

    /// Workers despawned over the pool's lifetime.
    pub fn despawned_total(&self) -> u64 {
        self.despawned_total
    }
}

//! The simulation context: one queue, one worker pool, one core allocator.
//!
//! [`Simulation`] owns every piece of mutable state and is passed by
//! `&mut` to whatever drives it. There are no globals: two simulations in
//! one process share nothing.
//!
//! # Ownership model
//!
//! `Simulation` is [`Send`] (it can be moved onto a tick thread, see
//! [`RealtimeSimulation`](crate::realtime::RealtimeSimulation)) but not
//! [`Sync`]. Borrowed views such as [`pool_state()`](Simulation::pool_state)
//! tie up `&self`, so a tick cannot run while one is held.

use poolsim_core::{
    AllocatorError, Clock, CoreTask, DurationSource, ManualClock, Payload, PoolError, PoolId,
    Request, RequestId, TickId, Timestamp, TokenIndex, WorkerId,
};
use tracing::debug;

use crate::allocator::CoreAllocator;
use crate::config::{ConfigError, SimConfig};
use crate::duration::source_for;
use crate::generator::RequestGenerator;
use crate::metrics::{SimTotals, TickMetrics};
use crate::observer::Subscription;
use crate::pool::{PoolEvent, PoolState, Rejected, WorkerPool};
use crate::queue::RequestQueue;
use crate::snapshot::SimSnapshot;
use crate::tick::{self, TickContext, TickError, TickReport};

// Compile-time assertion: Simulation is Send.
const _: () = {
    #[allow(dead_code)]
    fn assert_send<T: Send>() {}
    #[allow(dead_code)]
    fn check() {
        assert_send::<Simulation>();
    }
};

/// A complete, single-threaded request-processing simulation.
///
/// # Example
///
/// ```
/// use poolsim_engine::{SimConfig, Simulation};
///
/// let mut sim = Simulation::new(SimConfig::default()).unwrap();
/// sim.generate_request("GET /");
/// for _ in 0..100 {
///     sim.tick(16).unwrap();
/// }
/// ```
pub struct Simulation {
    config: SimConfig,
    queue: RequestQueue,
    pool: WorkerPool,
    cores: CoreAllocator<CoreTask>,
    durations: Box<dyn DurationSource>,
    clock: Box<dyn Clock>,
    generator: RequestGenerator,
    current_tick: TickId,
    last_metrics: TickMetrics,
    totals: SimTotals,
}

impl Simulation {
    /// Build a simulation on virtual time starting at zero, drawing
    /// processing durations from `config.processing` seeded with
    /// `config.seed`.
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        let durations = source_for(&config.processing, config.seed);
        Self::build(config, Box::new(ManualClock::default()), durations)
    }

    /// Build a simulation with an explicit clock and duration source.
    ///
    /// `config.processing` and `config.seed` are ignored.
    pub fn with_sources(
        config: SimConfig,
        clock: impl Clock + 'static,
        durations: impl DurationSource + 'static,
    ) -> Result<Self, ConfigError> {
        Self::build(config, Box::new(clock), Box::new(durations))
    }

    fn build(
        config: SimConfig,
        clock: Box<dyn Clock>,
        durations: Box<dyn DurationSource>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let now = clock.now();
        let pool = WorkerPool::new(PoolId(0), &config.pool, now)?;
        let cores = CoreAllocator::new(config.cores);
        debug!(
            min = config.pool.min_workers,
            max = config.pool.max_workers,
            cores = config.cores,
            "simulation created"
        );
        Ok(Self {
            config,
            queue: RequestQueue::new(),
            pool,
            cores,
            durations,
            clock,
            generator: RequestGenerator::new(),
            current_tick: TickId(0),
            last_metrics: TickMetrics::default(),
            totals: SimTotals::default(),
        })
    }

    // ── Ticking ────────────────────────────────────────────────────

    /// Advance the clock by `elapsed_ms` and run one scheduler tick.
    ///
    /// See [`crate::tick`] for the per-worker algorithm.
    pub fn tick(&mut self, elapsed_ms: u64) -> Result<TickReport, TickError> {
        self.clock.advance(elapsed_ms);
        let now = self.clock.now();
        let next = TickId(self.current_tick.0 + 1);
        let outcome = tick::run(TickContext {
            now,
            queue: &mut self.queue,
            pool: &mut self.pool,
            cores: &mut self.cores,
            durations: &mut *self.durations,
            core_contention: self.config.core_contention,
            autoscale: self.config.pool.autoscale,
        })
        .map_err(|kind| TickError { tick: next, kind })?;

        self.current_tick = next;
        self.totals.record_tick(&outcome.metrics);
        self.last_metrics = outcome.metrics.clone();
        Ok(TickReport {
            tick: next,
            now,
            metrics: outcome.metrics,
            completed: outcome.completed,
        })
    }

    // ── Requests ───────────────────────────────────────────────────

    /// Append a request to the queue.
    pub fn submit(&mut self, request: Request) {
        self.queue.add(request);
        self.totals.submitted += 1;
    }

    /// Append `request` if present. Returns whether anything was queued.
    pub fn submit_opt(&mut self, request: Option<Request>) -> bool {
        match request {
            Some(request) => {
                self.submit(request);
                true
            }
            None => false,
        }
    }

    /// Create a request with the next sequential id and queue it.
    pub fn generate_request(&mut self, payload: impl Into<Payload>) -> RequestId {
        let request = self.generator.generate(payload);
        let id = request.id();
        self.submit(request);
        id
    }

    /// Hand `request` to the first idle worker right away, bypassing the
    /// queue. On failure the request comes back inside the error.
    pub fn assign_request(&mut self, request: Request) -> Result<WorkerId, Rejected> {
        let now = self.clock.now();
        let cores = self.config.core_contention.then_some(&mut self.cores);
        let worker = self
            .pool
            .assign_worker(request, now, &mut *self.durations, cores)?;
        self.totals.submitted += 1;
        self.totals.assigned += 1;
        Ok(worker)
    }

    /// Pending requests.
    pub fn queue(&self) -> &RequestQueue {
        &self.queue
    }

    /// Drop every pending request. Returns how many were dropped.
    ///
    /// Dropped requests no longer count as submitted.
    pub fn clear_queue(&mut self) -> usize {
        let n = self.queue.len();
        self.queue.clear();
        self.totals.submitted = self.totals.submitted.saturating_sub(n as u64);
        n
    }

    // ── Pool ───────────────────────────────────────────────────────

    /// The worker pool.
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Mutable access to the worker pool, for operations not mirrored here.
    pub fn pool_mut(&mut self) -> &mut WorkerPool {
        &mut self.pool
    }

    /// Borrowed read-only view of the pool.
    pub fn pool_state(&self) -> PoolState<'_> {
        self.pool.state()
    }

    /// Spawn a worker at the current time.
    ///
    /// # Errors
    ///
    /// [`PoolError::MaxWorkersReached`] if the pool is full.
    pub fn spawn_worker(&mut self) -> Result<WorkerId, PoolError> {
        let now = self.clock.now();
        self.pool.spawn_worker(now)
    }

    /// Despawn an idle worker. See [`WorkerPool::despawn_worker`].
    ///
    /// # Errors
    ///
    /// Whatever [`WorkerPool::despawn_worker`] refuses with.
    pub fn despawn_worker(&mut self, id: Option<WorkerId>) -> Result<WorkerId, PoolError> {
        self.pool.despawn_worker(id)
    }

    /// See [`WorkerPool::set_min_workers`].
    pub fn set_min_workers(&mut self, n: usize) -> usize {
        let now = self.clock.now();
        self.pool.set_min_workers(n, now)
    }

    /// See [`WorkerPool::set_max_workers`].
    pub fn set_max_workers(&mut self, n: usize) -> usize {
        self.pool.set_max_workers(n)
    }

    /// Register an observer for spawn and despawn events.
    pub fn subscribe<F>(&self, callback: F) -> Subscription<PoolEvent>
    where
        F: FnMut(&PoolEvent) + Send + 'static,
    {
        self.pool.subscribe(callback)
    }

    // ── Cores ──────────────────────────────────────────────────────

    /// The core allocator.
    pub fn cores(&self) -> &CoreAllocator<CoreTask> {
        &self.cores
    }

    /// Queue an external task for a core.
    pub fn enqueue_core_task(&mut self, id: u64) {
        self.cores.enqueue(CoreTask::External { id });
    }

    /// Move the head of the allocator's internal queue onto a free core.
    pub fn dispatch_core_task(&mut self) -> Option<(TokenIndex, CoreTask)> {
        self.cores.try_dispatch().map(|(token, task)| (token, *task))
    }

    /// Free a core held by an external task.
    ///
    /// # Errors
    ///
    /// See [`CoreAllocator::release`]. Tokens held by busy workers are
    /// only released by the tick when the worker completes; asking for
    /// one here returns [`AllocatorError::TokenHeldByWorker`] and leaves
    /// the allocator untouched.
    pub fn release_core_task(&mut self, token: TokenIndex) -> Result<CoreTask, AllocatorError> {
        if let Some(CoreTask::Request { worker, .. }) = self.cores.task(token) {
            return Err(AllocatorError::TokenHeldByWorker {
                index: token,
                worker: *worker,
            });
        }
        self.cores.release(token)
    }

    // ── Inspection ─────────────────────────────────────────────────

    /// Current clock reading.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Number of ticks run so far.
    pub fn current_tick(&self) -> TickId {
        self.current_tick
    }

    /// Metrics of the most recent tick.
    pub fn last_metrics(&self) -> &TickMetrics {
        &self.last_metrics
    }

    /// Cumulative counters, including spawns and despawns outside ticks.
    pub fn totals(&self) -> SimTotals {
        SimTotals {
            spawned: self.pool.spawned_total(),
            despawned: self.pool.despawned_total(),
            ..self.totals.clone()
        }
    }

    /// Configuration the simulation was built from.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Owned copy of the whole simulation state.
    pub fn snapshot(&self) -> SimSnapshot {
        let now = self.clock.now();
        SimSnapshot {
            tick: self.current_tick,
            now,
            queue: self.queue.ids(),
            pool: self.pool.snapshot(now),
            free_cores: self.cores.free_count(),
            cores: self.cores.capacity(),
            core_queue_len: self.cores.queue_len(),
            last_metrics: self.last_metrics.clone(),
            totals: self.totals(),
        }
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("tick", &self.current_tick)
            .field("now", &self.clock.now())
            .field("queue_len", &self.queue.len())
            .field("workers", &self.pool.len())
            .field("free_cores", &self.cores.free_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PoolConfig, ProcessingTime};
    use crate::duration::FixedDuration;
    use crate::worker::WorkerState;

    fn config(min: usize, max: usize) -> SimConfig {
        SimConfig {
            pool: PoolConfig {
                min_workers: min,
                max_workers: max,
                startup_ms: 0,
                idle_despawn_threshold_ms: 10_000,
                autoscale: false,
            },
            processing: ProcessingTime::Fixed { ms: 100 },
            ..SimConfig::default()
        }
    }

    #[test]
    fn new_rejects_invalid_config() {
        let mut c = config(1, 1);
        c.cores = 0;
        assert_eq!(Simulation::new(c).err(), Some(ConfigError::NoCores));
    }

    #[test]
    fn tick_advances_clock_and_counter() {
        let mut sim = Simulation::new(config(1, 1)).unwrap();
        let r = sim.tick(16).unwrap();
        assert_eq!(r.tick, TickId(1));
        assert_eq!(r.now, Timestamp(16));
        assert_eq!(sim.current_tick(), TickId(1));
        assert_eq!(sim.now(), Timestamp(16));
    }

    #[test]
    fn generated_ids_start_at_zero() {
        let mut sim = Simulation::new(config(1, 1)).unwrap();
        assert_eq!(sim.generate_request(""), RequestId(0));
        assert_eq!(sim.generate_request(""), RequestId(1));
        assert_eq!(sim.totals().submitted, 2);
    }

    #[test]
    fn requests_flow_through_to_completion() {
        let mut sim = Simulation::with_sources(
            config(1, 1),
            ManualClock::default(),
            FixedDuration(50),
        )
        .unwrap();
        sim.generate_request("a");
        sim.tick(0).unwrap();
        assert_eq!(sim.pool().count(WorkerState::Busy), 1);
        let r = sim.tick(50).unwrap();
        assert_eq!(r.completed.as_slice(), &[RequestId(0)]);
        let t = sim.totals();
        assert_eq!((t.submitted, t.assigned, t.completed), (1, 1, 1));
        assert_eq!(t.outstanding(), 0);
    }

    #[test]
    fn assign_request_bypasses_queue() {
        let mut sim = Simulation::new(config(1, 1)).unwrap();
        sim.tick(0).unwrap();
        let w = sim.assign_request(Request::new(RequestId(7))).unwrap();
        assert_eq!(w, WorkerId(0));
        let err = sim.assign_request(Request::new(RequestId(8))).unwrap_err();
        assert_eq!(err.request.id(), RequestId(8));
        assert!(sim.queue().is_empty());
    }

    #[test]
    fn external_core_tasks_share_tokens_with_workers() {
        let mut c = config(1, 1);
        c.cores = 1;
        let mut sim = Simulation::new(c).unwrap();
        sim.enqueue_core_task(42);
        let (token, task) = sim.dispatch_core_task().unwrap();
        assert_eq!(task, CoreTask::External { id: 42 });

        sim.generate_request("x");
        let r = sim.tick(0).unwrap();
        assert_eq!(r.metrics.core_waits, 1);
        assert_eq!(sim.queue().len(), 1);

        assert_eq!(sim.release_core_task(token), Ok(task));
        let r = sim.tick(1).unwrap();
        assert_eq!(r.metrics.assigned, 1);
    }

    #[test]
    fn totals_include_spawns_outside_ticks() {
        let mut sim = Simulation::new(config(1, 3)).unwrap();
        assert_eq!(sim.spawn_worker(), Ok(WorkerId(1)));
        assert_eq!(sim.totals().spawned, 2);
    }

    #[test]
    fn spawn_and_despawn_report_refusal_reason() {
        let mut sim = Simulation::new(config(1, 1)).unwrap();
        assert_eq!(
            sim.spawn_worker(),
            Err(PoolError::MaxWorkersReached { max: 1 })
        );
        assert_eq!(
            sim.despawn_worker(None),
            Err(PoolError::MinWorkersReached { min: 1 })
        );
    }

    #[test]
    fn worker_tokens_cannot_be_released_externally() {
        let mut c = config(3, 3);
        c.cores = 1;
        let mut sim = Simulation::new(c).unwrap();
        for _ in 0..3 {
            sim.generate_request("r");
        }
        sim.tick(0).unwrap();
        let busy = sim.pool().worker(WorkerId(0)).unwrap();
        assert_eq!(busy.token(), Some(TokenIndex(0)));

        assert_eq!(
            sim.release_core_task(TokenIndex(0)),
            Err(AllocatorError::TokenHeldByWorker {
                index: TokenIndex(0),
                worker: WorkerId(0),
            })
        );
        assert!(sim.cores().is_assigned(TokenIndex(0)));

        sim.tick(1).unwrap();
        assert_eq!(sim.pool().count(WorkerState::Busy), 1);
        sim.tick(100).unwrap();
        assert_eq!(sim.pool().count(WorkerState::Busy), 1);
        assert_eq!(sim.cores().assigned_count(), 1);
        assert_eq!(sim.cores().free_count(), 0);
    }

    #[test]
    fn snapshot_reflects_state() {
        let mut sim = Simulation::new(config(2, 4)).unwrap();
        sim.generate_request("a");
        sim.generate_request("b");
        sim.generate_request("c");
        sim.tick(0).unwrap();
        let snap = sim.snapshot();
        assert_eq!(snap.tick, TickId(1));
        assert_eq!(snap.queue, vec![RequestId(2)]);
        assert_eq!(snap.pool.count(WorkerState::Busy), 2);
        assert_eq!(snap.free_cores, 6);
        assert_eq!(snap.cores, 8);
    }
}

//! Background tick loop for realtime mode.
//!
//! The tick thread owns the [`Simulation`] exclusively (moved in via
//! `thread::Builder::spawn`). Commands arrive over a bounded crossbeam
//! channel and are applied between ticks; after each tick an owned
//! [`SimSnapshot`] is published for readers on other threads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use poolsim_core::{Request, WorkerId};
use tracing::{debug, error, info};

use crate::simulation::Simulation;
use crate::snapshot::SimSnapshot;

/// An operation forwarded to the tick thread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Queue a request.
    Submit(Request),
    /// See [`WorkerPool::set_min_workers`](crate::WorkerPool::set_min_workers).
    SetMinWorkers(usize),
    /// See [`WorkerPool::set_max_workers`](crate::WorkerPool::set_max_workers).
    SetMaxWorkers(usize),
    /// Spawn one worker.
    SpawnWorker,
    /// Despawn a specific worker, or the first idle one.
    DespawnWorker(Option<WorkerId>),
}

/// State held by the tick thread's main loop.
pub(crate) struct TickThreadState {
    sim: Simulation,
    cmd_rx: Receiver<Command>,
    shutdown_flag: Arc<AtomicBool>,
    tick_stopped: Arc<AtomicBool>,
    latest: Arc<Mutex<SimSnapshot>>,
    tick_budget: Duration,
}

impl TickThreadState {
    pub fn new(
        sim: Simulation,
        cmd_rx: Receiver<Command>,
        shutdown_flag: Arc<AtomicBool>,
        tick_stopped: Arc<AtomicBool>,
        latest: Arc<Mutex<SimSnapshot>>,
        tick_rate_hz: f64,
    ) -> Self {
        Self {
            sim,
            cmd_rx,
            shutdown_flag,
            tick_stopped,
            latest,
            tick_budget: Duration::from_secs_f64(1.0 / tick_rate_hz),
        }
    }

    /// Main tick loop. Runs until `shutdown_flag` is set or a tick fails.
    ///
    /// Consumes self and returns the `Simulation`, with any commands that
    /// were still queued at shutdown applied.
    pub fn run(mut self) -> Simulation {
        info!(budget_us = self.tick_budget.as_micros() as u64, "tick thread started");
        let mut last = Instant::now();
        let mut carry = Duration::ZERO;

        while !self.shutdown_flag.load(Ordering::Acquire) {
            let tick_start = Instant::now();
            self.drain_command_channel();

            // Whole milliseconds go to the clock; the remainder carries over.
            let elapsed = tick_start.duration_since(last) + carry;
            let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
            carry = elapsed.saturating_sub(Duration::from_millis(elapsed_ms));
            last = tick_start;

            match self.sim.tick(elapsed_ms) {
                Ok(_) => self.publish(),
                Err(e) => {
                    error!("tick failed, stopping tick thread: {e}");
                    break;
                }
            }

            if let Some(remaining) = self.tick_budget.checked_sub(tick_start.elapsed()) {
                thread::park_timeout(remaining);
            }
        }

        self.drain_command_channel();
        self.publish();
        self.tick_stopped.store(true, Ordering::Release);
        info!(ticks = self.sim.current_tick().0, "tick thread stopped");
        self.sim
    }

    fn drain_command_channel(&mut self) {
        while let Ok(cmd) = self.cmd_rx.try_recv() {
            self.apply(cmd);
        }
    }

    fn apply(&mut self, cmd: Command) {
        debug!(?cmd, "applying command");
        match cmd {
            Command::Submit(request) => self.sim.submit(request),
            Command::SetMinWorkers(n) => {
                self.sim.set_min_workers(n);
            }
            Command::SetMaxWorkers(n) => {
                self.sim.set_max_workers(n);
            }
            Command::SpawnWorker => {
                if let Err(e) = self.sim.spawn_worker() {
                    debug!(%e, "spawn command refused");
                }
            }
            Command::DespawnWorker(id) => {
                if let Err(e) = self.sim.despawn_worker(id) {
                    debug!(%e, "despawn command refused");
                }
            }
        }
    }

    fn publish(&self) {
        let snapshot = self.sim.snapshot();
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }
}

//! Realtime mode: a [`Simulation`] ticking on its own thread.
//!
//! # Architecture
//!
//! ```text
//! User Thread(s)                    Tick Thread
//!     |                                 |
//!     |--submit()/set_*()-------------->| cmd_rx.try_recv()
//!     |   [cmd_tx: bounded(capacity)]   | sim.apply(command)
//!     |                                 | sim.tick(elapsed_ms)
//!     |<--latest_snapshot()-------------| publish SimSnapshot
//!     |   [Arc<Mutex<SimSnapshot>>]     | park(budget - elapsed)
//! ```
//!
//! Every pool and allocator mutation happens on the tick thread, so the
//! simulation itself needs no locking. Callers only ever see owned
//! snapshots.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Sender, TrySendError};
use poolsim_core::{Request, WorkerId};
use tracing::{info, warn};

use crate::config::{ConfigError, RealtimeConfig};
use crate::simulation::Simulation;
use crate::snapshot::SimSnapshot;
use crate::tick_thread::TickThreadState;

pub use crate::tick_thread::Command;

// ── SubmitError ──────────────────────────────────────────────────

/// Error sending a command to the tick thread.
#[derive(Debug, PartialEq, Eq)]
pub enum SubmitError {
    /// The tick thread has shut down.
    Shutdown,
    /// The command channel is full (back-pressure).
    ChannelFull,
}

impl std::fmt::Display for SubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Shutdown => write!(f, "tick thread has shut down"),
            Self::ChannelFull => write!(f, "command channel full"),
        }
    }
}

impl std::error::Error for SubmitError {}

// ── RealtimeSimulation ───────────────────────────────────────────

/// A simulation driven by a background tick thread at a fixed rate.
///
/// The clock of the wrapped simulation is advanced by the measured wall
/// time between ticks, so request durations play out in real time.
pub struct RealtimeSimulation {
    cmd_tx: Option<Sender<Command>>,
    shutdown_flag: Arc<AtomicBool>,
    tick_stopped: Arc<AtomicBool>,
    latest: Arc<Mutex<SimSnapshot>>,
    tick_thread: Option<JoinHandle<Simulation>>,
    config: RealtimeConfig,
}

impl RealtimeSimulation {
    /// Move `sim` onto a new tick thread and start ticking.
    pub fn start(sim: Simulation, config: RealtimeConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let latest = Arc::new(Mutex::new(sim.snapshot()));
        let shutdown_flag = Arc::new(AtomicBool::new(false));
        let tick_stopped = Arc::new(AtomicBool::new(false));
        let (cmd_tx, cmd_rx) = crossbeam_channel::bounded(config.command_capacity);

        let state = TickThreadState::new(
            sim,
            cmd_rx,
            Arc::clone(&shutdown_flag),
            Arc::clone(&tick_stopped),
            Arc::clone(&latest),
            config.tick_rate_hz,
        );
        let tick_thread = thread::Builder::new()
            .name("poolsim-tick".into())
            .spawn(move || state.run())
            .map_err(|e| ConfigError::ThreadSpawnFailed {
                reason: e.to_string(),
            })?;
        info!(tick_rate_hz = config.tick_rate_hz, "realtime simulation started");

        Ok(Self {
            cmd_tx: Some(cmd_tx),
            shutdown_flag,
            tick_stopped,
            latest,
            tick_thread: Some(tick_thread),
            config,
        })
    }

    /// Send a command without blocking.
    pub fn send(&self, cmd: Command) -> Result<(), SubmitError> {
        if self.tick_stopped.load(Ordering::Acquire) {
            return Err(SubmitError::Shutdown);
        }
        let tx = self.cmd_tx.as_ref().ok_or(SubmitError::Shutdown)?;
        tx.try_send(cmd).map_err(|e| match e {
            TrySendError::Full(_) => SubmitError::ChannelFull,
            TrySendError::Disconnected(_) => SubmitError::Shutdown,
        })
    }

    /// Queue a request.
    pub fn submit(&self, request: Request) -> Result<(), SubmitError> {
        self.send(Command::Submit(request))
    }

    /// Change the pool's lower bound.
    pub fn set_min_workers(&self, n: usize) -> Result<(), SubmitError> {
        self.send(Command::SetMinWorkers(n))
    }

    /// Change the pool's upper bound.
    pub fn set_max_workers(&self, n: usize) -> Result<(), SubmitError> {
        self.send(Command::SetMaxWorkers(n))
    }

    /// Spawn one worker.
    pub fn spawn_worker(&self) -> Result<(), SubmitError> {
        self.send(Command::SpawnWorker)
    }

    /// Despawn `id`, or the first idle worker.
    pub fn despawn_worker(&self, id: Option<WorkerId>) -> Result<(), SubmitError> {
        self.send(Command::DespawnWorker(id))
    }

    /// Copy of the state published after the most recent tick.
    pub fn latest_snapshot(&self) -> SimSnapshot {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether the tick thread is still running.
    pub fn is_running(&self) -> bool {
        !self.tick_stopped.load(Ordering::Acquire)
    }

    /// The configuration this instance was started with.
    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    /// Stop the tick thread and take the simulation back.
    ///
    /// Commands still in the channel are applied first. Returns `None`
    /// if the tick thread panicked.
    pub fn shutdown(mut self) -> Option<Simulation> {
        self.stop()
    }

    fn stop(&mut self) -> Option<Simulation> {
        self.shutdown_flag.store(true, Ordering::Release);
        let handle = self.tick_thread.take()?;
        // Wake the thread if it is parked in a budget sleep.
        handle.thread().unpark();
        self.cmd_tx.take();
        match handle.join() {
            Ok(sim) => Some(sim),
            Err(_) => {
                warn!("tick thread panicked");
                None
            }
        }
    }
}

impl Drop for RealtimeSimulation {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PoolConfig, ProcessingTime, SimConfig};
    use poolsim_core::RequestId;
    use std::time::{Duration, Instant};

    fn sim() -> Simulation {
        Simulation::new(SimConfig {
            pool: PoolConfig {
                min_workers: 2,
                max_workers: 4,
                startup_ms: 0,
                ..PoolConfig::default()
            },
            processing: ProcessingTime::Fixed { ms: 5 },
            ..SimConfig::default()
        })
        .unwrap()
    }

    fn fast() -> RealtimeConfig {
        RealtimeConfig {
            tick_rate_hz: 500.0,
            command_capacity: 16,
        }
    }

    fn wait_for(rt: &RealtimeSimulation, pred: impl Fn(&SimSnapshot) -> bool) -> SimSnapshot {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let snap = rt.latest_snapshot();
            if pred(&snap) || Instant::now() > deadline {
                return snap;
            }
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn rejects_invalid_config() {
        let cfg = RealtimeConfig {
            tick_rate_hz: 0.0,
            ..RealtimeConfig::default()
        };
        assert!(matches!(
            RealtimeSimulation::start(sim(), cfg),
            Err(ConfigError::InvalidTickRate { .. })
        ));
    }

    #[test]
    fn submitted_requests_complete() {
        let rt = RealtimeSimulation::start(sim(), fast()).unwrap();
        for i in 0..4 {
            rt.submit(Request::new(RequestId(i))).unwrap();
        }
        let snap = wait_for(&rt, |s| s.totals.completed == 4);
        assert_eq!(snap.totals.completed, 4);
        assert!(snap.tick.0 > 0);

        let sim = rt.shutdown().unwrap();
        assert_eq!(sim.totals().completed, 4);
    }

    #[test]
    fn resize_commands_reach_the_pool() {
        let rt = RealtimeSimulation::start(sim(), fast()).unwrap();
        rt.set_max_workers(6).unwrap();
        rt.set_min_workers(5).unwrap();
        let snap = wait_for(&rt, |s| s.pool.workers.len() == 5);
        assert_eq!(snap.pool.min_workers, 5);
        assert_eq!(snap.pool.max_workers, 6);
        drop(rt);
    }

    #[test]
    fn shutdown_applies_pending_commands() {
        let rt = RealtimeSimulation::start(sim(), fast()).unwrap();
        rt.spawn_worker().unwrap();
        let sim = rt.shutdown().unwrap();
        assert_eq!(sim.pool().len(), 3);
    }

    #[test]
    fn display_messages() {
        assert_eq!(SubmitError::Shutdown.to_string(), "tick thread has shut down");
        assert_eq!(SubmitError::ChannelFull.to_string(), "command channel full");
    }
}

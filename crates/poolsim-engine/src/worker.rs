//! Worker lifecycle state machine.
//!
//! ```text
//! spawn ──► Starting ──(deadline)──► Idle ◄──(deadline)── Busy
//!                                     │  └──process_request──►┘
//!                                     └──► destroyed (pool despawn)
//! ```
//!
//! A worker never transitions on its own: the scheduler tick checks the
//! deadline and calls [`Worker::finish_startup`] or
//! [`Worker::stop_processing`]. Only Idle workers may be destroyed.

use std::fmt;

use poolsim_core::{Request, Timestamp, TokenIndex, WorkerId};

/// Lifecycle phase of a [`Worker`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorkerState {
    /// Booting; becomes Idle once its startup deadline passes.
    Starting,
    /// Ready to accept exactly one request.
    Idle,
    /// Processing a request until its deadline passes.
    Busy,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => write!(f, "starting"),
            Self::Idle => write!(f, "idle"),
            Self::Busy => write!(f, "busy"),
        }
    }
}

/// A request a worker has finished processing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Completion {
    /// The worker that processed the request.
    pub worker: WorkerId,
    /// The finished request.
    pub request: Request,
    /// Core token held while busy, to be returned to the allocator.
    pub token: Option<TokenIndex>,
    /// When processing began.
    pub started_at: Timestamp,
    /// The tick time at which completion was observed.
    pub finished_at: Timestamp,
}

/// One unit of simulated processing capacity.
#[derive(Clone, Debug)]
pub struct Worker {
    id: WorkerId,
    state: WorkerState,
    current_request: Option<Request>,
    processing_started_at: Option<Timestamp>,
    processing_deadline: Option<Timestamp>,
    state_since: Timestamp,
    token: Option<TokenIndex>,
    completed: u64,
}

impl Worker {
    /// A new worker in [`WorkerState::Starting`], ready at `now + startup_ms`.
    pub fn spawn(id: WorkerId, now: Timestamp, startup_ms: u64) -> Self {
        Self {
            id,
            state: WorkerState::Starting,
            current_request: None,
            processing_started_at: Some(now),
            processing_deadline: Some(now.after(startup_ms)),
            state_since: now,
            token: None,
            completed: 0,
        }
    }

    /// Leave Starting if the startup deadline has passed.
    ///
    /// Returns `true` if the worker became Idle.
    pub fn finish_startup(&mut self, now: Timestamp) -> bool {
        if self.state != WorkerState::Starting || !self.is_due(now) {
            return false;
        }
        self.state = WorkerState::Idle;
        self.processing_started_at = None;
        self.processing_deadline = None;
        self.state_since = now;
        true
    }

    /// Accept `request`, becoming Busy until `now + duration_ms`.
    ///
    /// `token` is the core token granted for the duration of the work,
    /// if the simulation models core contention.
    ///
    /// # Errors
    ///
    /// Hands `request` back unchanged if the worker is not Idle.
    pub fn process_request(
        &mut self,
        request: Request,
        now: Timestamp,
        duration_ms: u64,
        token: Option<TokenIndex>,
    ) -> Result<(), Request> {
        if self.state != WorkerState::Idle {
            return Err(request);
        }
        self.state = WorkerState::Busy;
        self.current_request = Some(request);
        self.processing_started_at = Some(now);
        self.processing_deadline = Some(now.after(duration_ms));
        self.state_since = now;
        self.token = token;
        Ok(())
    }

    /// Finish the current request if its deadline has passed.
    ///
    /// Returns `None` (and changes nothing) if the worker is not Busy or
    /// the deadline is still ahead. The returned [`Completion`] carries
    /// the core token, which the caller must release.
    pub fn stop_processing(&mut self, now: Timestamp) -> Option<Completion> {
        if self.state != WorkerState::Busy || !self.is_due(now) {
            return None;
        }
        let request = self.current_request.take()?;
        let started_at = self.processing_started_at.take().unwrap_or(now);
        self.processing_deadline = None;
        self.state = WorkerState::Idle;
        self.state_since = now;
        self.completed += 1;
        Some(Completion {
            worker: self.id,
            request,
            token: self.token.take(),
            started_at,
            finished_at: now,
        })
    }

    /// Whether the current deadline (startup or processing) has passed.
    pub fn is_due(&self, now: Timestamp) -> bool {
        self.processing_deadline.is_some_and(|d| now >= d)
    }

    /// Only Idle workers may be destroyed.
    pub fn can_destroy(&self) -> bool {
        self.state == WorkerState::Idle
    }

    /// Worker id.
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Current lifecycle phase.
    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Shorthand for `state() == Idle`.
    pub fn is_idle(&self) -> bool {
        self.state == WorkerState::Idle
    }

    /// The request being processed, if Busy.
    pub fn current_request(&self) -> Option<&Request> {
        self.current_request.as_ref()
    }

    /// Start of the current startup or processing phase.
    pub fn processing_started_at(&self) -> Option<Timestamp> {
        self.processing_started_at
    }

    /// Deadline of the current startup or processing phase.
    pub fn processing_deadline(&self) -> Option<Timestamp> {
        self.processing_deadline
    }

    /// Core token held while Busy.
    pub fn token(&self) -> Option<TokenIndex> {
        self.token
    }

    /// Number of requests this worker has completed.
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Milliseconds spent in the current state as of `now`.
    pub fn time_in_state(&self, now: Timestamp) -> u64 {
        now.saturating_since(self.state_since)
    }

    /// Milliseconds the worker has been Idle as of `now`, if Idle.
    pub fn idle_for(&self, now: Timestamp) -> Option<u64> {
        self.is_idle().then(|| self.time_in_state(now))
    }

    /// Fraction of the current phase elapsed, clamped to `[0, 1]`.
    ///
    /// Idle workers report 0. A zero-length phase reports 1.
    pub fn progress(&self, now: Timestamp) -> f64 {
        match (self.processing_started_at, self.processing_deadline) {
            (Some(start), Some(end)) => {
                let total = end.saturating_since(start);
                if total == 0 {
                    return 1.0;
                }
                (now.saturating_since(start) as f64 / total as f64).min(1.0)
            }
            _ => 0.0,
        }
    }
}

//! Simulation engine for the poolsim request-processing simulator.
//!
//! Provides the request queue, the fixed-token [`CoreAllocator`], the
//! [`Worker`] state machine, the elastic [`WorkerPool`] with its observer
//! channel, and the scheduler [`tick`] that ties them together inside a
//! [`Simulation`] context. [`RealtimeSimulation`] runs the same context
//! on a background thread at a fixed rate.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod allocator;
pub mod config;
pub mod duration;
pub mod generator;
pub mod metrics;
pub mod observer;
pub mod pool;
pub mod queue;
pub mod realtime;
pub mod simulation;
pub mod snapshot;
pub mod tick;
pub(crate) mod tick_thread;
pub mod worker;

pub use allocator::{CoreAllocator, DEFAULT_CORES};
pub use config::{ConfigError, PoolConfig, ProcessingTime, RealtimeConfig, SimConfig};
pub use duration::{FixedDuration, UniformDuration};
pub use generator::{BernoulliArrivals, RequestGenerator};
pub use metrics::{SimTotals, TickMetrics};
pub use observer::{Subscribers, Subscription};
pub use pool::{PoolEvent, PoolState, Rejected, WorkerPool};
pub use queue::RequestQueue;
pub use realtime::{Command, RealtimeSimulation, SubmitError};
pub use simulation::Simulation;
pub use snapshot::{PoolSnapshot, SimSnapshot, WorkerSnapshot};
pub use tick::{TickError, TickReport};
pub use worker::{Completion, Worker, WorkerState};

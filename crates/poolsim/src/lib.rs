//! Poolsim: a tick-driven simulator of an elastic worker pool.
//!
//! Requests wait in a FIFO queue and are handed to workers that go
//! through a Starting, Idle, Busy lifecycle. The pool grows and shrinks
//! between configured bounds, and a fixed set of core tokens limits how
//! many workers may be busy at once.
//!
//! This is the facade crate that re-exports the public API from the
//! poolsim sub-crates. For most users, adding `poolsim` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use poolsim::prelude::*;
//!
//! let config = SimConfig {
//!     pool: PoolConfig {
//!         min_workers: 1,
//!         max_workers: 3,
//!         startup_ms: 0,
//!         ..PoolConfig::default()
//!     },
//!     processing: ProcessingTime::Fixed { ms: 100 },
//!     ..SimConfig::default()
//! };
//! let mut sim = Simulation::new(config).unwrap();
//! sim.submit(Request::new(RequestId(1)));
//! sim.submit(Request::new(RequestId(2)));
//!
//! let report = sim.tick(0).unwrap();
//! assert_eq!(report.metrics.assigned, 1);
//! assert_eq!(sim.queue().len(), 1);
//!
//! let report = sim.tick(100).unwrap();
//! assert_eq!(report.completed.as_slice(), &[RequestId(1)]);
//! assert_eq!(sim.queue().len(), 0);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `poolsim-core` | IDs, timestamps, requests, errors, `Clock` and `DurationSource` |
//! | [`engine`] | `poolsim-engine` | Queue, allocator, workers, pool, tick, `Simulation`, realtime mode |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits, and IDs (`poolsim-core`).
pub use poolsim_core as types;

/// Simulation engine (`poolsim-engine`).
///
/// [`engine::Simulation`] for caller-driven ticking,
/// [`engine::RealtimeSimulation`] for a background tick thread.
pub use poolsim_engine as engine;

/// Common imports for typical poolsim usage.
///
/// ```rust
/// use poolsim::prelude::*;
/// ```
pub mod prelude {
    // Core types and traits
    pub use poolsim_core::{
        Clock, CoreTask, DurationSource, ManualClock, Payload, PoolId, Request, RequestId, TickId,
        Timestamp, TokenIndex, WallClock, WorkerId,
    };

    // Errors
    pub use poolsim_core::{AllocatorError, PoolError};
    pub use poolsim_engine::{ConfigError, Rejected, SubmitError, TickError};

    // Engine
    pub use poolsim_engine::{
        CoreAllocator, PoolConfig, PoolEvent, ProcessingTime, RealtimeConfig, RealtimeSimulation,
        RequestGenerator, RequestQueue, SimConfig, SimSnapshot, Simulation, TickMetrics,
        TickReport, WorkerPool, WorkerState,
    };
}

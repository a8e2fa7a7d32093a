//! Benchmark profiles and load drivers for the poolsim simulator.
//!
//! Provides pre-built [`SimConfig`] profiles for benchmarking and examples:
//!
//! - [`reference_profile`]: the default cluster (1..8 workers, 8 cores)
//! - [`stress_profile`]: 64 workers contending for 8 cores, autoscaling
//! - [`drive`]: run ticks with seeded Bernoulli arrivals

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use poolsim_engine::{
    BernoulliArrivals, ConfigError, PoolConfig, ProcessingTime, SimConfig, SimTotals, Simulation,
    TickError,
};

/// Frame delta used by the drivers, matching a 60 Hz host loop.
pub const FRAME_MS: u64 = 16;

/// The default cluster: 1..8 workers, 8 cores, 0..2000 ms jobs.
///
/// Workers start instantly so the first tick already assigns work.
pub fn reference_profile(seed: u64) -> SimConfig {
    SimConfig {
        pool: PoolConfig {
            startup_ms: 0,
            autoscale: true,
            ..PoolConfig::default()
        },
        seed,
        ..SimConfig::default()
    }
}

/// Many workers, few cores: exercises the saturation path every tick.
pub fn stress_profile(seed: u64) -> SimConfig {
    SimConfig {
        pool: PoolConfig {
            min_workers: 16,
            max_workers: 64,
            startup_ms: 50,
            idle_despawn_threshold_ms: 2_000,
            autoscale: true,
        },
        cores: 8,
        core_contention: true,
        processing: ProcessingTime::Uniform {
            min_ms: 20,
            max_ms: 400,
        },
        seed,
    }
}

/// Run `ticks` frames of [`FRAME_MS`], generating a request with
/// probability `arrival_probability` before each one.
///
/// Returns the simulation's totals afterwards.
pub fn drive(
    sim: &mut Simulation,
    ticks: u32,
    arrival_probability: f64,
    seed: u64,
) -> Result<SimTotals, DriveError> {
    let mut arrivals = BernoulliArrivals::new(arrival_probability, seed)?;
    for _ in 0..ticks {
        if arrivals.arrives() {
            sim.generate_request("bench");
        }
        sim.tick(FRAME_MS)?;
    }
    Ok(sim.totals())
}

/// Failure while driving a benchmark simulation.
#[derive(Debug)]
pub enum DriveError {
    /// The arrival probability was rejected.
    Config(ConfigError),
    /// A tick failed.
    Tick(TickError),
}

impl std::fmt::Display for DriveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Tick(e) => write!(f, "tick: {e}"),
        }
    }
}

impl std::error::Error for DriveError {}

impl From<ConfigError> for DriveError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<TickError> for DriveError {
    fn from(e: TickError) -> Self {
        Self::Tick(e)
    }
}

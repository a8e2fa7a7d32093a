//! Simulation configuration, validation, and error types.
//!
//! [`SimConfig`] is the builder input for a [`Simulation`](crate::Simulation).
//! [`validate()`](SimConfig::validate) checks structural invariants once at
//! construction; runtime resizing through
//! [`WorkerPool::set_min_workers`](crate::WorkerPool::set_min_workers) and
//! [`WorkerPool::set_max_workers`](crate::WorkerPool::set_max_workers)
//! clamps instead of failing.

use std::error::Error;
use std::fmt;

use crate::allocator::DEFAULT_CORES;

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected during configuration validation.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// `min_workers` is zero.
    MinWorkersZero,
    /// `max_workers` is below `min_workers`.
    MaxBelowMin {
        /// Configured minimum.
        min: usize,
        /// Configured maximum.
        max: usize,
    },
    /// The core allocator was configured with zero cores.
    NoCores,
    /// A uniform processing-time range has `min_ms > max_ms`.
    InvalidProcessingRange {
        /// Lower bound.
        min_ms: u64,
        /// Upper bound.
        max_ms: u64,
    },
    /// `tick_rate_hz` is NaN, infinite, zero, or negative.
    InvalidTickRate {
        /// The invalid value.
        value: f64,
    },
    /// The realtime command channel capacity is zero.
    CommandCapacityZero,
    /// Arrival probability outside `[0, 1]`.
    InvalidArrivalProbability {
        /// The invalid value.
        value: f64,
    },
    /// A background thread could not be spawned.
    ThreadSpawnFailed {
        /// Description of the failure.
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MinWorkersZero => write!(f, "min_workers must be at least 1"),
            Self::MaxBelowMin { min, max } => {
                write!(f, "max_workers {max} is below min_workers {min}")
            }
            Self::NoCores => write!(f, "cores must be at least 1"),
            Self::InvalidProcessingRange { min_ms, max_ms } => {
                write!(f, "processing range [{min_ms}, {max_ms}] ms is empty")
            }
            Self::InvalidTickRate { value } => {
                write!(f, "tick_rate_hz must be finite and positive, got {value}")
            }
            Self::CommandCapacityZero => write!(f, "command_capacity must be at least 1"),
            Self::InvalidArrivalProbability { value } => {
                write!(f, "arrival probability must be within [0, 1], got {value}")
            }
            Self::ThreadSpawnFailed { reason } => write!(f, "thread spawn failed: {reason}"),
        }
    }
}

impl Error for ConfigError {}

// ── PoolConfig ─────────────────────────────────────────────────────

/// Bounds and timing of an elastic worker pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Lower bound on pool size; also the number of workers spawned at
    /// construction. Default: 1.
    pub min_workers: usize,
    /// Upper bound on pool size. Default: 8.
    pub max_workers: usize,
    /// Milliseconds a new worker spends Starting. Default: 500.
    pub startup_ms: u64,
    /// Idle workers idle for at least this long are despawned while the
    /// pool is above `min_workers`. `u64::MAX` disables reaping.
    /// Default: 10 000.
    pub idle_despawn_threshold_ms: u64,
    /// Spawn one worker per tick while requests are queued and no
    /// worker is Idle or Starting. Default: off.
    pub autoscale: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_workers: 1,
            max_workers: 8,
            startup_ms: 500,
            idle_despawn_threshold_ms: 10_000,
            autoscale: false,
        }
    }
}

impl PoolConfig {
    /// Check `1 <= min_workers <= max_workers`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_workers == 0 {
            return Err(ConfigError::MinWorkersZero);
        }
        if self.max_workers < self.min_workers {
            return Err(ConfigError::MaxBelowMin {
                min: self.min_workers,
                max: self.max_workers,
            });
        }
        Ok(())
    }
}

// ── ProcessingTime ─────────────────────────────────────────────────

/// Distribution of per-request processing durations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessingTime {
    /// Every request takes exactly `ms`.
    Fixed {
        /// Duration in milliseconds.
        ms: u64,
    },
    /// Uniform over `[min_ms, max_ms]` inclusive.
    Uniform {
        /// Lower bound in milliseconds.
        min_ms: u64,
        /// Upper bound in milliseconds.
        max_ms: u64,
    },
}

impl Default for ProcessingTime {
    fn default() -> Self {
        Self::Uniform {
            min_ms: 0,
            max_ms: 2_000,
        }
    }
}

impl ProcessingTime {
    /// Reject empty uniform ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Self::Uniform { min_ms, max_ms } if min_ms > max_ms => {
                Err(ConfigError::InvalidProcessingRange { min_ms, max_ms })
            }
            _ => Ok(()),
        }
    }
}

// ── SimConfig ──────────────────────────────────────────────────────

/// Configuration of a complete [`Simulation`](crate::Simulation).
#[derive(Clone, Debug, PartialEq)]
pub struct SimConfig {
    /// Worker pool bounds and timing.
    pub pool: PoolConfig,
    /// Number of core tokens. Fixed for the simulation's lifetime. Default: 8.
    pub cores: usize,
    /// Require busy workers to hold a core token. Default: true.
    pub core_contention: bool,
    /// Processing-time distribution.
    pub processing: ProcessingTime,
    /// Seed for the default processing-time source.
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            cores: DEFAULT_CORES,
            core_contention: true,
            processing: ProcessingTime::default(),
            seed: 0,
        }
    }
}

impl SimConfig {
    /// Check every structural invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pool.validate()?;
        if self.cores == 0 {
            return Err(ConfigError::NoCores);
        }
        self.processing.validate()
    }
}

// ── RealtimeConfig ─────────────────────────────────────────────────

/// Configuration for [`RealtimeSimulation`](crate::realtime::RealtimeSimulation).
#[derive(Clone, Debug, PartialEq)]
pub struct RealtimeConfig {
    /// Ticks per second of the background loop. Default: 60.
    pub tick_rate_hz: f64,
    /// Capacity of the bounded command channel. Default: 64.
    pub command_capacity: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 60.0,
            command_capacity: 64,
        }
    }
}

impl RealtimeConfig {
    /// Reject unusable tick rates and a zero-capacity channel.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.tick_rate_hz.is_finite() || self.tick_rate_hz <= 0.0 {
            return Err(ConfigError::InvalidTickRate {
                value: self.tick_rate_hz,
            });
        }
        if self.command_capacity == 0 {
            return Err(ConfigError::CommandCapacityZero);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(SimConfig::default().validate(), Ok(()));
        assert_eq!(RealtimeConfig::default().validate(), Ok(()));
    }

    #[test]
    fn default_values_match_reference_setup() {
        let c = SimConfig::default();
        assert_eq!(c.pool.min_workers, 1);
        assert_eq!(c.pool.max_workers, 8);
        assert_eq!(c.pool.startup_ms, 500);
        assert_eq!(c.pool.idle_despawn_threshold_ms, 10_000);
        assert_eq!(c.cores, 8);
        assert_eq!(
            c.processing,
            ProcessingTime::Uniform {
                min_ms: 0,
                max_ms: 2000
            }
        );
    }

    #[test]
    fn min_workers_zero_rejected() {
        let mut c = SimConfig::default();
        c.pool.min_workers = 0;
        assert_eq!(c.validate(), Err(ConfigError::MinWorkersZero));
    }

    #[test]
    fn max_below_min_rejected() {
        let mut c = SimConfig::default();
        c.pool.min_workers = 4;
        c.pool.max_workers = 3;
        assert_eq!(
            c.validate(),
            Err(ConfigError::MaxBelowMin { min: 4, max: 3 })
        );
    }

    #[test]
    fn zero_cores_rejected() {
        let c = SimConfig {
            cores: 0,
            ..SimConfig::default()
        };
        assert_eq!(c.validate(), Err(ConfigError::NoCores));
    }

    #[test]
    fn empty_uniform_range_rejected() {
        let c = SimConfig {
            processing: ProcessingTime::Uniform {
                min_ms: 10,
                max_ms: 5,
            },
            ..SimConfig::default()
        };
        assert_eq!(
            c.validate(),
            Err(ConfigError::InvalidProcessingRange {
                min_ms: 10,
                max_ms: 5
            })
        );
    }

    #[test]
    fn bad_tick_rates_rejected() {
        for value in [0.0, -1.0, f64::INFINITY] {
            let c = RealtimeConfig {
                tick_rate_hz: value,
                ..RealtimeConfig::default()
            };
            assert!(matches!(
                c.validate(),
                Err(ConfigError::InvalidTickRate { .. })
            ));
        }
        let nan = RealtimeConfig {
            tick_rate_hz: f64::NAN,
            ..RealtimeConfig::default()
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn zero_command_capacity_rejected() {
        let c = RealtimeConfig {
            command_capacity: 0,
            ..RealtimeConfig::default()
        };
        assert_eq!(c.validate(), Err(ConfigError::CommandCapacityZero));
    }
}

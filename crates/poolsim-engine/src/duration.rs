//! Processing-time sources.
//!
//! Respects the determinism contract: random sources are seeded
//! ChaCha8 generators, so identical seeds produce identical duration
//! sequences and therefore identical simulations.

use poolsim_core::DurationSource;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::ProcessingTime;

/// Every request takes the same time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedDuration(pub u64);

impl DurationSource for FixedDuration {
    fn next_duration_ms(&mut self) -> u64 {
        self.0
    }
}

/// Durations drawn uniformly from `[min_ms, max_ms]`.
#[derive(Clone, Debug)]
pub struct UniformDuration {
    min_ms: u64,
    max_ms: u64,
    rng: ChaCha8Rng,
}

impl UniformDuration {
    /// A seeded uniform source. Bounds are swapped if given in reverse.
    pub fn new(min_ms: u64, max_ms: u64, seed: u64) -> Self {
        let (min_ms, max_ms) = if min_ms <= max_ms {
            (min_ms, max_ms)
        } else {
            (max_ms, min_ms)
        };
        Self {
            min_ms,
            max_ms,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl DurationSource for UniformDuration {
    fn next_duration_ms(&mut self) -> u64 {
        self.rng.random_range(self.min_ms..=self.max_ms)
    }
}

/// Build the default source for a configured distribution.
pub fn source_for(processing: &ProcessingTime, seed: u64) -> Box<dyn DurationSource> {
    match *processing {
        ProcessingTime::Fixed { ms } => Box::new(FixedDuration(ms)),
        ProcessingTime::Uniform { min_ms, max_ms } => {
            Box::new(UniformDuration::new(min_ms, max_ms, seed))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_is_constant() {
        let mut d = FixedDuration(250);
        assert_eq!(d.next_duration_ms(), 250);
        assert_eq!(d.next_duration_ms(), 250);
    }

    #[test]
    fn uniform_stays_in_range() {
        let mut d = UniformDuration::new(0, 2_000, 7);
        for _ in 0..1_000 {
            assert!(d.next_duration_ms() <= 2_000);
        }
    }

    #[test]
    fn uniform_degenerate_range() {
        let mut d = UniformDuration::new(40, 40, 1);
        assert_eq!(d.next_duration_ms(), 40);
    }

    #[test]
    fn uniform_accepts_reversed_bounds() {
        let mut d = UniformDuration::new(90, 10, 3);
        for _ in 0..100 {
            let v = d.next_duration_ms();
            assert!((10..=90).contains(&v));
        }
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = UniformDuration::new(0, 2_000, 42);
        let mut b = UniformDuration::new(0, 2_000, 42);
        let xs: Vec<u64> = (0..32).map(|_| a.next_duration_ms()).collect();
        let ys: Vec<u64> = (0..32).map(|_| b.next_duration_ms()).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = UniformDuration::new(0, 1_000_000, 1);
        let mut b = UniformDuration::new(0, 1_000_000, 2);
        let xs: Vec<u64> = (0..8).map(|_| a.next_duration_ms()).collect();
        let ys: Vec<u64> = (0..8).map(|_| b.next_duration_ms()).collect();
        assert_ne!(xs, ys);
    }

    #[test]
    fn source_for_matches_config() {
        let mut s = source_for(&ProcessingTime::Fixed { ms: 12 }, 0);
        assert_eq!(s.next_duration_ms(), 12);
    }
}

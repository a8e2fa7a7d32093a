//! Request production: id allocation and seeded arrival processes.

use poolsim_core::{Payload, Request, RequestId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::ConfigError;

/// Hands out requests with strictly increasing ids, starting at 0.
#[derive(Clone, Debug, Default)]
pub struct RequestGenerator {
    next_id: u64,
}

impl RequestGenerator {
    /// A generator whose first id is 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// A generator whose first id is `first`.
    pub fn starting_at(first: u64) -> Self {
        Self { next_id: first }
    }

    /// Next request carrying `payload`.
    pub fn generate(&mut self, payload: impl Into<Payload>) -> Request {
        let id = RequestId(self.next_id);
        self.next_id += 1;
        Request::with_payload(id, payload)
    }

    /// Next request with an empty payload.
    pub fn generate_empty(&mut self) -> Request {
        self.generate(Payload::empty())
    }

    /// Id the next request will get.
    pub fn peek_next_id(&self) -> RequestId {
        RequestId(self.next_id)
    }
}

/// Per-tick Bernoulli arrival process.
///
/// Each call to [`arrives`](Self::arrives) is an independent trial with
/// the configured probability, drawn from a seeded ChaCha8 stream.
#[derive(Clone, Debug)]
pub struct BernoulliArrivals {
    probability: f64,
    rng: ChaCha8Rng,
}

impl BernoulliArrivals {
    /// # Errors
    ///
    /// [`ConfigError::InvalidArrivalProbability`] unless
    /// `0.0 <= probability <= 1.0`.
    pub fn new(probability: f64, seed: u64) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(ConfigError::InvalidArrivalProbability { value: probability });
        }
        Ok(Self {
            probability,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    /// Whether a request arrives in this step.
    pub fn arrives(&mut self) -> bool {
        self.rng.random_bool(self.probability)
    }

    /// Number of arrivals over `steps` independent trials.
    pub fn arrivals_over(&mut self, steps: u32) -> u32 {
        (0..steps).filter(|_| self.arrives()).count() as u32
    }

    /// Configured per-step probability.
    pub fn probability(&self) -> f64 {
        self.probability
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_strictly_increase() {
        let mut g = RequestGenerator::new();
        let a = g.generate_empty();
        let b = g.generate("x");
        let c = g.generate(vec![1u8, 2]);
        assert_eq!(a.id(), RequestId(0));
        assert_eq!(b.id(), RequestId(1));
        assert_eq!(c.id(), RequestId(2));
        assert_eq!(g.peek_next_id(), RequestId(3));
        assert_eq!(b.payload().as_bytes(), b"x");
    }

    #[test]
    fn starting_at_offsets_ids() {
        let mut g = RequestGenerator::starting_at(100);
        assert_eq!(g.generate_empty().id(), RequestId(100));
    }

    #[test]
    fn probability_bounds_checked() {
        assert!(BernoulliArrivals::new(-0.1, 0).is_err());
        assert!(BernoulliArrivals::new(1.5, 0).is_err());
        assert!(BernoulliArrivals::new(f64::NAN, 0).is_err());
        assert!(BernoulliArrivals::new(0.0, 0).is_ok());
    }

    #[test]
    fn certain_and_impossible_arrivals() {
        let mut never = BernoulliArrivals::new(0.0, 1).unwrap();
        let mut always = BernoulliArrivals::new(1.0, 1).unwrap();
        assert_eq!(never.arrivals_over(100), 0);
        assert_eq!(always.arrivals_over(100), 100);
    }

    #[test]
    fn arrivals_are_seed_deterministic() {
        let mut a = BernoulliArrivals::new(0.3, 9).unwrap();
        let mut b = BernoulliArrivals::new(0.3, 9).unwrap();
        let xs: Vec<bool> = (0..64).map(|_| a.arrives()).collect();
        let ys: Vec<bool> = (0..64).map(|_| b.arrives()).collect();
        assert_eq!(xs, ys);
    }
}

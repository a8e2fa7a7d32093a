//! Strongly-typed identifiers.

use std::fmt;

/// Identifies a request produced by a request generator.
///
/// Generators hand these out in strictly increasing order; the engine
/// only relies on uniqueness.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RequestId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Identifies a worker within its owning pool.
///
/// Assigned sequentially by the pool at spawn time and never reused
/// for the lifetime of that pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub u64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

impl From<u64> for WorkerId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Identifies a worker pool within a simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolId(pub u32);

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pool-{}", self.0)
    }
}

impl From<u32> for PoolId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Index of one execution token (core) in a core allocator.
///
/// Valid indices are `0..capacity`. Anything else is rejected by
/// the allocator as an invalid argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenIndex(pub usize);

impl fmt::Display for TokenIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for TokenIndex {
    fn from(v: usize) -> Self {
        Self(v)
    }
}

/// Monotonically increasing tick counter.
///
/// Incremented each time the scheduler advances one step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TickId(pub u64);

impl fmt::Display for TickId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TickId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats() {
        assert_eq!(RequestId(7).to_string(), "7");
        assert_eq!(WorkerId(3).to_string(), "w3");
        assert_eq!(PoolId(1).to_string(), "pool-1");
        assert_eq!(TokenIndex(5).to_string(), "5");
        assert_eq!(TickId(42).to_string(), "42");
    }

    #[test]
    fn ids_order_numerically() {
        assert!(RequestId(1) < RequestId(2));
        assert!(WorkerId(9) < WorkerId(10));
        assert_eq!(TickId::default(), TickId(0));
    }
}

//! Injectable seams used by the engine.

/// Source of per-request processing durations.
///
/// The engine draws one duration each time a worker admits a request.
/// Implementations range from seeded random distributions to scripted
/// sequences in tests; the engine never calls a global RNG.
pub trait DurationSource: Send {
    /// Next processing duration, in milliseconds.
    fn next_duration_ms(&mut self) -> u64;
}

impl<F> DurationSource for F
where
    F: FnMut() -> u64 + Send,
{
    fn next_duration_ms(&mut self) -> u64 {
        self()
    }
}

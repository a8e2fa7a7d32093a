//! Per-tick and cumulative counters.
//!
//! [`TickMetrics`] describes what a single tick did; [`SimTotals`]
//! accumulates across the life of a simulation.

/// Counters collected during a single tick.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickMetrics {
    /// Requests handed to a worker this tick.
    pub assigned: u32,
    /// Requests finished this tick.
    pub completed: u32,
    /// Workers that left Starting this tick.
    pub started: u32,
    /// Workers spawned by the tick (autoscale).
    pub spawned: u32,
    /// Workers despawned by the tick (idle reaping, deferred shrink).
    pub despawned: u32,
    /// Assignments deferred because no core token was free.
    pub core_waits: u32,
    /// Queue length after the tick.
    pub queue_len: usize,
    /// Idle workers after the tick.
    pub idle: usize,
    /// Busy workers after the tick.
    pub busy: usize,
    /// Starting workers after the tick.
    pub starting: usize,
    /// Free core tokens after the tick.
    pub free_cores: usize,
}

/// Counters accumulated over a simulation's lifetime.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SimTotals {
    /// Ticks executed.
    pub ticks: u64,
    /// Requests accepted into the queue.
    pub submitted: u64,
    /// Requests handed to workers.
    pub assigned: u64,
    /// Requests finished.
    pub completed: u64,
    /// Assignments deferred for lack of a core token.
    pub core_waits: u64,
    /// Workers spawned, by any path.
    pub spawned: u64,
    /// Workers despawned, by any path.
    pub despawned: u64,
}

impl SimTotals {
    /// Fold one tick's counters into the totals.
    ///
    /// Spawn and despawn counts are tracked separately by the
    /// simulation, since they also happen outside ticks.
    pub fn record_tick(&mut self, m: &TickMetrics) {
        self.ticks += 1;
        self.assigned += u64::from(m.assigned);
        self.completed += u64::from(m.completed);
        self.core_waits += u64::from(m.core_waits);
    }

    /// Requests accepted but not yet finished (queued or in flight).
    pub fn outstanding(&self) -> u64 {
        self.submitted.saturating_sub(self.completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_are_zero() {
        let m = TickMetrics::default();
        assert_eq!(m.assigned, 0);
        assert_eq!(m.completed, 0);
        assert_eq!(m.core_waits, 0);
        assert_eq!(m.queue_len, 0);
        assert_eq!(SimTotals::default().ticks, 0);
    }

    #[test]
    fn record_tick_accumulates() {
        let mut t = SimTotals {
            submitted: 10,
            ..SimTotals::default()
        };
        let m = TickMetrics {
            assigned: 3,
            completed: 2,
            core_waits: 1,
            ..TickMetrics::default()
        };
        t.record_tick(&m);
        t.record_tick(&m);
        assert_eq!(t.ticks, 2);
        assert_eq!(t.assigned, 6);
        assert_eq!(t.completed, 4);
        assert_eq!(t.core_waits, 2);
        assert_eq!(t.outstanding(), 6);
    }
}

//! Test utilities and deterministic fixtures for poolsim development.
//!
//! Provides a scripted [`DurationSource`], a [`SharedClock`] the test can
//! move while the simulation owns it, and helpers for building requests.
//! Observer recording lives in [`fixtures`].

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use poolsim_core::{Clock, DurationSource, Request, RequestId, Timestamp};

/// Duration source replaying a fixed script.
///
/// Once the script runs out every further draw returns `fallback_ms`.
/// [`drawn`](ScriptedDurations::drawn) counts draws, which lets tests
/// check that rejected assignments never consume a duration.
#[derive(Clone, Debug)]
pub struct ScriptedDurations {
    script: VecDeque<u64>,
    fallback_ms: u64,
    drawn: Arc<AtomicU64>,
}

impl ScriptedDurations {
    pub fn new(script: impl IntoIterator<Item = u64>) -> Self {
        Self {
            script: script.into_iter().collect(),
            fallback_ms: 0,
            drawn: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_fallback(mut self, fallback_ms: u64) -> Self {
        self.fallback_ms = fallback_ms;
        self
    }

    /// Shared draw counter; stays readable after the source is moved.
    pub fn counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.drawn)
    }

    pub fn drawn(&self) -> u64 {
        self.drawn.load(Ordering::Relaxed)
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl DurationSource for ScriptedDurations {
    fn next_duration_ms(&mut self) -> u64 {
        self.drawn.fetch_add(1, Ordering::Relaxed);
        self.script.pop_front().unwrap_or(self.fallback_ms)
    }
}

/// Virtual clock whose reading is shared between clones.
///
/// Hand one clone to the simulation and keep another to inspect or
/// jump the time from the test.
#[derive(Clone, Debug, Default)]
pub struct SharedClock {
    now_ms: Arc<AtomicU64>,
}

impl SharedClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(ms: u64) -> Self {
        Self {
            now_ms: Arc::new(AtomicU64::new(ms)),
        }
    }

    /// Jump to `ms`. Time never moves backwards.
    pub fn set(&self, ms: u64) {
        self.now_ms.fetch_max(ms, Ordering::Relaxed);
    }
}

impl Clock for SharedClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.now_ms.load(Ordering::Relaxed))
    }

    fn advance(&mut self, elapsed_ms: u64) {
        self.now_ms.fetch_add(elapsed_ms, Ordering::Relaxed);
    }
}

/// A request with an empty payload.
pub fn request(id: u64) -> Request {
    Request::new(RequestId(id))
}

/// Requests with the given ids, in order.
pub fn requests(ids: impl IntoIterator<Item = u64>) -> Vec<Request> {
    ids.into_iter().map(request).collect()
}

/// Ids of `requests`, in order.
pub fn ids_of<'a>(requests: impl IntoIterator<Item = &'a Request>) -> Vec<RequestId> {
    requests.into_iter().map(Request::id).collect()
}

//! Time source for expiration bookkeeping (§6: "Time source: monotonic
//! wall-clock-ish timestamps; resolution >= 1s is sufficient").
//!
//! Split into a trait so [`crate::repository::Repository`] never calls
//! `Instant::now()` directly — idle-expiration tests advance a [`TestClock`]
//! instead of sleeping in wall-clock time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// A source of timestamps for the repository.
pub trait Clock: Send + Sync + 'static {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// Production clock backed by [`std::time::Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A manually-advanced clock for deterministic expiration tests.
///
/// `Instant` has no public constructor for an arbitrary point in time, so
/// this anchors to a real `Instant` taken at construction and tracks an
/// offset from it; `advance` only ever moves the offset forward.
#[derive(Debug)]
pub struct TestClock {
    base: Instant,
    offset_nanos: AtomicU64,
}

impl TestClock {
    /// Create a clock anchored to the current real time.
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset_nanos: AtomicU64::new(0),
        }
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.offset_nanos.fetch_add(nanos, Ordering::SeqCst);
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TestClock {
    fn now(&self) -> Instant {
        self.base + Duration::from_nanos(self.offset_nanos.load(Ordering::SeqCst))
    }
}

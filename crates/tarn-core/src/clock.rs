//! Time sources.
//!
//! Every pool operation reads the clock exactly once; all accrual math is a
//! pure function of that instant and the last stored checkpoint. Production
//! uses [`SystemClock`]; tests advance a [`ManualClock`] explicitly between
//! operations, never during one.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::Timestamp;

/// A monotonic source of Unix seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time in Unix seconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        chrono::Utc::now().timestamp().max(0) as Timestamp
    }
}

/// Controllable clock for tests. Only moves forward.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self { now: AtomicU64::new(start) }
    }

    /// Fast-forward by `secs` seconds.
    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    /// Move the clock to `at`. Regressions are ignored.
    pub fn set(&self, at: Timestamp) {
        self.now.fetch_max(at, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

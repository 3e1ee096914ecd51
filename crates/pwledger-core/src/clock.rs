//! Time source seam
//!
//! Commands stamp `pmtime`, `xtime` and merge suffixes from a `Clock` so
//! tests can pin time.

use std::sync::atomic::{AtomicI64, Ordering};

/// Source of "now" as Unix seconds
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Wall clock backed by chrono
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Manually driven clock for deterministic tests
#[derive(Debug, Default)]
pub struct FixedClock {
    now: AtomicI64,
}

impl FixedClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Format a Unix timestamp as `YYYYMMDD-HHMMSS` (UTC)
pub fn compact_timestamp(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.format("%Y%m%d-%H%M%S").to_string())
        .unwrap_or_else(|| secs.to_string())
}

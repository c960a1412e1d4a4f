// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Time abstraction so the heartbeat/reconnect/cache-TTL logic upstream can
//! be driven deterministically under test instead of racing the wall clock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A source of the current time, abstracted so timing-sensitive logic
/// (heartbeat cadence, cache TTLs, watcher tick intervals) can be tested
/// without sleeping.
pub trait Clock: Clone + Send + Sync + 'static {
    /// Current time as epoch-seconds.
    fn now_secs(&self) -> u64;

    /// Current time as epoch-seconds, signed (for arithmetic that may go
    /// negative in tests).
    fn now(&self) -> u64 {
        self.now_secs()
    }
}

/// Real wall-clock time.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs()
    }
}

/// Deterministic clock for tests: starts at a fixed instant and only
/// advances when told to.
#[derive(Debug, Clone)]
pub struct FakeClock {
    secs: Arc<AtomicU64>,
}

impl FakeClock {
    pub fn new(start_secs: u64) -> Self {
        Self {
            secs: Arc::new(AtomicU64::new(start_secs)),
        }
    }

    /// Advance the clock by `secs` seconds and return the new value.
    pub fn advance(&self, secs: u64) -> u64 {
        self.secs.fetch_add(secs, Ordering::SeqCst) + secs
    }

    pub fn set(&self, secs: u64) {
        self.secs.store(secs, Ordering::SeqCst);
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Clock for FakeClock {
    fn now_secs(&self) -> u64 {
        self.secs.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_advances_by_requested_amount() {
        let clock = FakeClock::new(100);
        assert_eq!(clock.now_secs(), 100);
        assert_eq!(clock.advance(60), 160);
        assert_eq!(clock.now_secs(), 160);
    }

    #[test]
    fn system_clock_is_nonzero() {
        let clock = SystemClock;
        assert!(clock.now_secs() > 0);
    }
}

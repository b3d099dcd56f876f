//! Block clock
//!
//! Every time-dependent rule (unstaking delay, token locks, streak windows)
//! compares against block time rather than waiting on it. Contracts read the
//! current block time through [`BlockClock`], which lets tests and scripted
//! simulations move time explicitly.

use crate::types::Timestamp;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Source of the current block timestamp
pub trait BlockClock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock, for running against real time
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl BlockClock for SystemClock {
    fn now(&self) -> Timestamp {
        chrono::Utc::now().timestamp().max(0) as Timestamp
    }
}

/// Manually driven clock shared between contracts
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    time: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            time: Arc::new(AtomicU64::new(start)),
        }
    }

    /// Jump to an absolute time
    pub fn set(&self, time: Timestamp) {
        self.time.store(time, Ordering::SeqCst);
    }

    /// Move forward by `secs`, returning the new time
    pub fn advance(&self, secs: u64) -> Timestamp {
        self.time.fetch_add(secs, Ordering::SeqCst) + secs
    }
}

impl BlockClock for ManualClock {
    fn now(&self) -> Timestamp {
        self.time.load(Ordering::SeqCst)
    }
}

/// Shared clock handle held by contracts
pub type SharedClock = Arc<dyn BlockClock>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared() {
        let clock = ManualClock::new(100);
        let other = clock.clone();

        assert_eq!(clock.advance(50), 150);
        assert_eq!(other.now(), 150);

        other.set(10);
        assert_eq!(clock.now(), 10);
    }

    #[test]
    fn test_system_clock_positive() {
        assert!(SystemClock.now() > 1_600_000_000);
    }
}

//! Progress callbacks, thread-status events, cancellation tokens.
//!
//! Cancellation is a single atomic flag polled cooperatively, not a
//! preempted future: an explicit state machine with atomic state in place
//! of a coroutine-style search thread.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Coarse worker state, checked cooperatively rather than preempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStatus {
    Running,
    Paused,
    Stopping,
}

/// Number of heap pops between cooperative cancellation checks.
pub const CANCELLATION_POLL_INTERVAL: u64 = 10_000;

/// Shared, cloneable cancellation handle. `cancel()` may be called from any
/// thread; the worker observes it at the next polling point.
#[derive(Clone)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
    status: Arc<AtomicU8>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken {
            flag: Arc::new(AtomicBool::new(false)),
            status: Arc::new(AtomicU8::new(ThreadStatus::Running as u8)),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.status.store(ThreadStatus::Stopping as u8, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> ThreadStatus {
        match self.status.load(Ordering::SeqCst) {
            0 => ThreadStatus::Running,
            1 => ThreadStatus::Paused,
            _ => ThreadStatus::Stopping,
        }
    }

    pub fn set_status(&self, status: ThreadStatus) {
        self.status.store(status as u8, Ordering::SeqCst);
    }
}

/// A single progress snapshot, delivered at most once per `report_interval`.
#[derive(Debug, Clone, Copy)]
pub struct ProgressEvent {
    pub open_count: usize,
    pub closed_count: usize,
    pub thread_status: ThreadStatus,
}

/// Rate-limits progress callback delivery to at most once per interval,
/// coalescing (dropping) any tick that arrives before the previous one would
/// have fired.
pub struct ReportThrottle {
    interval: Duration,
    last_fired: Option<Instant>,
}

impl ReportThrottle {
    pub fn new(interval: Duration) -> Self {
        ReportThrottle {
            interval,
            last_fired: None,
        }
    }

    /// Returns `true` if enough time has elapsed since the last fire, and
    /// records `now` as the new last-fired instant when it does.
    pub fn should_fire(&mut self, now: Instant) -> bool {
        match self.last_fired {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last_fired = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_observed_across_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
        assert_eq!(clone.status(), ThreadStatus::Stopping);
    }

    #[test]
    fn throttle_coalesces_rapid_ticks() {
        let mut throttle = ReportThrottle::new(Duration::from_millis(100));
        let t0 = Instant::now();
        assert!(throttle.should_fire(t0));
        assert!(!throttle.should_fire(t0 + Duration::from_millis(10)));
        assert!(throttle.should_fire(t0 + Duration::from_millis(150)));
    }
}

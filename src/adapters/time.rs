//! Clock adapters.
//!
//! - [`SystemClock`] reads the host's local time and monotonic clock.
//!   Settle waits park on the shared [`ShutdownSignal`] so a stop request
//!   cuts them short.
//! - [`ManualClock`] is a deterministic clock for tests and simulation
//!   replays.  Settle waits advance simulated time instantly.

use core::time::Duration;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use chrono::{Local, NaiveDate, NaiveDateTime, TimeDelta};

use crate::app::ports::ClockPort;
use crate::runtime::ShutdownSignal;

// ── SystemClock ───────────────────────────────────────────────

pub struct SystemClock {
    start: Instant,
    shutdown: ShutdownSignal,
}

impl SystemClock {
    pub fn new(shutdown: ShutdownSignal) -> Self {
        Self {
            start: Instant::now(),
            shutdown,
        }
    }
}

impl ClockPort for SystemClock {
    fn local_now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn uptime_secs(&self) -> u64 {
        self.start.elapsed().as_secs()
    }

    fn settle(&self, delay: Duration) -> bool {
        !self.shutdown.wait_timeout(delay)
    }
}

// ── ManualClock ───────────────────────────────────────────────

#[derive(Debug)]
struct ManualState {
    now: NaiveDateTime,
    uptime: Duration,
    interrupted: bool,
}

/// Shared-handle clock: clones observe and drive the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualState>>,
}

impl Default for ManualClock {
    /// Starts at 2024-06-01 12:00:00, uptime zero.
    fn default() -> Self {
        let noon = NaiveDate::from_ymd_opt(2024, 6, 1)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .unwrap_or_default();
        Self::starting_at(noon)
    }
}

impl ManualClock {
    pub fn starting_at(now: NaiveDateTime) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ManualState {
                now,
                uptime: Duration::ZERO,
                interrupted: false,
            })),
        }
    }

    /// Move wall-clock and uptime forward together.
    pub fn advance(&self, by: Duration) {
        let mut s = self.lock();
        s.uptime += by;
        s.now += TimeDelta::from_std(by).unwrap_or(TimeDelta::zero());
    }

    pub fn advance_secs(&self, secs: u64) {
        self.advance(Duration::from_secs(secs));
    }

    /// Jump the wall clock only (an NTP step or DST change).
    pub fn set_local(&self, now: NaiveDateTime) {
        self.lock().now = now;
    }

    /// Make every following settle wait report an interruption.
    pub fn interrupt(&self) {
        self.lock().interrupted = true;
    }

    pub fn resume(&self) {
        self.lock().interrupted = false;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ClockPort for ManualClock {
    fn local_now(&self) -> NaiveDateTime {
        self.lock().now
    }

    fn uptime_secs(&self) -> u64 {
        self.lock().uptime.as_secs()
    }

    fn settle(&self, delay: Duration) -> bool {
        if self.lock().interrupted {
            return false;
        }
        self.advance(delay);
        true
    }
}

//! Clock Source
//!
//! Every expiry check, metric timestamp and call duration reads time through
//! [`Clock`] so tests can pin or step time deterministically.
//!
//! Two readings are exposed. [`Clock::now`] is the wall clock and stamps
//! expiries and records. [`Clock::monotonic`] never goes backwards and is the
//! only reading used to measure how long something took.

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Wall-clock instant used for expiry and metric timestamps
pub type Timestamp = DateTime<Utc>;

/// Source of "now"
pub trait Clock: Send + Sync {
    /// Current wall-clock time
    fn now(&self) -> Timestamp;

    /// Time since an arbitrary fixed origin. Never decreases, unaffected by
    /// wall-clock steps.
    fn monotonic(&self) -> Duration;
}

/// Shared clock handle
pub type SharedClock = Arc<dyn Clock>;

/// Clock backed by the system wall clock and `Instant`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

static PROCESS_ORIGIN: OnceLock<Instant> = OnceLock::new();

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }

    fn monotonic(&self) -> Duration {
        PROCESS_ORIGIN.get_or_init(Instant::now).elapsed()
    }
}

#[derive(Debug)]
struct ManualState {
    wall: Timestamp,
    elapsed: Duration,
}

/// Manually driven clock for tests and replay tooling
///
/// [`advance`](Self::advance) moves both readings; [`set`](Self::set) only
/// moves the wall clock, the way an NTP step would.
#[derive(Debug)]
pub struct ManualClock {
    state: Mutex<ManualState>,
}

impl ManualClock {
    /// Create a clock frozen at `start`
    pub fn new(start: Timestamp) -> Self {
        Self {
            state: Mutex::new(ManualState {
                wall: start,
                elapsed: Duration::ZERO,
            }),
        }
    }

    /// Create a clock frozen at the Unix epoch
    pub fn at_epoch() -> Self {
        Self::new(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Move time forward. Saturates at the latest representable instant.
    pub fn advance(&self, by: Duration) {
        let mut state = self.state.lock();
        state.wall = state
            .wall
            .checked_add_signed(to_chrono(by))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        state.elapsed = state.elapsed.saturating_add(by);
    }

    /// Jump the wall clock to an absolute instant
    pub fn set(&self, to: Timestamp) {
        self.state.lock().wall = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.state.lock().wall
    }

    fn monotonic(&self) -> Duration {
        self.state.lock().elapsed
    }
}

/// Convert a std duration into a chrono one, saturating on overflow.
pub fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

/// Latest expiry that still round-trips through RFC 3339 (9999-12-31T23:59:59Z).
pub fn latest_expiry() -> Timestamp {
    DateTime::<Utc>::from_timestamp(253_402_300_799, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// `now + ttl`, clamped to [`latest_expiry`].
pub fn expiry_after(now: Timestamp, ttl: Duration) -> Timestamp {
    let limit = latest_expiry();
    now.checked_add_signed(to_chrono(ttl))
        .map_or(limit, |at| at.min(limit))
}

/// `now - age`, saturating at the earliest representable instant.
pub fn cutoff_before(now: Timestamp, age: Duration) -> Timestamp {
    now.checked_sub_signed(to_chrono(age))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Milliseconds between two monotonic readings (negative spans clamp to zero).
pub fn span_ms(start: Duration, end: Duration) -> f64 {
    end.saturating_sub(start).as_nanos() as f64 / 1_000_000.0
}

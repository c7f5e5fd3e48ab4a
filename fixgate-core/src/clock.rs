/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Time sources.
//!
//! Units read time once per tick through a [`Clock`] so that session deadlines
//! can be driven deterministically in tests with [`ManualClock`].

use chrono::{DateTime, Utc};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Format used for SendingTime (tag 52).
pub const SENDING_TIME_FORMAT: &str = "%Y%m%d-%H:%M:%S%.3f";

/// A source of wall-clock milliseconds and monotonic nanoseconds.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn time_ms(&self) -> u64;

    /// Monotonic nanoseconds, only meaningful as differences.
    fn time_ns(&self) -> u64;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Creates a new system clock.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn monotonic_origin() -> Instant {
    static ORIGIN: OnceLock<Instant> = OnceLock::new();
    *ORIGIN.get_or_init(Instant::now)
}

impl Clock for SystemClock {
    #[inline]
    fn time_ms(&self) -> u64 {
        u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
    }

    #[inline]
    fn time_ns(&self) -> u64 {
        u64::try_from(monotonic_origin().elapsed().as_nanos()).unwrap_or(u64::MAX)
    }
}

/// Clock whose time only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    /// Creates a manual clock starting at `now_ms`.
    #[must_use]
    pub fn new(now_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(now_ms),
        }
    }

    /// Sets the current time.
    pub fn set(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::Release);
    }

    /// Moves the current time forward.
    pub fn advance(&self, delta_ms: u64) {
        self.now_ms.fetch_add(delta_ms, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn time_ms(&self) -> u64 {
        self.now_ms.load(Ordering::Acquire)
    }

    fn time_ns(&self) -> u64 {
        self.time_ms().saturating_mul(1_000_000)
    }
}

/// Formats epoch milliseconds as a FIX UTC timestamp.
///
/// # Arguments
/// * `time_ms` - Milliseconds since the Unix epoch
#[must_use]
pub fn format_sending_time(time_ms: u64) -> String {
    let millis = i64::try_from(time_ms).unwrap_or(i64::MAX);
    DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or_default()
        .format(SENDING_TIME_FORMAT)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(1000);
        assert_eq!(clock.time_ms(), 1000);
        clock.advance(499);
        assert_eq!(clock.time_ms(), 1499);
        clock.set(1500);
        assert_eq!(clock.time_ms(), 1500);
        assert_eq!(clock.time_ns(), 1_500_000_000);
    }

    #[test]
    fn test_system_clock_monotonic_ns() {
        let clock = SystemClock::new();
        let first = clock.time_ns();
        let second = clock.time_ns();
        assert!(second >= first);
        assert!(clock.time_ms() > 0);
    }

    #[test]
    fn test_format_sending_time() {
        assert_eq!(format_sending_time(0), "19700101-00:00:00.000");
        assert_eq!(format_sending_time(1_500), "19700101-00:00:01.500");
    }
}

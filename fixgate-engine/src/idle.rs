/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Idle strategy for polling units.
//!
//! A unit that did no work spins first, then yields, then parks for an
//! exponentially growing period capped at `max_park`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning of the backoff idle strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdleConfig {
    /// Idle calls spent busy spinning.
    pub max_spins: u32,
    /// Idle calls spent yielding after spinning.
    pub max_yields: u32,
    /// First park period.
    pub min_park: Duration,
    /// Longest park period.
    pub max_park: Duration,
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            max_spins: 10,
            max_yields: 5,
            min_park: Duration::from_micros(1),
            max_park: Duration::from_millis(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Spinning(u32),
    Yielding(u32),
    Parking(Duration),
}

/// Spin, yield, then park with exponential backoff.
#[derive(Debug, Clone)]
pub struct BackoffIdleStrategy {
    config: IdleConfig,
    phase: Phase,
}

impl BackoffIdleStrategy {
    /// Creates a strategy from its tuning.
    #[must_use]
    pub const fn new(config: IdleConfig) -> Self {
        Self {
            config,
            phase: Phase::Spinning(0),
        }
    }

    /// Idles according to the amount of work the last tick did.
    ///
    /// Any work resets the backoff.
    pub fn idle(&mut self, work_count: usize) {
        if work_count > 0 {
            self.reset();
            return;
        }
        match self.phase {
            Phase::Spinning(n) if n < self.config.max_spins => {
                std::hint::spin_loop();
                self.phase = Phase::Spinning(n + 1);
            }
            Phase::Spinning(_) => {
                std::thread::yield_now();
                self.phase = Phase::Yielding(1);
            }
            Phase::Yielding(n) if n < self.config.max_yields => {
                std::thread::yield_now();
                self.phase = Phase::Yielding(n + 1);
            }
            Phase::Yielding(_) => {
                let period = self.config.min_park;
                std::thread::park_timeout(period);
                self.phase = Phase::Parking(next_period(period, self.config.max_park));
            }
            Phase::Parking(period) => {
                std::thread::park_timeout(period);
                self.phase = Phase::Parking(next_period(period, self.config.max_park));
            }
        }
    }

    /// Returns to the spinning phase.
    pub fn reset(&mut self) {
        self.phase = Phase::Spinning(0);
    }

    fn park_period(&self) -> Option<Duration> {
        match self.phase {
            Phase::Parking(period) => Some(period),
            _ => None,
        }
    }
}

impl Default for BackoffIdleStrategy {
    fn default() -> Self {
        Self::new(IdleConfig::default())
    }
}

fn next_period(current: Duration, max: Duration) -> Duration {
    current.saturating_mul(2).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick() -> IdleConfig {
        IdleConfig {
            max_spins: 2,
            max_yields: 2,
            min_park: Duration::from_micros(1),
            max_park: Duration::from_micros(4),
        }
    }

    #[test]
    fn test_backoff_progression() {
        let mut idle = BackoffIdleStrategy::new(quick());
        idle.idle(0);
        idle.idle(0);
        assert_eq!(idle.phase, Phase::Spinning(2));
        idle.idle(0);
        assert_eq!(idle.phase, Phase::Yielding(1));
        idle.idle(0);
        assert_eq!(idle.phase, Phase::Yielding(2));
        idle.idle(0);
        assert_eq!(idle.park_period(), Some(Duration::from_micros(2)));
        idle.idle(0);
        assert_eq!(idle.park_period(), Some(Duration::from_micros(4)));
        idle.idle(0);
        assert_eq!(idle.park_period(), Some(Duration::from_micros(4)));
    }

    #[test]
    fn test_work_resets() {
        let mut idle = BackoffIdleStrategy::new(quick());
        for _ in 0..6 {
            idle.idle(0);
        }
        assert!(idle.park_period().is_some());
        idle.idle(3);
        assert_eq!(idle.phase, Phase::Spinning(0));
    }

    #[test]
    fn test_default_config() {
        let config = IdleConfig::default();
        assert_eq!(config.max_spins, 10);
        assert_eq!(config.max_park, Duration::from_millis(1));
    }
}

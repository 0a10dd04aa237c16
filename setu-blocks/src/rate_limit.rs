//! Minimum spacing between transmitted frames
//!
//! The firmware's receive buffer holds a single frame, so frames arriving
//! back-to-back overwrite each other. Frames inside the window are dropped
//! rather than queued: a block that fires again a moment later carries newer
//! intent than the one that was dropped.

use std::time::{Duration, Instant};

/// Source of the current time for the command path
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Default spacing between two accepted frames
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(5);

/// Drops sends that follow the last accepted one too closely
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_interval: Duration,
    last_accepted: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_accepted: None,
        }
    }

    /// Accept a send at `now` if the window since the last accepted send has
    /// elapsed; the very first send is always accepted
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        let ready = match self.last_accepted {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.min_interval,
        };
        if ready {
            self.last_accepted = Some(now);
        }
        ready
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_send_inside_window_dropped() {
        let t0 = Instant::now();
        let mut limiter = RateLimiter::default();
        assert!(limiter.try_acquire(t0));
        assert!(!limiter.try_acquire(t0 + Duration::from_millis(3)));
    }

    #[test]
    fn test_second_send_after_window_accepted() {
        let t0 = Instant::now();
        let mut limiter = RateLimiter::default();
        assert!(limiter.try_acquire(t0));
        assert!(limiter.try_acquire(t0 + Duration::from_millis(6)));
    }

    #[test]
    fn test_window_measured_from_last_accepted() {
        let t0 = Instant::now();
        let mut limiter = RateLimiter::default();
        assert!(limiter.try_acquire(t0));
        assert!(!limiter.try_acquire(t0 + Duration::from_millis(4)));
        // Boundary is inclusive and counts from t0, not from the dropped send
        assert!(limiter.try_acquire(t0 + Duration::from_millis(5)));
    }
}

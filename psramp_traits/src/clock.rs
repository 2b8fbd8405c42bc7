use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Monotonic clock abstraction; every suspension point of the controller goes through it.
///
/// - now(): returns a monotonic Instant
/// - sleep(): suspends for the provided duration (implementations may simulate)
/// - elapsed_since(): helper to compute elapsed time from an epoch Instant
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, d: Duration);

    /// Time elapsed since `epoch`, saturating at zero.
    fn elapsed_since(&self, epoch: Instant) -> Duration {
        self.now().saturating_duration_since(epoch)
    }
}

/// Default, real-time monotonic clock backed by std::time::Instant.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        thread::sleep(d);
    }
}

/// Virtual clock whose time only moves when slept on or advanced.
///
/// now() = origin + offset
/// sleep(d) advances internal time by d without actually sleeping.
///
/// Clones share the same offset, so a simulated device and the controller
/// holding clones of one `ManualClock` see the same timeline. The offset
/// saturates at `ManualClock::MAX_OFFSET`.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    /// Roughly a century of virtual time.
    pub const MAX_OFFSET: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Advance the clock by the given duration.
    pub fn advance(&self, d: Duration) {
        if let Ok(mut off) = self.offset.lock() {
            *off = off.saturating_add(d).min(Self::MAX_OFFSET);
        }
    }

    /// Set the absolute offset relative to origin.
    pub fn set_offset(&self, d: Duration) {
        if let Ok(mut off) = self.offset.lock() {
            *off = d.min(Self::MAX_OFFSET);
        }
    }

    /// Total virtual time elapsed since construction.
    pub fn offset(&self) -> Duration {
        self.offset.lock().map(|g| *g).unwrap_or(Duration::ZERO)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let mut off = self.offset();
        // Back off until the platform's Instant can represent the sum.
        loop {
            if let Some(t) = self.origin.checked_add(off) {
                return t;
            }
            off /= 2;
        }
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_sleep_advances_without_blocking() {
        let clock = ManualClock::new();
        let t0 = clock.now();
        clock.sleep(Duration::from_secs(3600));
        assert_eq!(clock.elapsed_since(t0), Duration::from_secs(3600));
    }

    #[test]
    fn manual_clock_clones_share_timeline() {
        let a = ManualClock::new();
        let b = a.clone();
        a.advance(Duration::from_millis(250));
        assert_eq!(b.offset(), Duration::from_millis(250));
        b.set_offset(Duration::from_millis(10));
        assert_eq!(a.offset(), Duration::from_millis(10));
    }

    #[test]
    fn elapsed_saturates_for_future_epoch() {
        let clock = ManualClock::new();
        let future = clock.now() + Duration::from_secs(1);
        assert_eq!(clock.elapsed_since(future), Duration::ZERO);
    }

    #[test]
    fn huge_sleep_saturates_instead_of_overflowing() {
        let clock = ManualClock::new();
        let t0 = clock.now();
        clock.sleep(Duration::MAX);
        clock.sleep(Duration::from_secs(1));
        assert_eq!(clock.offset(), ManualClock::MAX_OFFSET);
        assert!(clock.now() > t0);
        clock.set_offset(Duration::MAX);
        assert_eq!(clock.offset(), ManualClock::MAX_OFFSET);
    }

    #[test]
    fn monotonic_zero_sleep_returns() {
        MonotonicClock::new().sleep(Duration::ZERO);
    }
}

//! In-band waiter: hysteresis/stability rule on the device readback.
//!
//! `InBandWaiter::poll` is a pure state transition fed with one readback
//! sample and the current instant. It never fails: a timeout is reported as
//! `WaitStatus::TimedOut`; `InBandWaiter::wait` trampolines `poll`
//! with `Clock::sleep(dwell)` between samples. With a `ManualClock` the whole
//! wait runs in virtual time.

use std::time::{Duration, Instant};

use psramp_traits::{Clock, CurrentSource};

use crate::config::SettleCfg;
use crate::error::RampError;
use crate::hw_error::map_boxed;

/// Parameters for one wait phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaitParams {
    pub tolerance: f64,
    pub dwell: Duration,
    pub stable_time: Duration,
    /// Total budget; the wait fails once elapsed time exceeds it.
    pub max_time: Duration,
}

/// Consecutive in-band samples needed: `max(1, ceil(stable_time / dwell))`.
///
/// Computed on integer nanoseconds so float quotients like `1.1 / 0.1`
/// cannot round up an extra sample.
pub fn required_samples(stable_time: Duration, dwell: Duration) -> u32 {
    let dwell_ns = dwell.as_nanos().max(1);
    let need = stable_time.as_nanos().div_ceil(dwell_ns);
    u32::try_from(need).unwrap_or(u32::MAX).max(1)
}

/// Successful outcome of a wait phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settled {
    /// Readback of the sample that completed the stability window.
    pub readback: f64,
    pub elapsed: Duration,
    pub samples: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WaitStatus {
    /// Not settled yet; sleep `dwell` and poll again.
    Waiting { in_band: u32, error: f64 },
    Settled(Settled),
    /// Budget exhausted without settling.
    TimedOut { elapsed: Duration },
}

#[derive(Debug)]
pub struct InBandWaiter {
    target: f64,
    params: WaitParams,
    need: u32,
    // Consecutive in-band samples; reset on any out-of-band sample.
    in_band: u32,
    samples: u32,
    started: Instant,
}

impl InBandWaiter {
    pub fn new(target: f64, params: WaitParams, started: Instant) -> Self {
        Self {
            target,
            params,
            need: required_samples(params.stable_time, params.dwell),
            in_band: 0,
            samples: 0,
            started,
        }
    }

    pub fn need(&self) -> u32 {
        self.need
    }

    pub fn in_band(&self) -> u32 {
        self.in_band
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    /// Feed one readback sample taken at `now`.
    pub fn poll(&mut self, readback: f64, now: Instant) -> WaitStatus {
        self.samples = self.samples.saturating_add(1);
        let error = (readback - self.target).abs();
        // NaN readbacks fail the comparison and reset the window.
        if error <= self.params.tolerance {
            self.in_band = self.in_band.saturating_add(1);
        } else {
            self.in_band = 0;
        }
        let elapsed = now.saturating_duration_since(self.started);
        if self.in_band >= self.need {
            return WaitStatus::Settled(Settled {
                readback,
                elapsed,
                samples: self.samples,
            });
        }
        if elapsed > self.params.max_time {
            return WaitStatus::TimedOut { elapsed };
        }
        WaitStatus::Waiting {
            in_band: self.in_band,
            error,
        }
    }

    fn timeout_error(&self, elapsed: Duration) -> RampError {
        RampError::SettleTimeout {
            target: self.target,
            tolerance: self.params.tolerance,
            elapsed,
        }
    }

    /// Poll `source` every `dwell` until settled or timed out.
    pub fn wait<S>(self, source: &mut S, clock: &dyn Clock) -> Result<Settled, RampError>
    where
        S: CurrentSource + ?Sized,
    {
        self.wait_with(source, clock, None)
    }

    /// Like [`InBandWaiter::wait`], but `abort` is checked after every dwell
    /// sleep and stops the wait with `RampError::Interrupted` before the next
    /// readback.
    pub fn wait_interruptible<S>(
        self,
        source: &mut S,
        clock: &dyn Clock,
        abort: &dyn Fn() -> bool,
    ) -> Result<Settled, RampError>
    where
        S: CurrentSource + ?Sized,
    {
        self.wait_with(source, clock, Some(abort))
    }

    fn wait_with<S>(
        mut self,
        source: &mut S,
        clock: &dyn Clock,
        abort: Option<&dyn Fn() -> bool>,
    ) -> Result<Settled, RampError>
    where
        S: CurrentSource + ?Sized,
    {
        loop {
            let readback = source.read_back().map_err(map_boxed)?;
            match self.poll(readback, clock.now()) {
                WaitStatus::Settled(s) => {
                    tracing::debug!(
                        target_value = self.target,
                        readback = s.readback,
                        samples = s.samples,
                        elapsed_ms = s.elapsed.as_millis() as u64,
                        "readback settled"
                    );
                    return Ok(s);
                }
                WaitStatus::Waiting { in_band, error } => {
                    tracing::trace!(readback, error, in_band, need = self.need, "waiting in band");
                    clock.sleep(self.params.dwell);
                    if abort.is_some_and(|check| check()) {
                        tracing::warn!(
                            target_value = self.target,
                            in_band,
                            "settle interrupted"
                        );
                        return Err(RampError::Interrupted);
                    }
                }
                WaitStatus::TimedOut { elapsed } => {
                    tracing::warn!(
                        target_value = self.target,
                        readback,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "settle timed out"
                    );
                    return Err(self.timeout_error(elapsed));
                }
            }
        }
    }
}

/// Wait for `source` to settle at `target` using the configured `max_time`.
///
/// Does not command the device; use it after an external write.
pub fn settle_at<S>(
    source: &mut S,
    clock: &dyn Clock,
    target: f64,
    cfg: &SettleCfg,
) -> Result<Settled, RampError>
where
    S: CurrentSource + ?Sized,
{
    cfg.validate()?;
    InBandWaiter::new(target, cfg.wait_params(), clock.now()).wait(source, clock)
}

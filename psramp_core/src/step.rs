//! Per-step executor: drives one setpoint transition to a measurement.

use std::collections::BTreeSet;
use std::time::Duration;

use psramp_traits::{Clock, CurrentSource, Detector, Fields};

use crate::config::SettleCfg;
use crate::error::RampError;
use crate::hw_error::map_boxed;
use crate::timeout::{dynamic_timeout, effective_slew_rate};
use crate::waiter::{InBandWaiter, WaitParams};

/// Measurement taken at one settled setpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReading {
    pub index: usize,
    pub setpoint: f64,
    /// Readback of the sample that completed the stability window.
    pub readback: f64,
    /// Time spent in the waiter.
    pub settle_time: Duration,
    /// Deadline the waiter ran with.
    pub timeout: Duration,
    pub slew_rate: f64,
    pub slew_fallback: bool,
    /// Device fields plus `"{detector}.{field}"` entries.
    pub fields: Fields,
}

/// Borrows everything one step needs; cheap to construct per setpoint.
pub struct StepExecutor<'a, S: CurrentSource + ?Sized> {
    source: &'a mut S,
    detectors: &'a mut [Box<dyn Detector>],
    clock: &'a dyn Clock,
    cfg: &'a SettleCfg,
    extra_channels: &'a BTreeSet<String>,
    abort: Option<&'a dyn Fn() -> bool>,
}

impl<'a, S: CurrentSource + ?Sized> StepExecutor<'a, S> {
    pub fn new(
        source: &'a mut S,
        detectors: &'a mut [Box<dyn Detector>],
        clock: &'a dyn Clock,
        cfg: &'a SettleCfg,
        extra_channels: &'a BTreeSet<String>,
    ) -> Self {
        Self {
            source,
            detectors,
            clock,
            cfg,
            extra_channels,
            abort: None,
        }
    }

    /// Operator abort, checked at least every `dwell` while the step sleeps
    /// or settles. When it fires the step returns `RampError::Interrupted`
    /// before touching the device again.
    pub fn with_abort_check(mut self, abort: Option<&'a dyn Fn() -> bool>) -> Self {
        self.abort = abort;
        self
    }

    fn interrupted(&self) -> bool {
        self.abort.is_some_and(|check| check())
    }

    /// Sleep `d` in `dwell` slices so an abort is noticed promptly.
    fn pause(&self, d: Duration) -> Result<(), RampError> {
        if self.abort.is_none() {
            self.clock.sleep(d);
            return Ok(());
        }
        let slice = self.cfg.dwell.max(Duration::from_millis(1));
        let mut left = d;
        loop {
            if self.interrupted() {
                return Err(RampError::Interrupted);
            }
            if left.is_zero() {
                return Ok(());
            }
            let nap = left.min(slice);
            self.clock.sleep(nap);
            left -= nap;
        }
    }

    /// Run the step for `target`.
    ///
    /// A settle timeout or an abort returns before the hold delay, so no
    /// measurement is triggered. Slew-rate read failures degrade to
    /// `FALLBACK_SLEW_RATE`; every other device error is returned as is.
    pub fn run(&mut self, index: usize, target: f64) -> Result<StepReading, RampError> {
        self.pause(self.cfg.pre_wait)?;

        self.source.command(target).map_err(map_boxed)?;

        let slew = effective_slew_rate(self.source.read_slew_rate());
        let previous = self.source.read_back().map_err(map_boxed)?;
        let timeout = dynamic_timeout(target, previous, slew.value, self.cfg.base_timeout);
        tracing::info!(
            index,
            setpoint = target,
            previous,
            slew_rate = slew.value,
            timeout_ms = timeout.as_millis() as u64,
            "step commanded"
        );

        let params = WaitParams {
            max_time: timeout,
            ..self.cfg.wait_params()
        };
        let waiter = InBandWaiter::new(target, params, self.clock.now());
        let settled = match self.abort {
            Some(abort) => waiter.wait_interruptible(&mut *self.source, self.clock, abort)?,
            None => waiter.wait(&mut *self.source, self.clock)?,
        };

        self.pause(self.cfg.hold)?;

        let mut fields = self
            .source
            .trigger_measurement(self.extra_channels)
            .map_err(map_boxed)?;
        for det in self.detectors.iter_mut() {
            let name = det.name().to_string();
            let values = det.trigger().map_err(map_boxed)?;
            for (field, v) in values {
                fields.insert(format!("{name}.{field}"), v);
            }
        }

        Ok(StepReading {
            index,
            setpoint: target,
            readback: settled.readback,
            settle_time: settled.elapsed,
            timeout,
            slew_rate: slew.value,
            slew_fallback: slew.fallback,
            fields,
        })
    }
}

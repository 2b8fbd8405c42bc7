//! The scan driver (`RampScan`).
//!
//! A pollable state machine over the setpoint sequence: each `step()` call
//! runs one full setpoint transition (pre-wait, command, settle, hold,
//! measurement) and reports a `ScanStatus`. The device is powered on lazily,
//! exactly once, right before the first command; a programmed slew rate is
//! written just before that.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use psramp_traits::{Clock, CurrentSource, Detector};

use crate::config::SettleCfg;
use crate::error::{RampError, Report, Result};
use crate::hw_error::map_boxed;
use crate::sequence::SetpointSequence;
use crate::status::ScanStatus;
use crate::step::StepExecutor;

/// Scan over a boxed source; what `RampScanBuilder` produces by default.
pub type DynRampScan = RampScan<Box<dyn CurrentSource>>;

pub struct RampScan<S: CurrentSource> {
    pub(crate) source: S,
    pub(crate) detectors: Vec<Box<dyn Detector>>,
    pub(crate) sequence: SetpointSequence,
    pub(crate) settle: SettleCfg,
    pub(crate) extra_channels: BTreeSet<String>,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) abort_check: Option<Box<dyn Fn() -> bool>>,
    pub(crate) epoch: Instant,
    // Programmed into the device before power-on, when set.
    pub(crate) slew_rate: Option<f64>,

    pub(crate) next_index: usize,
    pub(crate) powered: bool,
    // Latched terminal error; every later `step()` reports it again.
    pub(crate) halted: Option<RampError>,
}

impl<S: CurrentSource> core::fmt::Debug for RampScan<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RampScan")
            .field("setpoints", &self.sequence.len())
            .field("next_index", &self.next_index)
            .field("powered", &self.powered)
            .field("halted", &self.halted)
            .finish()
    }
}

impl<S: CurrentSource> RampScan<S> {
    /// Reset per-run state. Call before a new scan over the same sequence.
    pub fn begin(&mut self) {
        self.epoch = self.clock.now();
        self.next_index = 0;
        self.powered = false;
        self.halted = None;
    }

    /// Run the next setpoint.
    ///
    /// Settle timeouts and operator interrupts come back as
    /// `Ok(ScanStatus::Aborted(_))`; device errors as `Err`. Either way the
    /// scan is halted and issues no further setpoints.
    pub fn step(&mut self) -> Result<ScanStatus> {
        if let Some(e) = &self.halted {
            return Ok(ScanStatus::Aborted(e.clone()));
        }
        let index = self.next_index;
        let Some(target) = self.sequence.get(index) else {
            return Ok(ScanStatus::Complete);
        };
        if self.abort_check.as_ref().is_some_and(|check| check()) {
            tracing::error!(index, "scan interrupted");
            return Ok(self.halt(RampError::Interrupted));
        }

        if !self.powered {
            if let Some(rate) = self.slew_rate {
                if let Err(e) = self.source.set_slew_rate(rate) {
                    let e = map_boxed(e);
                    self.halted = Some(e.clone());
                    return Err(Report::new(e).wrap_err(format!("programming slew rate {rate}")));
                }
                tracing::info!(slew_rate = rate, "slew rate programmed");
            }
            if let Err(e) = self.source.power_on() {
                let e = map_boxed(e);
                self.halted = Some(e.clone());
                return Err(Report::new(e).wrap_err("powering on device"));
            }
            self.powered = true;
        }

        let reading = StepExecutor::new(
            &mut self.source,
            &mut self.detectors,
            &*self.clock,
            &self.settle,
            &self.extra_channels,
        )
        .with_abort_check(self.abort_check.as_deref())
        .run(index, target);

        match reading {
            Ok(r) => {
                self.next_index += 1;
                Ok(ScanStatus::Measured(r))
            }
            Err(e @ (RampError::SettleTimeout { .. } | RampError::Interrupted)) => {
                tracing::error!(index, setpoint = target, error = %e, "scan aborted");
                Ok(self.halt(e))
            }
            Err(e) => {
                self.halted = Some(e.clone());
                Err(Report::new(e).wrap_err(format!("step {index} (setpoint {target})")))
            }
        }
    }

    fn halt(&mut self, e: RampError) -> ScanStatus {
        self.halted = Some(e.clone());
        ScanStatus::Aborted(e)
    }

    pub fn sequence(&self) -> &SetpointSequence {
        &self.sequence
    }

    pub fn settle_cfg(&self) -> &SettleCfg {
        &self.settle
    }

    /// Index of the next setpoint to run.
    pub fn next_index(&self) -> usize {
        self.next_index
    }

    /// Time since the last `begin()` on the scan's clock.
    pub fn elapsed(&self) -> Duration {
        self.clock.elapsed_since(self.epoch)
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn into_source(self) -> S {
        self.source
    }
}

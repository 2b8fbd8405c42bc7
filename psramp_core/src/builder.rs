//! Type-state builder for `RampScan` and generic `build_scan` constructor.
//!
//! The builder enforces at compile time that a source and a scan range are
//! provided before `build()` is available. `try_build()` is always available
//! for dynamic checks. All validation happens here, before any device I/O.

use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::sync::Arc;

use psramp_traits::{Clock, CurrentSource, Detector, MonotonicClock};

use crate::config::SettleCfg;
use crate::error::{BuildError, Report, Result};
use crate::scan::{DynRampScan, RampScan};
use crate::sequence::{ScanRange, SetpointSequence};

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `RampScan`. All fields are validated on `build()`.
pub struct RampScanBuilder<S, Src, Rng> {
    source: Option<S>,
    range: Option<ScanRange>,
    settle: Option<SettleCfg>,
    extra_channels: Vec<String>,
    detectors: Vec<Box<dyn Detector>>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    abort_check: Option<Box<dyn Fn() -> bool>>,
    slew_rate: Option<f64>,
    _src: PhantomData<Src>,
    _rng: PhantomData<Rng>,
}

impl Default for RampScanBuilder<Box<dyn CurrentSource>, Missing, Missing> {
    fn default() -> Self {
        Self {
            source: None,
            range: None,
            settle: None,
            extra_channels: Vec::new(),
            detectors: Vec::new(),
            clock: None,
            abort_check: None,
            slew_rate: None,
            _src: PhantomData,
            _rng: PhantomData,
        }
    }
}

impl DynRampScan {
    /// Start building a scan.
    pub fn builder() -> RampScanBuilder<Box<dyn CurrentSource>, Missing, Missing> {
        RampScanBuilder::default()
    }
}

/// Validate configuration and construct a `RampScan`.
///
/// Shared by `RampScanBuilder::try_build()` and `build_scan()`.
fn validate_and_build<S: CurrentSource>(
    source: S,
    range: ScanRange,
    settle: SettleCfg,
    extra_channels: Vec<String>,
    detectors: Vec<Box<dyn Detector>>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    abort_check: Option<Box<dyn Fn() -> bool>>,
) -> Result<RampScan<S>> {
    let sequence = SetpointSequence::new(range).map_err(Report::new)?;
    settle.validate().map_err(Report::new)?;

    if extra_channels.iter().any(|c| c.trim().is_empty()) {
        return Err(Report::new(BuildError::InvalidConfig(
            "extra channel names must not be empty",
        )));
    }
    let mut names = BTreeSet::new();
    for det in &detectors {
        if det.name().is_empty() {
            return Err(Report::new(BuildError::InvalidConfig(
                "detector names must not be empty",
            )));
        }
        if !names.insert(det.name().to_string()) {
            return Err(Report::new(BuildError::InvalidConfig(
                "detector names must be unique",
            )));
        }
    }

    let clock = clock.unwrap_or_else(|| Arc::new(MonotonicClock::new()));
    let epoch = clock.now();

    tracing::debug!(
        setpoints = sequence.len(),
        start = range.start,
        stop = range.stop,
        delta = sequence.delta(),
        "scan built"
    );

    Ok(RampScan {
        source,
        detectors,
        sequence,
        settle,
        extra_channels: extra_channels.into_iter().collect(),
        clock,
        abort_check,
        epoch,
        next_index: 0,
        slew_rate: None,
        powered: false,
        halted: None,
    })
}

impl<S: CurrentSource, Src, Rng> RampScanBuilder<S, Src, Rng> {
    /// Fallible build available in any type-state.
    pub fn try_build(self) -> Result<RampScan<S>> {
        let source = self
            .source
            .ok_or_else(|| Report::new(BuildError::MissingSource))?;
        let range = self
            .range
            .ok_or_else(|| Report::new(BuildError::MissingRange))?;
        if let Some(rate) = self.slew_rate
            && !(rate.is_finite() && rate > 0.0)
        {
            return Err(Report::new(BuildError::InvalidConfig(
                "programmed slew rate must be finite and > 0",
            )));
        }
        let mut scan = validate_and_build(
            source,
            range,
            self.settle.unwrap_or_default(),
            self.extra_channels,
            self.detectors,
            self.clock,
            self.abort_check,
        )?;
        scan.slew_rate = self.slew_rate;
        Ok(scan)
    }
}

/// Chainable setters that do not affect type-state.
impl<S, Src, Rng> RampScanBuilder<S, Src, Rng> {
    pub fn with_settle(mut self, settle: SettleCfg) -> Self {
        self.settle = Some(settle);
        self
    }
    /// Extra device channels read with every measurement.
    pub fn with_extra_channels<I, C>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        self.extra_channels = channels.into_iter().map(Into::into).collect();
        self
    }
    pub fn with_detector(mut self, detector: impl Detector + 'static) -> Self {
        self.detectors.push(Box::new(detector));
        self
    }
    /// Polled before each setpoint and at least every `dwell` within one;
    /// returning true interrupts the scan.
    pub fn with_abort_check<F>(mut self, f: F) -> Self
    where
        F: Fn() -> bool + 'static,
    {
        self.abort_check = Some(Box::new(f));
        self
    }
    /// Slew rate written to the device right before it is powered on.
    pub fn with_slew_rate(mut self, units_per_s: f64) -> Self {
        self.slew_rate = Some(units_per_s);
        self
    }
    /// Provide a custom clock implementation; defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
}

// Setters that advance type-state
impl<S, Rng> RampScanBuilder<S, Missing, Rng> {
    pub fn with_source<T: CurrentSource>(self, source: T) -> RampScanBuilder<T, Set, Rng> {
        RampScanBuilder {
            source: Some(source),
            range: self.range,
            settle: self.settle,
            extra_channels: self.extra_channels,
            detectors: self.detectors,
            clock: self.clock,
            abort_check: self.abort_check,
            slew_rate: self.slew_rate,
            _src: PhantomData,
            _rng: PhantomData,
        }
    }
}

impl<S, Src> RampScanBuilder<S, Src, Missing> {
    pub fn with_range(self, range: ScanRange) -> RampScanBuilder<S, Src, Set> {
        RampScanBuilder {
            source: self.source,
            range: Some(range),
            settle: self.settle,
            extra_channels: self.extra_channels,
            detectors: self.detectors,
            clock: self.clock,
            abort_check: self.abort_check,
            slew_rate: self.slew_rate,
            _src: PhantomData,
            _rng: PhantomData,
        }
    }
}

impl<S: CurrentSource> RampScanBuilder<S, Set, Set> {
    /// Validate and build the scan. Only available once source and range are set.
    pub fn build(self) -> Result<RampScan<S>> {
        self.try_build()
    }
}

/// Build a statically-dispatched scan with defaults for everything optional.
///
/// Delegates to the shared `validate_and_build`.
pub fn build_scan<S: CurrentSource>(
    source: S,
    range: ScanRange,
    settle: SettleCfg,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
) -> Result<RampScan<S>> {
    validate_and_build(source, range, settle, Vec::new(), Vec::new(), clock, None)
}

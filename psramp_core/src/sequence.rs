//! Setpoint sequencing.
//!
//! `npts = floor(|stop - start| / |step|) + 1` points at `start + i * step`,
//! walking toward `stop`. Points are computed from the index (never by
//! accumulation) and clamped into `[min(start, stop), max(start, stop)]`.
//! When `step` does not divide the span, the last point falls short of `stop`;
//! `stop` is never appended.

use crate::error::RampError;

/// Relative slack when flooring the point count, so that `0.3 / 0.1`
/// (2.9999999999999996) still yields 4 points.
const COUNT_EPSILON: f64 = 1e-9;

/// Upper bound on the number of setpoints in one scan.
pub const MAX_SETPOINTS: usize = 1_000_000;

/// Start/stop/step bounds of a scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanRange {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl ScanRange {
    pub fn new(start: f64, stop: f64, step: f64) -> Self {
        Self { start, stop, step }
    }

    pub fn validate(&self) -> Result<(), RampError> {
        if !self.start.is_finite() || !self.stop.is_finite() {
            return Err(RampError::Config(format!(
                "start and stop must be finite, got {} and {}",
                self.start, self.stop
            )));
        }
        if !self.step.is_finite() || self.step == 0.0 {
            return Err(RampError::Config(format!(
                "step must be finite and non-zero, got {}",
                self.step
            )));
        }
        Ok(())
    }
}

/// Lazily evaluated, validated setpoint list.
#[derive(Debug, Clone, PartialEq)]
pub struct SetpointSequence {
    start: f64,
    stop: f64,
    // Signed increment, pointing from start toward stop.
    delta: f64,
    len: usize,
}

impl SetpointSequence {
    pub fn new(range: ScanRange) -> Result<Self, RampError> {
        range.validate()?;
        let span = (range.stop - range.start).abs();
        let magnitude = range.step.abs();
        let ratio = span / magnitude;
        let intervals = (ratio + COUNT_EPSILON * ratio.max(1.0)).floor();
        if !intervals.is_finite() || intervals >= MAX_SETPOINTS as f64 {
            return Err(RampError::Config(format!(
                "range {}..{} with step {} exceeds {MAX_SETPOINTS} setpoints",
                range.start, range.stop, range.step
            )));
        }
        let delta = if range.stop >= range.start {
            magnitude
        } else {
            -magnitude
        };
        Ok(Self {
            start: range.start,
            stop: range.stop,
            delta,
            len: intervals as usize + 1,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false: a valid range has at least its start point.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Signed spacing between consecutive setpoints.
    pub fn delta(&self) -> f64 {
        self.delta
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        if index >= self.len {
            return None;
        }
        let (lo, hi) = if self.start <= self.stop {
            (self.start, self.stop)
        } else {
            (self.stop, self.start)
        };
        let raw = self.start + (index as f64) * self.delta;
        let mut v = raw.clamp(lo, hi);
        // Absorb float error on an evenly dividing last point.
        if index + 1 == self.len && (v - self.stop).abs() <= COUNT_EPSILON * self.delta.abs() {
            v = self.stop;
        }
        Some(v)
    }

    pub fn iter(&self) -> Setpoints<'_> {
        Setpoints { seq: self, next: 0 }
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.iter().collect()
    }
}

/// Iterator over the points of a `SetpointSequence`.
#[derive(Debug, Clone)]
pub struct Setpoints<'a> {
    seq: &'a SetpointSequence,
    next: usize,
}

impl Iterator for Setpoints<'_> {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        let v = self.seq.get(self.next)?;
        self.next += 1;
        Some(v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rem = self.seq.len.saturating_sub(self.next);
        (rem, Some(rem))
    }
}

impl ExactSizeIterator for Setpoints<'_> {}

impl<'a> IntoIterator for &'a SetpointSequence {
    type Item = f64;
    type IntoIter = Setpoints<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

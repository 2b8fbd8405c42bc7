//! Blocking drivers that run a `RampScan` to completion.

use std::sync::Arc;
use std::time::Duration;

use psramp_traits::{Clock, CurrentSource};

use crate::builder::build_scan;
use crate::config::SettleCfg;
use crate::error::{Report, Result};
use crate::scan::RampScan;
use crate::sequence::ScanRange;
use crate::status::ScanStatus;
use crate::step::StepReading;

/// Readings of a completed scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanReport {
    pub readings: Vec<StepReading>,
    /// Scan-clock time from `begin()` to the last measurement.
    pub elapsed: Duration,
}

/// Run `scan` from its first setpoint and collect every reading.
pub fn run<S: CurrentSource>(scan: &mut RampScan<S>) -> Result<ScanReport> {
    run_with(scan, |_| {})
}

/// Like `run`, invoking `on_reading` as each setpoint is measured.
///
/// Readings delivered before an abort stay with the caller; the returned
/// error carries the typed `RampError` for downcasting.
pub fn run_with<S, F>(scan: &mut RampScan<S>, mut on_reading: F) -> Result<ScanReport>
where
    S: CurrentSource,
    F: FnMut(&StepReading),
{
    scan.begin();
    let total = scan.sequence().len();
    tracing::info!(
        setpoints = total,
        first = scan.sequence().get(0),
        last = scan.sequence().get(total.saturating_sub(1)),
        "scan start"
    );

    let mut readings = Vec::with_capacity(total);
    loop {
        match scan.step()? {
            ScanStatus::Measured(r) => {
                tracing::info!(
                    index = r.index,
                    setpoint = r.setpoint,
                    readback = r.readback,
                    settle_ms = r.settle_time.as_millis() as u64,
                    "setpoint measured"
                );
                on_reading(&r);
                readings.push(r);
            }
            ScanStatus::Complete => {
                let elapsed = scan.elapsed();
                tracing::info!(
                    setpoints = readings.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "scan complete"
                );
                return Ok(ScanReport { readings, elapsed });
            }
            ScanStatus::Aborted(e) => {
                tracing::error!(error = %e, measured = readings.len(), "scan aborted");
                return Err(Report::new(e));
            }
        }
    }
}

/// One-call ramp-and-scan over `range` with default extras.
pub fn ramp_scan<S: CurrentSource>(
    source: S,
    range: ScanRange,
    settle: SettleCfg,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
) -> Result<ScanReport> {
    let mut scan = build_scan(source, range, settle, clock)?;
    run(&mut scan)
}

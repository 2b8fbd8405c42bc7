//! Scan status returned from each `RampScan::step`.

use crate::error::RampError;
use crate::step::StepReading;

/// Public status of a single step of the scan.
#[derive(Debug)]
pub enum ScanStatus {
    /// One setpoint settled and measured; more may follow.
    Measured(StepReading),
    /// Every setpoint has been measured.
    Complete,
    /// Stopped on a settle timeout or operator interrupt. The device is left
    /// at its last commanded value.
    Aborted(RampError),
}

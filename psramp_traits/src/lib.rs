//! Device-facing traits shared by the controller, the hardware adapters and the CLI.
//!
//! Errors cross these boundaries as `Box<dyn Error + Send + Sync>` so adapters
//! can surface whatever their transport produces; `psramp_core` maps them to
//! its typed error enum.

pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

use std::collections::{BTreeMap, BTreeSet};

/// Boxed error type used at every trait boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Named measurement values captured by a device or detector.
pub type Fields = BTreeMap<String, f64>;

/// Field name every `CurrentSource::trigger_measurement` reports.
pub const READBACK_FIELD: &str = "readback";

/// Field name for the self-reported slew rate in snapshots.
pub const SLEW_RATE_FIELD: &str = "slew_rate";

/// Minimal capability set the ramp controller needs from a current source.
pub trait CurrentSource {
    /// Bring the output into its powered-on state. Called once before a scan.
    fn power_on(&mut self) -> Result<(), BoxError>;

    /// Issue a ramped write of a new setpoint.
    fn command(&mut self, setpoint: f64) -> Result<(), BoxError>;

    /// Current measured output. Polled at dwell cadence, so it must be cheap.
    fn read_back(&mut self) -> Result<f64, BoxError>;

    /// Device-reported achievable rate of change (units per second).
    fn read_slew_rate(&mut self) -> Result<f64, BoxError>;

    /// Capture a synchronized reading. Always contains `READBACK_FIELD`, plus
    /// whichever of `extra_channels` the device knows about.
    fn trigger_measurement(
        &mut self,
        extra_channels: &BTreeSet<String>,
    ) -> Result<Fields, BoxError>;

    /// Program the ramp rate (units per second). Devices without a writable
    /// slew register keep the default no-op.
    fn set_slew_rate(&mut self, _units_per_s: f64) -> Result<(), BoxError> {
        Ok(())
    }

    /// Switch the output off. Never called by the controller itself.
    fn power_off(&mut self) -> Result<(), BoxError> {
        Ok(())
    }

    /// Full status dump.
    fn snapshot(&mut self) -> Result<Fields, BoxError> {
        let mut fields = Fields::new();
        fields.insert(READBACK_FIELD.to_string(), self.read_back()?);
        fields.insert(SLEW_RATE_FIELD.to_string(), self.read_slew_rate()?);
        Ok(fields)
    }
}

/// Any additional instrument read once per settled setpoint.
pub trait Detector {
    fn name(&self) -> &str;
    fn trigger(&mut self) -> Result<Fields, BoxError>;
}

impl<T: CurrentSource + ?Sized> CurrentSource for Box<T> {
    fn power_on(&mut self) -> Result<(), BoxError> {
        (**self).power_on()
    }
    fn command(&mut self, setpoint: f64) -> Result<(), BoxError> {
        (**self).command(setpoint)
    }
    fn read_back(&mut self) -> Result<f64, BoxError> {
        (**self).read_back()
    }
    fn read_slew_rate(&mut self) -> Result<f64, BoxError> {
        (**self).read_slew_rate()
    }
    fn trigger_measurement(
        &mut self,
        extra_channels: &BTreeSet<String>,
    ) -> Result<Fields, BoxError> {
        (**self).trigger_measurement(extra_channels)
    }
    fn set_slew_rate(&mut self, units_per_s: f64) -> Result<(), BoxError> {
        (**self).set_slew_rate(units_per_s)
    }
    fn power_off(&mut self) -> Result<(), BoxError> {
        (**self).power_off()
    }
    fn snapshot(&mut self) -> Result<Fields, BoxError> {
        (**self).snapshot()
    }
}

impl<T: Detector + ?Sized> Detector for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }
    fn trigger(&mut self) -> Result<Fields, BoxError> {
        (**self).trigger()
    }
}

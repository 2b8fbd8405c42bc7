//! Runtime configuration for the ramp controller.
//!
//! These are the runtime structs used by the scan and its components.
//! They are separate from the TOML-deserialized config in `psramp_config`.

use std::time::Duration;

use crate::error::RampError;
use crate::waiter::WaitParams;

/// Per-step timing and settle tunables.
#[derive(Debug, Clone, PartialEq)]
pub struct SettleCfg {
    /// Grace period before a new setpoint is commanded.
    pub pre_wait: Duration,
    /// Post-convergence dwell before the measurement is triggered.
    pub hold: Duration,
    /// Half-width of the tolerance band, in device units.
    pub tolerance: f64,
    /// Fixed part of the dynamic per-step timeout.
    pub base_timeout: Duration,
    /// Readback polling interval.
    pub dwell: Duration,
    /// How long the readback must stay in band to count as settled.
    pub stable_time: Duration,
    /// Waiter deadline when no dynamic timeout applies (`settle_at`).
    pub max_time: Duration,
}

impl Default for SettleCfg {
    fn default() -> Self {
        Self {
            pre_wait: Duration::from_secs(3),
            hold: Duration::from_secs(2),
            tolerance: 0.02,
            base_timeout: Duration::from_secs(5),
            dwell: Duration::from_millis(100),
            stable_time: Duration::from_millis(400),
            max_time: Duration::from_secs(10),
        }
    }
}

/// Upper bound on every settle duration.
pub const MAX_SETTLE_DURATION: Duration = Duration::from_secs(60 * 60);

impl SettleCfg {
    pub fn validate(&self) -> Result<(), RampError> {
        for (name, d) in [
            ("pre_wait", self.pre_wait),
            ("hold", self.hold),
            ("base_timeout", self.base_timeout),
            ("dwell", self.dwell),
            ("stable_time", self.stable_time),
            ("max_time", self.max_time),
        ] {
            if d > MAX_SETTLE_DURATION {
                return Err(RampError::Config(format!(
                    "{name} must be at most 1h, got {:.0} s",
                    d.as_secs_f64()
                )));
            }
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(RampError::Config(format!(
                "tolerance must be finite and >= 0, got {}",
                self.tolerance
            )));
        }
        if self.dwell.is_zero() {
            return Err(RampError::Config("dwell must be > 0".into()));
        }
        if self.max_time.is_zero() {
            return Err(RampError::Config("max_time must be > 0".into()));
        }
        if self.tolerance == 0.0 {
            tracing::warn!("tolerance is 0: only an exact readback match will settle");
        }
        Ok(())
    }

    /// Waiter parameters with the configured `max_time` as deadline.
    pub fn wait_params(&self) -> WaitParams {
        WaitParams {
            tolerance: self.tolerance,
            dwell: self.dwell,
            stable_time: self.stable_time,
            max_time: self.max_time,
        }
    }
}

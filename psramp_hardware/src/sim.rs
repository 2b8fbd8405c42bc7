//! Simulated power supply and gaussmeter.
//!
//! The supply ramps its output toward the commanded setpoint at `slew_rate`
//! units per second of *clock* time, so pairing it with a `ManualClock` gives a
//! fully deterministic device that never sleeps.

use std::cell::Cell;
use std::collections::BTreeSet;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use psramp_traits::{
    BoxError, Clock, CurrentSource, Detector, Fields, READBACK_FIELD, SLEW_RATE_FIELD,
};

use crate::error::HwError;

/// Load resistance seen by the simulated output (ohms).
const LOAD_OHMS: f64 = 0.5;
/// Ambient temperature for the thermal model (°C).
const AMBIENT_C: f64 = 25.0;

/// Shared handle on the simulated output current.
#[derive(Debug, Clone, Default)]
pub struct OutputProbe(Rc<Cell<f64>>);

impl OutputProbe {
    pub fn get(&self) -> f64 {
        self.0.get()
    }
}

/// Slew-limited power supply model.
pub struct SimulatedSupply {
    clock: Arc<dyn Clock + Send + Sync>,
    powered: bool,
    setpoint: f64,
    output: OutputProbe,
    last_update: Instant,
    slew_rate: f64,
    reported_slew_rate: Option<f64>,
    frozen: bool,
    fail_slew_read: bool,
    fail_command: bool,
    power_on_count: u32,
    commands: Vec<f64>,
}

impl core::fmt::Debug for SimulatedSupply {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimulatedSupply")
            .field("powered", &self.powered)
            .field("setpoint", &self.setpoint)
            .field("output", &self.output.get())
            .field("slew_rate", &self.slew_rate)
            .finish()
    }
}

impl SimulatedSupply {
    pub fn new(clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let last_update = clock.now();
        Self {
            clock,
            powered: false,
            setpoint: 0.0,
            output: OutputProbe::default(),
            last_update,
            slew_rate: 1.0,
            reported_slew_rate: None,
            frozen: false,
            fail_slew_read: false,
            fail_command: false,
            power_on_count: 0,
            commands: Vec::new(),
        }
    }

    /// Actual ramp rate (units/s). Non-positive values freeze the output.
    pub fn with_slew_rate(mut self, slew_rate: f64) -> Self {
        self.slew_rate = slew_rate;
        self
    }

    pub fn with_initial(mut self, value: f64) -> Self {
        self.output.0.set(value);
        self.setpoint = value;
        self
    }

    /// Override what `read_slew_rate` reports (e.g. 0.0 to mimic a stale register).
    pub fn with_reported_slew_rate(mut self, reported: Option<f64>) -> Self {
        self.reported_slew_rate = reported;
        self
    }

    /// Readback never moves, whatever is commanded.
    pub fn with_frozen_readback(mut self, frozen: bool) -> Self {
        self.frozen = frozen;
        self
    }

    pub fn with_failing_slew_read(mut self, fail: bool) -> Self {
        self.fail_slew_read = fail;
        self
    }

    pub fn with_failing_command(mut self, fail: bool) -> Self {
        self.fail_command = fail;
        self
    }

    /// Handle that follows the output current; feeds `SimulatedGaussmeter`.
    pub fn probe(&self) -> OutputProbe {
        self.output.clone()
    }

    pub fn power_on_count(&self) -> u32 {
        self.power_on_count
    }

    /// Every setpoint accepted by `command`, in order.
    pub fn commanded(&self) -> &[f64] {
        &self.commands
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    /// Bring the modelled output up to the current clock time.
    fn advance(&mut self) {
        let now = self.clock.now();
        let dt = now.saturating_duration_since(self.last_update).as_secs_f64();
        self.last_update = now;
        if !self.powered || self.frozen || self.slew_rate <= 0.0 {
            return;
        }
        let out = self.output.get();
        let max_move = self.slew_rate * dt;
        let delta = self.setpoint - out;
        let next = if delta.abs() <= max_move {
            self.setpoint
        } else {
            out + max_move.copysign(delta)
        };
        self.output.0.set(next);
    }

    fn voltage(&self) -> f64 {
        self.output.get() * LOAD_OHMS
    }

    fn heatsink_temp(&self) -> f64 {
        let i = self.output.get();
        AMBIENT_C + 0.8 * i * i
    }

    fn shunt_temp(&self) -> f64 {
        let i = self.output.get();
        AMBIENT_C + 1.5 * i * i
    }

    fn channel(&self, name: &str) -> Option<f64> {
        match name {
            "voltage" => Some(self.voltage()),
            "heatsink_temp" => Some(self.heatsink_temp()),
            "shunt_temp" => Some(self.shunt_temp()),
            "setpoint" => Some(self.setpoint),
            SLEW_RATE_FIELD => Some(self.reported_slew_rate.unwrap_or(self.slew_rate)),
            _ => None,
        }
    }
}

impl CurrentSource for SimulatedSupply {
    fn power_on(&mut self) -> Result<(), BoxError> {
        self.advance();
        self.powered = true;
        self.power_on_count += 1;
        tracing::info!("simulated supply powered on");
        Ok(())
    }

    fn command(&mut self, setpoint: f64) -> Result<(), BoxError> {
        if self.fail_command {
            return Err(Box::new(HwError::Injected("command write failed")));
        }
        if !self.powered {
            return Err(Box::new(HwError::OutputDisabled));
        }
        self.advance();
        self.setpoint = setpoint;
        self.commands.push(setpoint);
        tracing::debug!(setpoint, "simulated supply ramping");
        Ok(())
    }

    fn read_back(&mut self) -> Result<f64, BoxError> {
        self.advance();
        Ok(self.output.get())
    }

    fn set_slew_rate(&mut self, units_per_s: f64) -> Result<(), BoxError> {
        if !(units_per_s.is_finite() && units_per_s > 0.0) {
            return Err(Box::new(HwError::Protocol(format!(
                "slew rate {units_per_s} out of range"
            ))));
        }
        // Output moved at the old rate up to now.
        self.advance();
        self.slew_rate = units_per_s;
        tracing::debug!(slew_rate = units_per_s, "simulated slew rate programmed");
        Ok(())
    }

    fn read_slew_rate(&mut self) -> Result<f64, BoxError> {
        if self.fail_slew_read {
            return Err(Box::new(HwError::Timeout));
        }
        Ok(self.reported_slew_rate.unwrap_or(self.slew_rate))
    }

    fn trigger_measurement(
        &mut self,
        extra_channels: &BTreeSet<String>,
    ) -> Result<Fields, BoxError> {
        self.advance();
        let mut fields = Fields::new();
        fields.insert(READBACK_FIELD.to_string(), self.output.get());
        for name in extra_channels {
            match self.channel(name) {
                Some(v) => {
                    fields.insert(name.clone(), v);
                }
                None => tracing::debug!(channel = %name, "unknown channel ignored"),
            }
        }
        Ok(fields)
    }

    fn power_off(&mut self) -> Result<(), BoxError> {
        self.advance();
        self.powered = false;
        self.output.0.set(0.0);
        self.setpoint = 0.0;
        tracing::info!("simulated supply powered off");
        Ok(())
    }

    fn snapshot(&mut self) -> Result<Fields, BoxError> {
        self.advance();
        let out = self.output.get();
        let mut fields = Fields::new();
        fields.insert("setpoint".into(), self.setpoint);
        fields.insert(READBACK_FIELD.into(), out);
        fields.insert("slew_rate_set".into(), self.slew_rate);
        fields.insert(
            SLEW_RATE_FIELD.into(),
            self.reported_slew_rate.unwrap_or(self.slew_rate),
        );
        fields.insert("voltage".into(), self.voltage());
        fields.insert("heatsink_temp".into(), self.heatsink_temp());
        fields.insert("shunt_temp".into(), self.shunt_temp());
        fields.insert("powered".into(), if self.powered { 1.0 } else { 0.0 });
        let done = self.powered && (self.setpoint - out).abs() < f64::EPSILON;
        fields.insert("done".into(), if done { 1.0 } else { 0.0 });
        Ok(fields)
    }
}

/// Hall probe reading a field proportional to the supply output current.
#[derive(Debug, Clone)]
pub struct SimulatedGaussmeter {
    probe: OutputProbe,
    gauss_per_amp: f64,
}

impl SimulatedGaussmeter {
    pub fn new(probe: OutputProbe, gauss_per_amp: f64) -> Self {
        Self {
            probe,
            gauss_per_amp,
        }
    }
}

impl Detector for SimulatedGaussmeter {
    fn name(&self) -> &str {
        "gaussmeter"
    }

    fn trigger(&mut self) -> Result<Fields, BoxError> {
        let mut fields = Fields::new();
        fields.insert("bfield".into(), self.probe.get() * self.gauss_per_amp);
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use psramp_traits::ManualClock;
    use std::time::Duration;

    fn supply(clock: &ManualClock) -> SimulatedSupply {
        SimulatedSupply::new(Arc::new(clock.clone())).with_slew_rate(2.0)
    }

    #[test]
    fn ramps_at_slew_rate() {
        let clock = ManualClock::new();
        let mut ps = supply(&clock);
        ps.power_on().unwrap();
        ps.command(4.0).unwrap();
        clock.advance(Duration::from_millis(500));
        assert!((ps.read_back().unwrap() - 1.0).abs() < 1e-9);
        clock.advance(Duration::from_secs(5));
        assert_eq!(ps.read_back().unwrap(), 4.0);
    }

    #[test]
    fn ramps_downward() {
        let clock = ManualClock::new();
        let mut ps = supply(&clock).with_initial(3.0);
        ps.power_on().unwrap();
        ps.command(0.0).unwrap();
        clock.advance(Duration::from_secs(1));
        assert!((ps.read_back().unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn command_requires_power() {
        let clock = ManualClock::new();
        let mut ps = supply(&clock);
        let err = ps.command(1.0).expect_err("output disabled");
        assert!(err.to_string().contains("power on"));
    }

    #[test]
    fn frozen_readback_never_moves() {
        let clock = ManualClock::new();
        let mut ps = supply(&clock).with_frozen_readback(true);
        ps.power_on().unwrap();
        ps.command(5.0).unwrap();
        clock.advance(Duration::from_secs(60));
        assert_eq!(ps.read_back().unwrap(), 0.0);
    }

    #[test]
    fn gaussmeter_follows_output() {
        let clock = ManualClock::new();
        let mut ps = supply(&clock);
        let mut gm = SimulatedGaussmeter::new(ps.probe(), 10.0);
        ps.power_on().unwrap();
        ps.command(1.0).unwrap();
        clock.advance(Duration::from_secs(1));
        ps.read_back().unwrap();
        let f = gm.trigger().unwrap();
        assert!((f["bfield"] - 10.0).abs() < 1e-9);
    }
}

//! SCPI current source over a serial line.
//!
//! Line-oriented: every command is terminated with `\n`, every query answers
//! with one line holding a single number.

use std::collections::BTreeSet;
use std::io::{Read, Write};
use std::time::Duration;

use psramp_traits::{BoxError, CurrentSource, Fields, READBACK_FIELD, SLEW_RATE_FIELD};

use crate::error::{HwError, Result};

const CMD_OUTPUT_ON: &str = "OUTP ON";
const CMD_OUTPUT_OFF: &str = "OUTP OFF";
const CMD_RAMP_TO: &str = "CURR:RAMP";
const CMD_SLEW: &str = "CURR:SLEW";
const QRY_CURRENT: &str = "MEAS:CURR?";
const QRY_SLEW: &str = "CURR:SLEW?";
const QRY_SETPOINT: &str = "CURR:RAMP?";

/// Extra channels this adapter knows how to query.
const CHANNELS: &[(&str, &str)] = &[
    ("voltage", "MEAS:VOLT?"),
    ("heatsink_temp", "SYST:TEMP:SINK?"),
    ("shunt_temp", "SYST:TEMP:SHUNT?"),
    ("setpoint", QRY_SETPOINT),
    (SLEW_RATE_FIELD, QRY_SLEW),
];

const MAX_LINE: usize = 256;

pub struct ScpiSupply {
    port: Box<dyn serialport::SerialPort>,
    name: String,
}

impl core::fmt::Debug for ScpiSupply {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ScpiSupply").field("port", &self.name).finish()
    }
}

impl ScpiSupply {
    pub fn open(path: &str, baud: u32, io_timeout: Duration) -> Result<Self> {
        let port = serialport::new(path, baud)
            .timeout(io_timeout)
            .open()
            .map_err(|e| HwError::Serial(format!("open {path}: {e}")))?;
        tracing::info!(port = path, baud, "scpi supply opened");
        Ok(Self {
            port,
            name: path.to_string(),
        })
    }

    fn send(&mut self, line: &str) -> Result<()> {
        tracing::trace!(cmd = line, "scpi >");
        self.port.write_all(line.as_bytes()).map_err(map_io)?;
        self.port.write_all(b"\n").map_err(map_io)?;
        self.port.flush().map_err(map_io)
    }

    fn read_line(&mut self) -> Result<String> {
        let mut buf = Vec::with_capacity(32);
        let mut byte = [0u8; 1];
        loop {
            let n = self.port.read(&mut byte).map_err(map_io)?;
            if n == 0 {
                return Err(HwError::Protocol("port closed mid-response".into()));
            }
            match byte[0] {
                b'\n' => break,
                b'\r' => {}
                b => buf.push(b),
            }
            if buf.len() > MAX_LINE {
                return Err(HwError::Protocol("response line too long".into()));
            }
        }
        String::from_utf8(buf).map_err(|_| HwError::Protocol("non-utf8 response".into()))
    }

    fn query_f64(&mut self, q: &str) -> Result<f64> {
        self.send(q)?;
        let line = self.read_line()?;
        tracing::trace!(resp = %line, "scpi <");
        line.trim()
            .parse::<f64>()
            .map_err(|_| HwError::Protocol(format!("{q} answered {line:?}")))
    }
}

fn map_io(e: std::io::Error) -> HwError {
    if e.kind() == std::io::ErrorKind::TimedOut {
        HwError::Timeout
    } else {
        HwError::Io(e)
    }
}

impl CurrentSource for ScpiSupply {
    fn power_on(&mut self) -> std::result::Result<(), BoxError> {
        Ok(self.send(CMD_OUTPUT_ON)?)
    }

    fn command(&mut self, setpoint: f64) -> std::result::Result<(), BoxError> {
        Ok(self.send(&format!("{CMD_RAMP_TO} {setpoint:.6}"))?)
    }

    fn read_back(&mut self) -> std::result::Result<f64, BoxError> {
        Ok(self.query_f64(QRY_CURRENT)?)
    }

    fn read_slew_rate(&mut self) -> std::result::Result<f64, BoxError> {
        Ok(self.query_f64(QRY_SLEW)?)
    }

    fn trigger_measurement(
        &mut self,
        extra_channels: &BTreeSet<String>,
    ) -> std::result::Result<Fields, BoxError> {
        let mut fields = Fields::new();
        fields.insert(READBACK_FIELD.to_string(), self.query_f64(QRY_CURRENT)?);
        for name in extra_channels {
            match CHANNELS.iter().find(|(n, _)| n == name) {
                Some((_, q)) => {
                    let v = self.query_f64(q)?;
                    fields.insert(name.clone(), v);
                }
                None => tracing::debug!(channel = %name, "unknown channel ignored"),
            }
        }
        Ok(fields)
    }

    fn set_slew_rate(&mut self, units_per_s: f64) -> std::result::Result<(), BoxError> {
        Ok(self.send(&format!("{CMD_SLEW} {units_per_s:.6}"))?)
    }

    fn power_off(&mut self) -> std::result::Result<(), BoxError> {
        Ok(self.send(CMD_OUTPUT_OFF)?)
    }

    fn snapshot(&mut self) -> std::result::Result<Fields, BoxError> {
        let mut fields = Fields::new();
        fields.insert(READBACK_FIELD.to_string(), self.query_f64(QRY_CURRENT)?);
        for (name, q) in CHANNELS {
            let v = self.query_f64(q)?;
            fields.insert((*name).to_string(), v);
        }
        Ok(fields)
    }
}

#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Ramp-and-settle controller (hardware-agnostic).
//!
//! Walks a programmable current source through a sequence of setpoints. For
//! each one it waits, commands a ramped write, waits for the readback to sit
//! inside a tolerance band for a stability window, holds, and triggers a
//! measurement. All device access goes through `psramp_traits::CurrentSource`
//! (plus optional `Detector`s); all suspension goes through
//! `psramp_traits::Clock`, so the whole scan runs under a `ManualClock` in tests.
//!
//! ## Architecture
//!
//! - **Sequencing**: start/stop/step to setpoints (`sequence` module)
//! - **Timeout**: slew-rate based per-step deadline (`timeout` module)
//! - **Waiter**: tolerance band + stability window (`waiter` module)
//! - **Step**: one setpoint transition (`step` module)
//! - **Scan**: pollable driver over all steps (`RampScan`, `ScanStatus`)
//! - **Runner**: blocking drivers returning a `ScanReport`

pub mod builder;
pub mod config;
pub mod conversions;
pub mod error;
pub mod hw_error;
pub mod runner;
pub mod scan;
pub mod sequence;
pub mod status;
pub mod step;
pub mod timeout;
pub mod util;
pub mod waiter;

pub use builder::{Missing, RampScanBuilder, Set, build_scan};
pub use config::{MAX_SETTLE_DURATION, SettleCfg};
pub use error::{BuildError, RampError, Report, Result};
pub use runner::{ScanReport, ramp_scan, run, run_with};
pub use scan::{DynRampScan, RampScan};
pub use sequence::{MAX_SETPOINTS, ScanRange, SetpointSequence};
pub use status::ScanStatus;
pub use step::{StepExecutor, StepReading};
pub use timeout::{FALLBACK_SLEW_RATE, SAFETY_MARGIN, SlewRate, dynamic_timeout, effective_slew_rate};
pub use waiter::{InBandWaiter, Settled, WaitParams, WaitStatus, required_samples, settle_at};

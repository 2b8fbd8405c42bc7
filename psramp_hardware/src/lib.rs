//! Concrete `CurrentSource` / `Detector` adapters.
//!
//! - `sim`: clock-driven, slew-limited power supply model plus a gaussmeter
//!   that follows its output. Always available.
//! - `scpi`: SCPI over a serial line (feature `hardware`).

pub mod error;
#[cfg(feature = "hardware")]
pub mod scpi;
pub mod sim;

pub use error::HwError;
#[cfg(feature = "hardware")]
pub use scpi::ScpiSupply;
pub use sim::{OutputProbe, SimulatedGaussmeter, SimulatedSupply};

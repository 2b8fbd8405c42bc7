//! Maps `Box<dyn Error>` from trait boundaries to typed `RampError`.
//!
//! The traits in `psramp_traits` use `Box<dyn Error + Send + Sync>` for maximum
//! flexibility; this module converts those to our typed error enum, with an
//! optional feature-gated path for `psramp_hardware::HwError` downcasting.

use crate::error::RampError;
use psramp_traits::BoxError;

/// Map a trait-boundary error to a typed `RampError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to a generic hardware error carrying the message.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> RampError {
    // Feature-gated: try to downcast to HwError for precise mapping
    #[cfg(feature = "hardware-errors")]
    {
        use psramp_hardware::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout | HwError::Serial(_) | HwError::Io(_) => {
                    RampError::Hardware(hw.to_string())
                }
                other => RampError::HardwareFault(other.to_string()),
            };
        }
    }

    RampError::Hardware(e.to_string())
}

#[inline]
pub(crate) fn map_boxed(e: BoxError) -> RampError {
    map_hw_error(&*e)
}

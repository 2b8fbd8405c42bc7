//! Dynamic per-step timeout derived from the device's reported slew rate.

use std::fmt::Display;
use std::time::Duration;

use crate::util::secs_to_duration;

/// Slew rate (units/s) substituted when the device reports garbage or the read fails.
pub const FALLBACK_SLEW_RATE: f64 = 0.1;

/// Fixed allowance for communication and controller overhead.
pub const SAFETY_MARGIN: Duration = Duration::from_secs(2);

/// Slew rate actually used for a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlewRate {
    pub value: f64,
    /// True when `FALLBACK_SLEW_RATE` replaced the device's answer.
    pub fallback: bool,
}

/// Apply the fallback policy to a slew-rate read.
///
/// Read errors, non-positive and non-finite values all become
/// `FALLBACK_SLEW_RATE`; the device is never trusted to make us wait forever.
pub fn effective_slew_rate<E: Display>(reading: Result<f64, E>) -> SlewRate {
    match reading {
        Ok(v) if v.is_finite() && v > 0.0 => SlewRate {
            value: v,
            fallback: false,
        },
        Ok(v) => {
            tracing::warn!(
                reported = v,
                fallback = FALLBACK_SLEW_RATE,
                "unusable slew rate reported; using fallback"
            );
            SlewRate {
                value: FALLBACK_SLEW_RATE,
                fallback: true,
            }
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                fallback = FALLBACK_SLEW_RATE,
                "slew rate read failed; using fallback"
            );
            SlewRate {
                value: FALLBACK_SLEW_RATE,
                fallback: true,
            }
        }
    }
}

/// `base_timeout + |target - previous| / slew_rate + SAFETY_MARGIN`, saturating.
///
/// `slew_rate` must be positive and finite; pass it through
/// `effective_slew_rate` first.
pub fn dynamic_timeout(
    target: f64,
    previous: f64,
    slew_rate: f64,
    base_timeout: Duration,
) -> Duration {
    debug_assert!(
        slew_rate.is_finite() && slew_rate > 0.0,
        "dynamic_timeout: slew_rate must be > 0, got {slew_rate}"
    );
    let travel = secs_to_duration((target - previous).abs() / slew_rate);
    base_timeout
        .saturating_add(travel)
        .saturating_add(SAFETY_MARGIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn travel_time_scales_with_distance() {
        let base = Duration::from_secs(5);
        assert_eq!(
            dynamic_timeout(5.0, 2.0, 1.0, base),
            Duration::from_secs(10)
        );
        assert_eq!(
            dynamic_timeout(2.0, 5.0, 1.0, base),
            Duration::from_secs(10)
        );
        assert_eq!(dynamic_timeout(3.0, 3.0, 0.5, base), Duration::from_secs(7));
    }

    #[test]
    fn fallback_applies_to_zero_negative_nan_and_errors() {
        for r in [Ok(0.0), Ok(-1.0), Ok(f64::NAN), Ok(f64::INFINITY)] {
            let s = effective_slew_rate::<&str>(r);
            assert_eq!(s.value, FALLBACK_SLEW_RATE);
            assert!(s.fallback);
        }
        let s = effective_slew_rate::<&str>(Err("bus error"));
        assert_eq!(s.value, FALLBACK_SLEW_RATE);
        assert!(s.fallback);

        let s = effective_slew_rate::<&str>(Ok(2.5));
        assert_eq!(s.value, 2.5);
        assert!(!s.fallback);
    }

    #[test]
    fn stale_slew_register_uses_fallback_rate() {
        let slew = effective_slew_rate::<&str>(Ok(0.0));
        assert_eq!(
            dynamic_timeout(1.0, 0.0, slew.value, Duration::from_secs(5)),
            Duration::from_secs(17)
        );
    }

    #[test]
    fn huge_travel_saturates() {
        let t = dynamic_timeout(f64::MAX, -f64::MAX, 1e-300, Duration::from_secs(5));
        assert_eq!(t, Duration::MAX);
    }
}

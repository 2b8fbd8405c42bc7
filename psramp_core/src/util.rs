//! Small time helpers shared by the controller modules.

use std::time::Duration;

/// Convert seconds to a `Duration`.
/// - NaN and non-positive inputs map to zero.
/// - +inf and values past `Duration::MAX` saturate.
#[inline]
pub fn secs_to_duration(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

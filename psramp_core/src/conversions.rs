//! `From` implementations bridging `psramp_config` types to `psramp_core` types.

use crate::config::SettleCfg;
use crate::sequence::ScanRange;
use crate::util::secs_to_duration;

impl From<&psramp_config::SettleCfg> for SettleCfg {
    fn from(c: &psramp_config::SettleCfg) -> Self {
        Self {
            pre_wait: secs_to_duration(c.pre_wait_s),
            hold: secs_to_duration(c.hold_s),
            tolerance: c.tol,
            base_timeout: secs_to_duration(c.base_timeout),
            dwell: secs_to_duration(c.dwell),
            stable_time: secs_to_duration(c.stable_time),
            max_time: secs_to_duration(c.max_time),
        }
    }
}

impl From<&psramp_config::ScanCfg> for ScanRange {
    fn from(c: &psramp_config::ScanCfg) -> Self {
        Self {
            start: c.start,
            stop: c.stop,
            step: c.step,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn toml_defaults_match_runtime_defaults() {
        let from_toml = SettleCfg::from(&psramp_config::SettleCfg::default());
        assert_eq!(from_toml, SettleCfg::default());
    }

    #[test]
    fn fractional_seconds_convert() {
        let c = psramp_config::SettleCfg {
            dwell: 0.05,
            hold_s: 0.0,
            ..Default::default()
        };
        let s = SettleCfg::from(&c);
        assert_eq!(s.dwell, Duration::from_millis(50));
        assert_eq!(s.hold, Duration::ZERO);
    }
}

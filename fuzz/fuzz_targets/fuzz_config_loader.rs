#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    let Ok(cfg) = psramp_config::load_toml(data) else {
        return;
    };
    if cfg.validate().is_err() {
        return;
    }
    // A validated config must always convert and size its sequence without panicking.
    let range = psramp_core::ScanRange::from(&cfg.scan);
    let settle = psramp_core::SettleCfg::from(&cfg.settle);
    let _ = settle.validate();
    if let Ok(seq) = psramp_core::SetpointSequence::new(range) {
        let _ = seq.get(seq.len().saturating_sub(1));
    }
});

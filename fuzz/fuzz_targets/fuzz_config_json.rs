//! Fuzz target: `ControllerConfig::from_json`
//!
//! Arbitrary text must either be rejected with a `ConfigError` or yield a
//! configuration that passes its own validation.
//!
//! cargo fuzz run fuzz_config_json

#![no_main]

use libfuzzer_sys::fuzz_target;
use pemstack::config::ControllerConfig;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    if let Ok(config) = ControllerConfig::from_json(text) {
        assert!(config.validate().is_ok());
    }
});

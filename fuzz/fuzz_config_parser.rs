//! Fuzz target for the settings file parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_config_parser

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(mut config) = scapgate_config::AppConfig::parse(s) {
            // Anything that parses must survive overrides and re-validation.
            config.apply_env_overrides(|_| Some("1".to_string()));
            let _ = config.validate();
            let _ = config.log_level();
        }
    }
});

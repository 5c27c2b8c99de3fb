//! Fuzz target for beacon.json parsing and validation.
//!
//! Parsing and validation must return errors, never panic.

#![no_main]

use beacon_config::{validate_config, AgentConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(config) = serde_json::from_slice::<AgentConfig>(data) {
        let _ = validate_config(&config);
        let _ = config.redacted();
    }
});

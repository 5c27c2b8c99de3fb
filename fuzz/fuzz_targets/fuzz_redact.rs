//! Fuzz target for payload redaction.
//!
//! Redacting twice must change nothing the second time.

#![no_main]

use beacon_redact::{RedactionPolicy, Redactor};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(mut value) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };
    let policy = RedactionPolicy {
        scrub_secret_values: true,
        ..Default::default()
    };
    let redactor = Redactor::new(policy);
    redactor.redact_value(&mut value);
    let once = value.clone();
    redactor.redact_value(&mut value);
    assert_eq!(once, value);
});

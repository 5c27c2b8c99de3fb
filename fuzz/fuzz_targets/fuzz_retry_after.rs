//! Fuzz target for `Retry-After` parsing.

#![no_main]

use beacon_core::sender::parse_retry_after;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let _ = parse_retry_after(Some(data), chrono::Utc::now());
});

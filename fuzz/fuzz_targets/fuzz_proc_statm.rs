//! Fuzz target for /proc/self/statm parsing.

#![no_main]

use beacon_core::system::parse_statm_resident;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let _ = parse_statm_resident(data);
});

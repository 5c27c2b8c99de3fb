//! Fuzz target for journal line decoding.
//!
//! Any line that decodes must re-encode to a single line that decodes again.

#![no_main]

use beacon_common::Event;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    if let Ok(event) = Event::from_json_line(data) {
        let line = event.to_json_line().expect("decoded event re-encodes");
        assert!(!line.contains('\n'));
        let again = Event::from_json_line(&line).expect("re-encoded line decodes");
        assert_eq!(again.id, event.id);
        assert_eq!(again.event_type, event.event_type);
    }
});

//! The fail-open boundary.
//!
//! Every public entry point reachable from a host application runs inside
//! [`fail_open`]. Inside it, errors are handled where they occur and map to
//! an outcome value; panics stop at the boundary, are reported to the
//! `beacon::diagnostic` log target at debug level, and are replaced by a
//! fallback value. Nothing crosses into the caller.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::debug;

use crate::logging::DIAGNOSTIC_TARGET;

/// Run `f`, returning `fallback` if it panics.
pub fn fail_open<T>(operation: &'static str, fallback: T, f: impl FnOnce() -> T) -> T {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(panic) => {
            debug!(
                target: DIAGNOSTIC_TARGET,
                operation,
                panic = panic_message(&panic),
                "panic contained at fail-open boundary"
            );
            fallback
        }
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_passes_through() {
        assert_eq!(fail_open("op", 0, || 7), 7);
    }

    #[test]
    fn test_panic_yields_fallback() {
        let got = fail_open("op", "fallback", || -> &'static str { panic!("boom") });
        assert_eq!(got, "fallback");
    }

    #[test]
    fn test_panic_message_extraction() {
        let owned: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn std::any::Any + Send> = Box::new("static");
        let other: Box<dyn std::any::Any + Send> = Box::new(42);
        assert_eq!(panic_message(&owned), "owned");
        assert_eq!(panic_message(&borrowed), "static");
        assert_eq!(panic_message(&other), "non-string panic payload");
    }
}

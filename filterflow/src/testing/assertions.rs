//! Test assertions for pipeline runs.

use crate::errors::{ErrorKind, FilterResult};
use crate::stock::SinkHandle;

/// Asserts that `first` was recorded, and recorded before `second`.
pub fn assert_before(events: &[String], first: &str, second: &str) {
    let position = |event: &str| events.iter().position(|e| e == event);
    match (position(first), position(second)) {
        (Some(a), Some(b)) => assert!(
            a < b,
            "Expected '{first}' before '{second}', got {events:?}"
        ),
        (a, b) => panic!(
            "Expected both '{first}' (found: {}) and '{second}' (found: {}) in {events:?}",
            a.is_some(),
            b.is_some()
        ),
    }
}

/// Asserts that a sink captured exactly these text payloads, in order.
pub fn assert_payload_texts(handle: &SinkHandle, expected: &[&str]) {
    let actual = handle.texts();
    assert_eq!(
        actual, expected,
        "Expected texts {expected:?}, got {actual:?}"
    );
}

/// Asserts that a result failed with the given error kind.
pub fn assert_error_kind<T: std::fmt::Debug>(result: &FilterResult<T>, expected: ErrorKind) {
    match result {
        Err(e) => assert_eq!(
            e.kind(),
            expected,
            "Expected a {expected} error, got {e}"
        ),
        Ok(value) => panic!("Expected a {expected} error, got Ok({value:?})"),
    }
}

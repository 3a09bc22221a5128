//! Testing utilities for filterflow pipelines.
//!
//! This module provides:
//! - Recording and failing filters
//! - A shared event log for ordering checks
//! - Assertions over recorded events and captured packets

mod assertions;
mod mocks;

pub use assertions::{assert_before, assert_error_kind, assert_payload_texts};
pub use mocks::{EventLog, FailingFilter, LifecycleProbe, RecordingFilter};

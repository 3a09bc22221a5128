//! Records of per-unit failures.

use crate::errors::{ErrorKind, FilterError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Record of one unit's failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// The innermost filter that raised the error, if known.
    pub filter: Option<String>,
    /// Error message.
    pub error: String,
    /// Error kind.
    pub kind: ErrorKind,
    /// When the failure happened.
    pub timestamp: DateTime<Utc>,
    /// Structured diagnostics for configuration errors raised mid-run, such
    /// as a reset bottle carrying an unusable value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl FailureRecord {
    /// Creates a record for an error.
    #[must_use]
    pub fn new(filter: Option<String>, error: &FilterError) -> Self {
        Self {
            filter,
            error: error.to_string(),
            kind: error.kind(),
            timestamp: Utc::now(),
            details: match error {
                FilterError::Configuration(e) => {
                    Some(Value::Object(e.to_dict().into_iter().collect()))
                }
                _ => None,
            },
        }
    }
}

/// Result of driving a pipeline from a source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Units pulled from the source and sent.
    pub units_in: usize,
    /// Units whose processing failed and was logged.
    pub failures: Vec<FailureRecord>,
}

impl RunSummary {
    /// Returns true if any failures occurred.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

//! Pipeline-wide configuration.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// What a pipeline does when processing one unit fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Return the error to the caller; `run` aborts the pipeline.
    #[default]
    Halt,
    /// Record and log the failure, then keep accepting units.
    LogAndContinue,
}

/// Parameter values supplied by the pipeline, and its failure policy.
///
/// Per-filter values take precedence over global ones. Values for names a
/// filter does not declare are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Values offered to every filter.
    #[serde(default)]
    pub values: BTreeMap<String, Value>,
    /// Values offered to one filter instance, keyed by instance name.
    #[serde(default)]
    pub filter_values: BTreeMap<String, BTreeMap<String, Value>>,
    /// The failure policy.
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl PipelineConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a global value.
    #[must_use]
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Adds a value for one filter instance.
    #[must_use]
    pub fn with_filter_value(
        mut self,
        filter: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.filter_values
            .entry(filter.into())
            .or_default()
            .insert(name.into(), value.into());
        self
    }

    /// Sets the failure policy.
    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Looks up the configured value of a filter parameter.
    #[must_use]
    pub fn lookup(&self, filter: &str, name: &str) -> Option<&Value> {
        self.filter_values
            .get(filter)
            .and_then(|values| values.get(name))
            .or_else(|| self.values.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_precedence() {
        let config = PipelineConfig::new()
            .with_value("size", 8)
            .with_filter_value("b1", "size", 2);

        assert_eq!(config.lookup("b1", "size"), Some(&json!(2)));
        assert_eq!(config.lookup("b2", "size"), Some(&json!(8)));
        assert_eq!(config.lookup("b2", "other"), None);
    }

    #[test]
    fn test_deserialize_defaults() {
        let config: PipelineConfig = serde_json::from_value(json!({
            "values": {"tank_size": 3},
            "failure_policy": "log_and_continue",
        }))
        .unwrap();

        assert_eq!(config.failure_policy, FailurePolicy::LogAndContinue);
        assert!(config.filter_values.is_empty());
        assert_eq!(config.lookup("t", "tank_size"), Some(&json!(3)));
    }
}

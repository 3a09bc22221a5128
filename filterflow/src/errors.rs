//! Error types for the filterflow engine.
//!
//! The taxonomy separates errors that abort pipeline construction
//! (configuration and routing) from errors raised while a single unit is
//! being processed (attribute, data and logic).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Convenience alias used by every filter entry point.
pub type FilterResult<T> = Result<T, FilterError>;

/// The main error type for filterflow operations.
#[derive(Debug, Error)]
pub enum FilterError {
    /// A parameter is missing, malformed or inconsistent.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// A data packet lacks an attribute, or holds it with the wrong type.
    #[error("{0}")]
    Attribute(#[from] AttributeError),

    /// The payload is structurally invalid for the operation.
    #[error("Data error: {0}")]
    Data(String),

    /// The operation is well formed but cannot complete with current values.
    #[error("Logic error: {0}")]
    Logic(String),

    /// The graph shape is invalid for a filter's requirements.
    #[error("{0}")]
    Routing(#[from] RoutingError),

    /// A unit was sent to a pipeline that has already been closed.
    #[error("Pipeline '{0}' is closed")]
    PipelineClosed(String),

    /// IO error raised by a source or a filter owning an external resource.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other error raised by a plugin filter.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FilterError {
    /// Creates a data error.
    #[must_use]
    pub fn data(message: impl Into<String>) -> Self {
        Self::Data(message.into())
    }

    /// Creates a logic error.
    #[must_use]
    pub fn logic(message: impl Into<String>) -> Self {
        Self::Logic(message.into())
    }

    /// Returns the kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Attribute(_) => ErrorKind::Attribute,
            Self::Data(_) => ErrorKind::Data,
            Self::Logic(_) => ErrorKind::Logic,
            Self::Routing(_) => ErrorKind::Routing,
            Self::PipelineClosed(_) => ErrorKind::Closed,
            Self::Io(_) | Self::Other(_) => ErrorKind::External,
        }
    }

    /// Returns true if the error can never be recovered by skipping a unit.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Configuration | ErrorKind::Routing | ErrorKind::Closed
        )
    }
}

/// Coarse classification of a [`FilterError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Configuration error.
    Configuration,
    /// Attribute error.
    Attribute,
    /// Data error.
    Data,
    /// Logic error.
    Logic,
    /// Routing error.
    Routing,
    /// The pipeline was already closed.
    Closed,
    /// IO or plugin error.
    External,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Attribute => write!(f, "attribute"),
            Self::Data => write!(f, "data"),
            Self::Logic => write!(f, "logic"),
            Self::Routing => write!(f, "routing"),
            Self::Closed => write!(f, "closed"),
            Self::External => write!(f, "external"),
        }
    }
}

/// Metadata about a configuration error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "CONFIG-MISSING_PARAM").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::Value::String(self.code.clone()));
        map.insert("summary".to_string(), serde_json::Value::String(self.summary.clone()));

        if let Some(ref hint) = self.fix_hint {
            map.insert("fix_hint".to_string(), serde_json::Value::String(hint.clone()));
        }
        if !self.context.is_empty() {
            let context_map: serde_json::Map<String, serde_json::Value> = self
                .context
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect();
            map.insert("context".to_string(), serde_json::Value::Object(context_map));
        }

        map
    }
}

/// Error raised when a pipeline or one of its filters is misconfigured.
///
/// Always raised eagerly, before any data flows.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ConfigurationError {
    /// The error message.
    pub message: String,
    /// The filters involved in the error.
    pub filters: Vec<String>,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl ConfigurationError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            filters: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the filters involved.
    #[must_use]
    pub fn with_filters(mut self, filters: Vec<String>) -> Self {
        self.filters = filters;
        self
    }

    /// Sets the contract error info, taking the stock hint for its code when
    /// it carries none.
    #[must_use]
    pub fn with_error_info(mut self, mut info: ContractErrorInfo) -> Self {
        if info.fix_hint.is_none() {
            info.fix_hint = ContractSuggestions::get(&info.code).map(str::to_string);
        }
        self.error_info = Some(info);
        self
    }

    /// Returns the contract error code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }

    /// A parameter required by the filter was never provided.
    #[must_use]
    pub fn missing_param(filter: &str, param: &str) -> Self {
        Self::new(format!("Filter '{filter}' requires parameter '{param}' but it is unset"))
            .with_filters(vec![filter.to_string()])
            .with_error_info(
                ContractErrorInfo::new("CONFIG-MISSING_PARAM", format!("'{param}' is unset"))
                    .with_context_entry("param", param)
                    .with_fix_hint(
                        "Provide the parameter explicitly or through the pipeline config.",
                    ),
            )
    }

    /// A parameter name is not part of the filter's schema.
    #[must_use]
    pub fn unknown_param(filter: &str, param: &str) -> Self {
        Self::new(format!("Filter '{filter}' has no parameter named '{param}'"))
            .with_filters(vec![filter.to_string()])
            .with_error_info(
                ContractErrorInfo::new("CONFIG-UNKNOWN_PARAM", format!("'{param}' is not declared"))
                    .with_context_entry("param", param),
            )
    }

    /// A parameter holds a value the filter cannot use.
    #[must_use]
    pub fn bad_value(filter: &str, param: &str, detail: impl fmt::Display) -> Self {
        Self::new(format!("Filter '{filter}' parameter '{param}': {detail}"))
            .with_filters(vec![filter.to_string()])
            .with_error_info(
                ContractErrorInfo::new("CONFIG-BAD_VALUE", format!("bad value for '{param}'"))
                    .with_context_entry("param", param),
            )
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("message".to_string(), serde_json::Value::String(self.message.clone()));
        map.insert(
            "filters".to_string(),
            serde_json::Value::Array(
                self.filters
                    .iter()
                    .map(|s| serde_json::Value::String(s.clone()))
                    .collect(),
            ),
        );
        if let Some(ref info) = self.error_info {
            let info_map: serde_json::Map<String, serde_json::Value> =
                info.to_dict().into_iter().collect();
            map.insert("error_info".to_string(), serde_json::Value::Object(info_map));
        }
        map
    }
}

/// Errors raised when a packet attribute cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttributeError {
    /// The packet has no attribute with this name.
    #[error("Packet has no attribute '{name}'")]
    Missing {
        /// The attribute name.
        name: String,
    },

    /// The attribute exists but holds the wrong kind of value.
    #[error("Attribute '{name}' is {found}, expected {expected}")]
    WrongType {
        /// The attribute name.
        name: String,
        /// The expected kind of value.
        expected: &'static str,
        /// The value found.
        found: String,
    },

    /// A filter accessed an attribute outside its declared schema.
    #[error("Filter '{filter}' accessed attribute '{name}' which it did not declare")]
    Undeclared {
        /// The filter instance name.
        filter: String,
        /// The attribute name.
        name: String,
    },

    /// The attribute is already set and may not be overwritten.
    #[error("Attribute '{name}' is already set and can't be reset")]
    AlreadySet {
        /// The attribute name.
        name: String,
    },
}

impl AttributeError {
    /// Creates a missing-attribute error.
    #[must_use]
    pub fn missing(name: impl Into<String>) -> Self {
        Self::Missing { name: name.into() }
    }

    /// Creates a wrong-type error.
    #[must_use]
    pub fn wrong_type(
        name: impl Into<String>,
        expected: &'static str,
        found: &serde_json::Value,
    ) -> Self {
        Self::WrongType {
            name: name.into(),
            expected,
            found: found.to_string(),
        }
    }
}

/// Errors raised when the graph shape is invalid.
#[derive(Debug, Clone, Error)]
pub enum RoutingError {
    /// A filter's wiring requirement is not met.
    #[error("Filter '{filter}' {requirement}")]
    Topology {
        /// The filter instance name.
        filter: String,
        /// The unmet requirement, phrased as "must ...".
        requirement: String,
    },

    /// A route on a filter was linked twice.
    #[error("Filter '{filter}' already has a {route} link")]
    LinkTaken {
        /// The filter instance name.
        filter: String,
        /// The route.
        route: String,
    },

    /// A forwarding cycle exists that no tank feeder breaks.
    #[error("Forwarding cycle in pipeline: {}", path.join(" -> "))]
    Cycle {
        /// The path of filters forming the cycle.
        path: Vec<String>,
    },

    /// A unit reached a filter whose entry point is still executing.
    #[error("Filter '{filter}' is already executing; feed it back through a tank instead")]
    Reentrant {
        /// The filter instance name.
        filter: String,
    },
}

impl RoutingError {
    /// Creates a topology error.
    #[must_use]
    pub fn topology(filter: impl Into<String>, requirement: impl Into<String>) -> Self {
        Self::Topology {
            filter: filter.into(),
            requirement: requirement.into(),
        }
    }
}

/// Provides default suggestions for common configuration error codes.
pub struct ContractSuggestions;

impl ContractSuggestions {
    /// Gets a suggestion for a given error code.
    #[must_use]
    pub fn get(code: &str) -> Option<&'static str> {
        match code {
            "CONFIG-EMPTY" => Some("Add at least one filter to the pipeline before building."),
            "CONFIG-DUPLICATE_NAME" => Some(
                "Instance names must be unique within a pipeline. Rename one of the filters.",
            ),
            "CONFIG-UNKNOWN_FILTER" => Some(
                "Links may only reference filters added earlier. Check for typos in names.",
            ),
            "CONFIG-UNKNOWN_TYPE" => Some(
                "Register a factory for the type tag, or use one of the stock type tags.",
            ),
            "CONFIG-UNKNOWN_PARAM" => {
                Some("Check the filter's parameter schema for the exact name.")
            }
            "CONFIG-MISSING_PARAM" => Some(
                "Provide the parameter explicitly, through the pipeline config, \
                 or as a schema default.",
            ),
            "CONFIG-BAD_VALUE" => Some("Check the accepted values for the parameter."),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_error_info_creation() {
        let info = ContractErrorInfo::new("TEST-001", "Test error")
            .with_fix_hint("Fix this by doing that")
            .with_context_entry("filter", "batch1");

        assert_eq!(info.code, "TEST-001");
        assert_eq!(info.summary, "Test error");
        assert_eq!(info.fix_hint, Some("Fix this by doing that".to_string()));
        assert_eq!(info.context.get("filter"), Some(&"batch1".to_string()));
    }

    #[test]
    fn test_configuration_error_to_dict() {
        let err = ConfigurationError::new("Test error")
            .with_filters(vec!["a".to_string(), "b".to_string()]);

        let dict = err.to_dict();
        assert_eq!(dict.get("message").unwrap(), "Test error");
        assert_eq!(dict.get("filters").unwrap(), &serde_json::json!(["a", "b"]));
    }

    #[test]
    fn test_missing_param_code() {
        let err = ConfigurationError::missing_param("batch1", "size");
        assert_eq!(err.code(), Some("CONFIG-MISSING_PARAM"));
        assert!(err.to_string().contains("'size'"));
        assert_eq!(err.filters, vec!["batch1".to_string()]);
    }

    #[test]
    fn test_error_kinds() {
        let err: FilterError = AttributeError::missing("seq_num").into();
        assert_eq!(err.kind(), ErrorKind::Attribute);
        assert!(!err.is_fatal());

        let err: FilterError = RoutingError::Reentrant { filter: "t".into() }.into();
        assert_eq!(err.kind(), ErrorKind::Routing);
        assert!(err.is_fatal());

        assert_eq!(FilterError::logic("x").kind(), ErrorKind::Logic);
        assert_eq!(ErrorKind::Data.to_string(), "data");
    }

    #[test]
    fn test_cycle_message() {
        let err = RoutingError::Cycle {
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        assert!(err.to_string().contains("a -> b -> a"));
    }

    #[test]
    fn test_contract_suggestions() {
        assert!(ContractSuggestions::get("CONFIG-MISSING_PARAM").is_some());
        assert!(ContractSuggestions::get("UNKNOWN").is_none());
    }

    #[test]
    fn test_stock_hint_fills_missing_fix_hint() {
        let err = ConfigurationError::unknown_param("batch1", "sise");
        let hint = err.error_info.and_then(|info| info.fix_hint);
        assert_eq!(hint.as_deref(), ContractSuggestions::get("CONFIG-UNKNOWN_PARAM"));

        let err = ConfigurationError::missing_param("batch1", "size");
        let hint = err.error_info.and_then(|info| info.fix_hint).unwrap();
        assert!(hint.starts_with("Provide the parameter explicitly or"));
    }
}

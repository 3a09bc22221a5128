//! Parameter schemas and resolved parameter values.
//!
//! Every filter declares an ordered [`ParameterSchema`]. At pipeline build time
//! the schema is resolved into [`Params`] using, in order: the explicit value
//! given for the instance, the per-filter pipeline config, the global pipeline
//! config, the schema default, and finally the unset sentinel.

use crate::core::Route;
use crate::errors::ConfigurationError;
use crate::pipeline::PipelineConfig;
use serde_json::{Map, Value};

/// The default of a declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamDefault {
    /// No default: the parameter stays unset unless provided.
    Unset,
    /// A default value. `Value::Null` is a real value, distinct from unset.
    Value(Value),
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    /// The parameter name.
    pub name: String,
    /// The default.
    pub default: ParamDefault,
}

/// The ordered list of parameters a filter accepts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSchema {
    specs: Vec<ParamSpec>,
}

impl ParameterSchema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a parameter with no default.
    #[must_use]
    pub fn required(mut self, name: impl Into<String>) -> Self {
        self.specs.push(ParamSpec {
            name: name.into(),
            default: ParamDefault::Unset,
        });
        self
    }

    /// Declares a parameter with a default value.
    #[must_use]
    pub fn optional(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.specs.push(ParamSpec {
            name: name.into(),
            default: ParamDefault::Value(default.into()),
        });
        self
    }

    /// Appends all parameters of another schema.
    #[must_use]
    pub fn extend(mut self, other: Self) -> Self {
        self.specs.extend(other.specs);
        self
    }

    /// Returns the declared names in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.name.as_str()).collect()
    }

    /// Returns true if a name is declared.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.specs.iter().any(|s| s.name == name)
    }

    /// Returns the declared specs.
    #[must_use]
    pub fn specs(&self) -> &[ParamSpec] {
        &self.specs
    }
}

/// A resolved parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Never provided.
    Unset,
    /// Provided, possibly as null, empty or zero.
    Set(Value),
}

impl ParamValue {
    /// Returns the value if set.
    #[must_use]
    pub fn as_set(&self) -> Option<&Value> {
        match self {
            Self::Set(v) => Some(v),
            Self::Unset => None,
        }
    }
}

/// The resolved parameters of one filter instance.
///
/// Getters fail fast: dereferencing an unset parameter is a
/// `CONFIG-MISSING_PARAM` error, and a value of the wrong shape is a
/// `CONFIG-BAD_VALUE` error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    filter: String,
    values: Vec<(String, ParamValue)>,
}

impl Params {
    /// Resolves a schema for the named filter instance.
    pub fn resolve(
        schema: &ParameterSchema,
        filter: &str,
        explicit: &Map<String, Value>,
        config: &PipelineConfig,
    ) -> Result<Self, ConfigurationError> {
        if let Some(unknown) = explicit.keys().find(|k| !schema.contains(k)) {
            return Err(ConfigurationError::unknown_param(filter, unknown));
        }

        let values = schema
            .specs()
            .iter()
            .map(|spec| {
                let value = explicit
                    .get(&spec.name)
                    .or_else(|| config.lookup(filter, &spec.name))
                    .cloned()
                    .map(ParamValue::Set)
                    .unwrap_or_else(|| match &spec.default {
                        ParamDefault::Value(v) => ParamValue::Set(v.clone()),
                        ParamDefault::Unset => ParamValue::Unset,
                    });
                (spec.name.clone(), value)
            })
            .collect();

        Ok(Self {
            filter: filter.to_string(),
            values,
        })
    }

    /// Returns the owning filter instance name.
    #[must_use]
    pub fn filter_name(&self) -> &str {
        &self.filter
    }

    fn slot(&self, name: &str) -> Result<&ParamValue, ConfigurationError> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| ConfigurationError::unknown_param(&self.filter, name))
    }

    /// Gets a parameter value, failing if it is unset.
    pub fn get(&self, name: &str) -> Result<&Value, ConfigurationError> {
        self.slot(name)?
            .as_set()
            .ok_or_else(|| ConfigurationError::missing_param(&self.filter, name))
    }

    /// Gets a parameter value if it is declared and set.
    #[must_use]
    pub fn opt(&self, name: &str) -> Option<&Value> {
        self.slot(name).ok().and_then(ParamValue::as_set)
    }

    /// Gets a parameter value if it is set to something other than null.
    #[must_use]
    pub fn non_null(&self, name: &str) -> Option<&Value> {
        self.opt(name).filter(|v| !v.is_null())
    }

    /// Returns true if the parameter is declared and set.
    #[must_use]
    pub fn is_set(&self, name: &str) -> bool {
        self.opt(name).is_some()
    }

    fn expected(&self, name: &str, what: &str, found: &Value) -> ConfigurationError {
        ConfigurationError::bad_value(&self.filter, name, format!("expected {what}, found {found}"))
    }

    /// Gets a string parameter.
    pub fn str(&self, name: &str) -> Result<&str, ConfigurationError> {
        let value = self.get(name)?;
        value
            .as_str()
            .ok_or_else(|| self.expected(name, "a string", value))
    }

    /// Gets an integer parameter.
    pub fn i64(&self, name: &str) -> Result<i64, ConfigurationError> {
        let value = self.get(name)?;
        value
            .as_i64()
            .ok_or_else(|| self.expected(name, "an integer", value))
    }

    /// Gets a non-negative integer parameter.
    pub fn usize(&self, name: &str) -> Result<usize, ConfigurationError> {
        let value = self.get(name)?;
        value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| self.expected(name, "a non-negative integer", value))
    }

    /// Gets a numeric parameter.
    pub fn f64(&self, name: &str) -> Result<f64, ConfigurationError> {
        let value = self.get(name)?;
        value
            .as_f64()
            .ok_or_else(|| self.expected(name, "a number", value))
    }

    /// Gets a boolean parameter.
    pub fn bool(&self, name: &str) -> Result<bool, ConfigurationError> {
        let value = self.get(name)?;
        value
            .as_bool()
            .ok_or_else(|| self.expected(name, "a boolean", value))
    }

    /// Gets a route parameter (`"main"` or `"branch"`).
    pub fn route(&self, name: &str) -> Result<Route, ConfigurationError> {
        self.str(name)?
            .parse()
            .map_err(|e: ConfigurationError| {
                ConfigurationError::bad_value(&self.filter, name, e.message)
            })
    }

    /// Gets a list of strings. A single string is a one-element list.
    pub fn str_list(&self, name: &str) -> Result<Vec<String>, ConfigurationError> {
        let value = self.get(name)?;
        match value {
            Value::String(s) => Ok(vec![s.clone()]),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| self.expected(name, "strings", item))
                })
                .collect(),
            other => Err(ConfigurationError::bad_value(
                &self.filter,
                name,
                format!("expected a list of strings, found {other}"),
            )),
        }
    }

    /// Sets a declared parameter.
    pub fn set(&mut self, name: &str, value: Value) -> Result<(), ConfigurationError> {
        let filter = self.filter.clone();
        let slot = self
            .values
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| ConfigurationError::unknown_param(&filter, name))?;
        *slot = ParamValue::Set(value);
        Ok(())
    }

    /// Fails on the first unset parameter.
    pub fn ensure_all_set(&self) -> Result<(), ConfigurationError> {
        match self.values.iter().find(|(_, v)| *v == ParamValue::Unset) {
            Some((name, _)) => Err(ConfigurationError::missing_param(&self.filter, name)),
            None => Ok(()),
        }
    }

    /// Returns the parameter names in schema order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.values.iter().map(|(n, _)| n.as_str()).collect()
    }
}

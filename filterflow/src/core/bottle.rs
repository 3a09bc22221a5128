//! Message bottles: addressed control units.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Where a bottle is addressed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    /// A filter instance name, unique within a pipeline.
    Name(String),
    /// A filter type tag; the first filter of that type intercepts it.
    TypeTag(String),
}

impl Destination {
    /// Addresses a filter instance by name.
    #[must_use]
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    /// Addresses the first filter of a type.
    #[must_use]
    pub fn type_tag(tag: impl Into<String>) -> Self {
        Self::TypeTag(tag.into())
    }

    /// Returns true if a filter with this name and type tag is the addressee.
    #[must_use]
    pub fn matches(&self, name: &str, type_tag: &str) -> bool {
        match self {
            Self::Name(n) => n == name,
            Self::TypeTag(t) => t == type_tag,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(n) => write!(f, "{n}"),
            Self::TypeTag(t) => write!(f, "<{t}>"),
        }
    }
}

/// The control operation carried by a bottle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BottleMessage {
    /// Set the parameter `param_name` to `new_value`.
    Reset,
    /// A filter-specific event name.
    Custom(String),
}

impl From<&str> for BottleMessage {
    fn from(s: &str) -> Self {
        if s == "reset" {
            Self::Reset
        } else {
            Self::Custom(s.to_string())
        }
    }
}

impl From<String> for BottleMessage {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl fmt::Display for BottleMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reset => write!(f, "reset"),
            Self::Custom(name) => write!(f, "{name}"),
        }
    }
}

/// A control unit travelling the same links as packets.
///
/// Bottles are never handed to a filter's data entry point. New bottles are
/// single use: the addressee consumes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageBottle {
    /// The addressee.
    pub destination: Destination,
    /// The control operation.
    pub message: BottleMessage,
    /// Keyword values carried to the addressee.
    #[serde(default)]
    pub payload: Map<String, Value>,
    /// If true, the addressee does not forward the bottle.
    #[serde(default = "default_single_use")]
    pub single_use: bool,
}

fn default_single_use() -> bool {
    true
}

impl MessageBottle {
    /// Creates a bottle.
    #[must_use]
    pub fn new(destination: Destination, message: impl Into<BottleMessage>) -> Self {
        Self {
            destination,
            message: message.into(),
            payload: Map::new(),
            single_use: true,
        }
    }

    /// Creates a bottle addressed to a filter instance.
    #[must_use]
    pub fn to_filter(name: impl Into<String>, message: impl Into<BottleMessage>) -> Self {
        Self::new(Destination::name(name), message)
    }

    /// Creates a bottle addressed to the first filter of a type.
    #[must_use]
    pub fn to_type(type_tag: impl Into<String>, message: impl Into<BottleMessage>) -> Self {
        Self::new(Destination::type_tag(type_tag), message)
    }

    /// Creates a reset bottle setting `param_name` to `new_value` on a filter.
    #[must_use]
    pub fn reset(target: impl Into<String>, param_name: &str, new_value: impl Into<Value>) -> Self {
        Self::to_filter(target, BottleMessage::Reset)
            .with_value("param_name", param_name)
            .with_value("new_value", new_value)
    }

    /// Adds a keyword value.
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Sets whether the addressee consumes the bottle.
    #[must_use]
    pub fn single_use(mut self, single_use: bool) -> Self {
        self.single_use = single_use;
        self
    }

    /// Gets a keyword value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Always true.
    #[must_use]
    pub fn is_control(&self) -> bool {
        true
    }

    /// Returns `(param_name, new_value)` for a well formed reset bottle.
    #[must_use]
    pub fn reset_target(&self) -> Option<(&str, &Value)> {
        if self.message != BottleMessage::Reset {
            return None;
        }
        let name = self.payload.get("param_name")?.as_str()?;
        let value = self.payload.get("new_value").unwrap_or(&Value::Null);
        Some((name, value))
    }
}

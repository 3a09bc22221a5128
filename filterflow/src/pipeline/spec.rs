//! Serializable pipeline assembly descriptions.

use super::PipelineConfig;
use crate::core::Route;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One filter instance in a pipeline description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Registered type tag.
    pub type_tag: String,
    /// Instance name, unique within the pipeline.
    pub name: String,
    /// Explicit parameter values.
    #[serde(default)]
    pub params: serde_json::Map<String, Value>,
}

impl FilterSpec {
    /// Creates a filter spec with no explicit parameters.
    #[must_use]
    pub fn new(type_tag: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            type_tag: type_tag.into(),
            name: name.into(),
            params: serde_json::Map::new(),
        }
    }

    /// Adds an explicit parameter value.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

/// A link from one filter's route to another filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSpec {
    /// Upstream instance name.
    pub from: String,
    /// Downstream instance name.
    pub to: String,
    /// The upstream route.
    #[serde(default)]
    pub route: Route,
}

impl LinkSpec {
    /// Creates a link.
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>, route: Route) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            route,
        }
    }
}

/// A complete pipeline description: filters, explicit wiring, the entry
/// filter and the pipeline config.
///
/// Parsing files into a spec is left to the caller, e.g. with
/// `serde_json::from_str`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    /// Pipeline name.
    pub name: String,
    /// Filters, in insertion order.
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
    /// Links between filters.
    #[serde(default)]
    pub links: Vec<LinkSpec>,
    /// Entry filter; the first filter when absent.
    #[serde(default)]
    pub entry: Option<String>,
    /// Pipeline config.
    #[serde(default)]
    pub config: PipelineConfig,
}

impl PipelineSpec {
    /// Creates an empty spec.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds a filter.
    #[must_use]
    pub fn filter(mut self, spec: FilterSpec) -> Self {
        self.filters.push(spec);
        self
    }

    /// Adds a link.
    #[must_use]
    pub fn link(mut self, from: impl Into<String>, to: impl Into<String>, route: Route) -> Self {
        self.links.push(LinkSpec::new(from, to, route));
        self
    }
}

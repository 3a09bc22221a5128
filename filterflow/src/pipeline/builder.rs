//! Pipeline builder with validation.

use super::graph::{FilterSlot, Graph, Node, NodeId};
use super::{LinkSpec, Pipeline, PipelineConfig, PipelineSpec, ShutdownToken};
use crate::core::{AttributeSchema, FilterState, Route};
use crate::errors::{ConfigurationError, ContractErrorInfo, FilterResult, RoutingError};
use crate::filter::{Filter, FilterRegistry, LinkInfo, SetupContext};
use crate::params::Params;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, warn};

/// Entry node, graph order, resolved params and attribute schemas.
type SetupParts = (NodeId, Vec<NodeId>, Vec<Params>, Vec<Option<AttributeSchema>>);

struct PendingFilter {
    name: String,
    filter: Box<dyn Filter>,
    explicit: Map<String, Value>,
    main: Option<NodeId>,
    branch: Option<NodeId>,
}

/// Builder for creating validated pipelines.
///
/// Filters are added with their explicit parameters, then wired with main and
/// branch links. `build` validates the whole graph and runs every filter's
/// setup hooks before any data flows.
pub struct PipelineBuilder {
    name: String,
    config: PipelineConfig,
    filters: Vec<PendingFilter>,
    entry: Option<String>,
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: PipelineConfig::default(),
            filters: Vec::new(),
            entry: None,
        }
    }

    /// Sets the pipeline config.
    #[must_use]
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the entry filter. Defaults to the first filter added.
    #[must_use]
    pub fn entry(mut self, name: impl Into<String>) -> Self {
        self.entry = Some(name.into());
        self
    }

    /// Adds a filter instance with explicit parameters (a JSON object or null).
    pub fn filter<F>(self, name: impl Into<String>, filter: F, params: Value) -> FilterResult<Self>
    where
        F: Filter + 'static,
    {
        self.boxed(name, Box::new(filter), params)
    }

    /// Adds a boxed filter instance.
    pub fn boxed(
        mut self,
        name: impl Into<String>,
        filter: Box<dyn Filter>,
        params: Value,
    ) -> FilterResult<Self> {
        let name = name.into();
        if self.index_of(&name).is_some() {
            return Err(ConfigurationError::new(format!("Duplicate filter name '{name}'"))
                .with_filters(vec![name.clone()])
                .with_error_info(
                    ContractErrorInfo::new(
                        "CONFIG-DUPLICATE_NAME",
                        format!("'{name}' is already used"),
                    )
                    .with_fix_hint("Instance names must be unique within a pipeline."),
                )
                .into());
        }
        let explicit = match params {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => {
                return Err(ConfigurationError::new(format!(
                    "Parameters of '{name}' must be an object, found {other}"
                ))
                .with_filters(vec![name])
                .into())
            }
        };
        self.filters.push(PendingFilter {
            name,
            filter,
            explicit,
            main: None,
            branch: None,
        });
        Ok(self)
    }

    /// Adds a filter constructed from a registry.
    pub fn create(
        self,
        registry: &FilterRegistry,
        type_tag: &str,
        name: impl Into<String>,
        params: Value,
    ) -> FilterResult<Self> {
        let filter = registry.create(type_tag)?;
        self.boxed(name, filter, params)
    }

    /// Links `from`'s `route` to `to`.
    pub fn link(mut self, from: &str, to: &str, route: Route) -> FilterResult<Self> {
        let source = self.require(from)?;
        let target = self.require(to)?;
        let pending = &mut self.filters[source];
        let slot = match route {
            Route::Main => &mut pending.main,
            Route::Branch => &mut pending.branch,
        };
        if slot.is_some() {
            return Err(RoutingError::LinkTaken {
                filter: from.to_string(),
                route: route.to_string(),
            }
            .into());
        }
        *slot = Some(target);
        Ok(self)
    }

    /// Links `from`'s main route to `to`.
    pub fn main(self, from: &str, to: &str) -> FilterResult<Self> {
        self.link(from, to, Route::Main)
    }

    /// Links `from`'s branch route to `to`.
    pub fn branch(self, from: &str, to: &str) -> FilterResult<Self> {
        self.link(from, to, Route::Branch)
    }

    /// Links each named filter's main route to the next one.
    pub fn chain(mut self, names: &[&str]) -> FilterResult<Self> {
        for pair in names.windows(2) {
            self = self.main(pair[0], pair[1])?;
        }
        Ok(self)
    }

    /// Creates a builder from a serialized description.
    pub fn from_spec(spec: PipelineSpec, registry: &FilterRegistry) -> FilterResult<Self> {
        let mut builder = Self::new(spec.name).config(spec.config);
        for filter in spec.filters {
            let params = Value::Object(filter.params);
            builder = builder.create(registry, &filter.type_tag, filter.name, params)?;
        }
        for LinkSpec { from, to, route } in spec.links {
            builder = builder.link(&from, &to, route)?;
        }
        if let Some(entry) = spec.entry {
            builder = builder.entry(entry);
        }
        Ok(builder)
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of filters.
    #[must_use]
    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    fn index_of(&self, name: &str) -> Option<NodeId> {
        self.filters.iter().position(|f| f.name == name)
    }

    fn require(&self, name: &str) -> Result<NodeId, ConfigurationError> {
        self.index_of(name).ok_or_else(|| {
            ConfigurationError::new(format!("Unknown filter '{name}'"))
                .with_filters(vec![name.to_string()])
                .with_error_info(
                    ContractErrorInfo::new("CONFIG-UNKNOWN_FILTER", format!("'{name}' not found"))
                        .with_fix_hint("Links may only reference filters added earlier."),
                )
        })
    }

    /// Builds the pipeline.
    ///
    /// Validates the graph, resolves parameters, then runs `validate_params`,
    /// `init_filter` and `zero_inputs` on every filter in graph order. On any
    /// failure every filter is closed before the error is returned.
    pub fn build(mut self) -> FilterResult<Pipeline> {
        let shutdown = ShutdownToken::new();
        match self.validate_and_setup(&shutdown) {
            Ok((entry, order, params, schemas)) => {
                let nodes = self
                    .filters
                    .into_iter()
                    .zip(params.into_iter().zip(schemas))
                    .map(|(pending, (params, schema))| Node {
                        type_tag: pending.filter.type_tag().to_string(),
                        name: pending.name,
                        slot: Some(FilterSlot {
                            filter: pending.filter,
                            params,
                            schema,
                        }),
                        main: pending.main,
                        branch: pending.branch,
                        state: FilterState::Initialized,
                    })
                    .collect();
                let graph = Graph::new(self.name.clone(), nodes, shutdown);
                debug!(pipeline = %self.name, filters = graph.len(), "Pipeline built");
                Ok(Pipeline::new(self.name, graph, entry, order, self.config.failure_policy))
            }
            Err(e) => {
                warn!(pipeline = %self.name, error = %e, "Pipeline build failed, closing filters");
                for pending in &mut self.filters {
                    if let Err(close_err) = pending.filter.close_filter() {
                        warn!(filter = %pending.name, error = %close_err, "Close failed");
                    }
                }
                Err(e)
            }
        }
    }

    #[allow(clippy::type_complexity)]
    fn validate_and_setup(
        &mut self,
        shutdown: &ShutdownToken,
    ) -> FilterResult<SetupParts> {
        if self.filters.is_empty() {
            return Err(ConfigurationError::new("Pipeline has no filters")
                .with_error_info(
                    ContractErrorInfo::new("CONFIG-EMPTY", "Cannot build an empty pipeline")
                        .with_fix_hint("Add at least one filter to the pipeline before building."),
                )
                .into());
        }
        let entry = match &self.entry {
            Some(name) => self.require(name)?,
            None => 0,
        };

        self.detect_cycles()?;
        let order = self.graph_order();

        let params = self
            .filters
            .iter()
            .map(|f| {
                Params::resolve(&f.filter.parameter_schema(), &f.name, &f.explicit, &self.config)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let links: Vec<(Option<LinkInfo>, Option<LinkInfo>)> = self
            .filters
            .iter()
            .map(|f| (f.main.map(|id| self.link_info(id)), f.branch.map(|id| self.link_info(id))))
            .collect();

        let mut schemas = vec![None; self.filters.len()];
        for &id in &order {
            let pending = &mut self.filters[id];
            let (main, branch) = links[id].clone();
            let setup = SetupContext::new(&pending.name, &params[id], main, branch, shutdown);
            pending.filter.validate_params(&setup)?;
            pending.filter.init_filter(&setup)?;
            pending.filter.zero_inputs();
            schemas[id] = pending.filter.attribute_schema(&params[id]);
        }
        Ok((entry, order, params, schemas))
    }

    fn link_info(&self, id: NodeId) -> LinkInfo {
        let target = &self.filters[id];
        LinkInfo {
            name: target.name.clone(),
            type_tag: target.filter.type_tag().to_string(),
            tank: target.filter.tank(),
            has_branch: target.branch.is_some(),
        }
    }

    /// Successors along links the source filter actually forwards on.
    fn forwarding_edges(&self, id: NodeId) -> Vec<NodeId> {
        let pending = &self.filters[id];
        [(Route::Branch, pending.branch), (Route::Main, pending.main)]
            .into_iter()
            .filter(|(route, _)| pending.filter.forwards_on(*route))
            .filter_map(|(_, target)| target)
            .collect()
    }

    /// Detects forwarding cycles that no tank feeder breaks.
    fn detect_cycles(&self) -> Result<(), RoutingError> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        for id in 0..self.filters.len() {
            if !visited.contains(&id) {
                if let Some(cycle) = self.dfs_cycle(id, &mut visited, &mut rec_stack, &mut path) {
                    return Err(RoutingError::Cycle {
                        path: cycle.into_iter().map(|n| self.filters[n].name.clone()).collect(),
                    });
                }
            }
        }
        Ok(())
    }

    fn dfs_cycle(
        &self,
        node: NodeId,
        visited: &mut HashSet<NodeId>,
        rec_stack: &mut HashSet<NodeId>,
        path: &mut Vec<NodeId>,
    ) -> Option<Vec<NodeId>> {
        visited.insert(node);
        rec_stack.insert(node);
        path.push(node);

        for next in self.forwarding_edges(node) {
            if !visited.contains(&next) {
                if let Some(cycle) = self.dfs_cycle(next, visited, rec_stack, path) {
                    return Some(cycle);
                }
            } else if rec_stack.contains(&next) {
                let start = path.iter().position(|n| *n == next).unwrap_or(0);
                let mut cycle = path[start..].to_vec();
                cycle.push(next);
                return Some(cycle);
            }
        }

        path.pop();
        rec_stack.remove(&node);
        None
    }

    /// Topological order of forwarding links, ties broken by insertion order.
    fn graph_order(&self) -> Vec<NodeId> {
        let count = self.filters.len();
        let mut in_degree = vec![0usize; count];
        for id in 0..count {
            for next in self.forwarding_edges(id) {
                in_degree[next] += 1;
            }
        }

        let mut ready: BTreeSet<NodeId> = (0..count).filter(|id| in_degree[*id] == 0).collect();
        let mut order = Vec::with_capacity(count);
        while let Some(id) = ready.pop_first() {
            order.push(id);
            for next in self.forwarding_edges(id) {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.insert(next);
                }
            }
        }
        order
    }
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("name", &self.name)
            .field("filters", &self.filters.iter().map(|p| p.name.as_str()).collect::<Vec<_>>())
            .field("entry", &self.entry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FilterError;
    use crate::stock::{PassThrough, Waste};
    use crate::tank::{TankFeed, TankQueue};
    use crate::testing::{EventLog, LifecycleProbe};
    use serde_json::json;

    #[test]
    fn test_empty_pipeline_rejected() {
        let err = PipelineBuilder::new("empty").build().unwrap_err();
        match err {
            FilterError::Configuration(e) => assert_eq!(e.code(), Some("CONFIG-EMPTY")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let err = PipelineBuilder::new("p")
            .filter("a", PassThrough::new(), Value::Null)
            .unwrap()
            .filter("a", Waste::new(), Value::Null)
            .unwrap_err();
        assert!(err.to_string().contains("Duplicate filter name"));
    }

    #[test]
    fn test_unknown_link_target() {
        let err = PipelineBuilder::new("p")
            .filter("a", PassThrough::new(), Value::Null)
            .unwrap()
            .main("a", "missing")
            .unwrap_err();
        match err {
            FilterError::Configuration(e) => assert_eq!(e.code(), Some("CONFIG-UNKNOWN_FILTER")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_link_taken() {
        let err = PipelineBuilder::new("p")
            .filter("a", PassThrough::new(), Value::Null)
            .unwrap()
            .filter("b", Waste::new(), Value::Null)
            .unwrap()
            .filter("c", Waste::new(), Value::Null)
            .unwrap()
            .main("a", "b")
            .unwrap()
            .main("a", "c")
            .unwrap_err();
        assert!(matches!(err, FilterError::Routing(RoutingError::LinkTaken { .. })));
    }

    #[test]
    fn test_forwarding_cycle_rejected() {
        let err = PipelineBuilder::new("p")
            .filter("a", PassThrough::new(), Value::Null)
            .unwrap()
            .filter("b", PassThrough::new(), Value::Null)
            .unwrap()
            .chain(&["a", "b", "a"])
            .unwrap()
            .build()
            .unwrap_err();
        match err {
            FilterError::Routing(RoutingError::Cycle { path }) => {
                assert_eq!(path, vec!["a", "b", "a"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_feeder_breaks_cycle() {
        let pipeline = PipelineBuilder::new("loop")
            .filter("tank", TankQueue::new(), Value::Null)
            .unwrap()
            .filter("work", PassThrough::new(), Value::Null)
            .unwrap()
            .filter("feed", TankFeed::new(), Value::Null)
            .unwrap()
            .main("tank", "work")
            .unwrap()
            .branch("work", "feed")
            .unwrap()
            .main("feed", "tank")
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(pipeline.filter_names(), vec!["tank", "work", "feed"]);
    }

    #[test]
    fn test_unknown_explicit_param_rejected() {
        let err = PipelineBuilder::new("p")
            .filter("t", TankQueue::new(), json!({"bogus": 1}))
            .unwrap()
            .build()
            .unwrap_err();
        match err {
            FilterError::Configuration(e) => assert_eq!(e.code(), Some("CONFIG-UNKNOWN_PARAM")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_failed_build_closes_filters() {
        let log = EventLog::new();
        let err = PipelineBuilder::new("p")
            .filter("probe", LifecycleProbe::new(log.clone()), Value::Null)
            .unwrap()
            .filter("feed", TankFeed::new(), Value::Null)
            .unwrap()
            .main("probe", "feed")
            .unwrap()
            .build()
            .unwrap_err();

        assert!(matches!(err, FilterError::Routing(RoutingError::Topology { .. })));
        assert_eq!(log.events(), vec!["close:probe"]);
    }

    #[test]
    fn test_graph_order_is_topological() {
        let pipeline = PipelineBuilder::new("p")
            .filter("sink", Waste::new(), Value::Null)
            .unwrap()
            .filter("mid", PassThrough::new(), Value::Null)
            .unwrap()
            .filter("head", PassThrough::new(), Value::Null)
            .unwrap()
            .chain(&["head", "mid", "sink"])
            .unwrap()
            .entry("head")
            .build()
            .unwrap();

        assert_eq!(pipeline.filter_names(), vec!["head", "mid", "sink"]);
    }

    #[test]
    fn test_from_spec() {
        let spec: PipelineSpec = serde_json::from_value(json!({
            "name": "spec",
            "filters": [
                {"type_tag": "pass_through", "name": "in"},
                {"type_tag": "waste", "name": "out"},
            ],
            "links": [{"from": "in", "to": "out"}],
        }))
        .unwrap();
        let registry = FilterRegistry::with_stock_filters();
        let pipeline = PipelineBuilder::from_spec(spec, &registry).unwrap().build().unwrap();

        assert_eq!(pipeline.name(), "spec");
        assert_eq!(pipeline.filter_state("out"), Some(FilterState::Initialized));
    }
}

//! The filter arena and synchronous dispatch.

use super::ShutdownToken;
use crate::core::{AttributeSchema, FilterState, Route, Unit};
use crate::errors::{FilterError, FilterResult, RoutingError};
use crate::filter::{Filter, FilterContext};
use crate::params::Params;
use tracing::{debug, trace};

/// Index of a filter in its pipeline's arena.
pub type NodeId = usize;

/// A filter with its resolved parameters.
#[derive(Debug)]
pub(crate) struct FilterSlot {
    pub filter: Box<dyn Filter>,
    pub params: Params,
    pub schema: Option<AttributeSchema>,
}

#[derive(Debug)]
pub(crate) struct Node {
    pub name: String,
    pub type_tag: String,
    /// Empty while the filter's entry point is executing.
    pub slot: Option<FilterSlot>,
    pub main: Option<NodeId>,
    pub branch: Option<NodeId>,
    pub state: FilterState,
}

/// Owns every filter of a pipeline and dispatches units between them.
///
/// A filter is taken out of its slot while one of its entry points runs, so
/// a unit that reaches it again through the call chain is detected as
/// reentrant instead of aliasing its state.
#[derive(Debug)]
pub struct Graph {
    pipeline: String,
    nodes: Vec<Node>,
    shutdown: ShutdownToken,
    failed_at: Option<String>,
}

impl Graph {
    pub(crate) fn new(pipeline: String, nodes: Vec<Node>, shutdown: ShutdownToken) -> Self {
        Self {
            pipeline,
            nodes,
            shutdown,
            failed_at: None,
        }
    }

    pub(crate) fn pipeline_name(&self) -> &str {
        &self.pipeline
    }

    pub(crate) fn node_name(&self, node: NodeId) -> &str {
        &self.nodes[node].name
    }

    pub(crate) fn node_type_tag(&self, node: NodeId) -> &str {
        &self.nodes[node].type_tag
    }

    pub(crate) fn link(&self, node: NodeId, route: Route) -> Option<NodeId> {
        match route {
            Route::Main => self.nodes[node].main,
            Route::Branch => self.nodes[node].branch,
        }
    }

    pub(crate) fn shutdown(&self) -> &ShutdownToken {
        &self.shutdown
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.name == name)
    }

    pub(crate) fn state(&self, node: NodeId) -> FilterState {
        self.nodes[node].state
    }

    /// Takes the innermost failing filter recorded since the last call.
    pub(crate) fn take_failed_at(&mut self) -> Option<String> {
        self.failed_at.take()
    }

    fn take_slot(&mut self, node: NodeId) -> FilterResult<FilterSlot> {
        let entry = &mut self.nodes[node];
        entry.slot.take().ok_or_else(|| {
            RoutingError::Reentrant {
                filter: entry.name.clone(),
            }
            .into()
        })
    }

    fn restore<T>(
        &mut self,
        node: NodeId,
        slot: FilterSlot,
        result: FilterResult<T>,
    ) -> FilterResult<T> {
        self.nodes[node].slot = Some(slot);
        if result.is_err() && self.failed_at.is_none() {
            self.failed_at = Some(self.nodes[node].name.clone());
        }
        result
    }

    /// Hands a unit to a filter's data or control entry point.
    pub(crate) fn deliver(&mut self, node: NodeId, unit: Unit) -> FilterResult<()> {
        let state = self.nodes[node].state;
        if !state.accepts_units() {
            return Err(FilterError::PipelineClosed(self.pipeline.clone()));
        }
        let mut slot = self.take_slot(node)?;
        if state == FilterState::Initialized {
            self.nodes[node].state = FilterState::Active;
        }
        trace!(filter = %self.nodes[node].name, control = unit.is_control(), "Delivering unit");

        let result = {
            let mut ctx = FilterContext::new(self, node, &mut slot.params, slot.schema.as_ref());
            match unit {
                Unit::Data(packet) => slot.filter.process(packet, &mut ctx),
                Unit::Control(bottle) => slot.filter.handle_control(bottle, &mut ctx),
            }
        };
        self.restore(node, slot, result)
    }

    /// Runs a filter's `flush_buffer` once.
    pub(crate) fn flush(&mut self, node: NodeId) -> FilterResult<()> {
        if self.nodes[node].state >= FilterState::Flushing {
            return Ok(());
        }
        let mut slot = self.take_slot(node)?;
        self.nodes[node].state = FilterState::Flushing;
        debug!(pipeline = %self.pipeline, filter = %self.nodes[node].name, "Flushing filter");

        let result = {
            let mut ctx = FilterContext::new(self, node, &mut slot.params, slot.schema.as_ref());
            slot.filter.flush_buffer(&mut ctx)
        };
        self.restore(node, slot, result)
    }

    /// Runs a filter's `close_filter` once.
    pub(crate) fn close(&mut self, node: NodeId) -> FilterResult<()> {
        let entry = &mut self.nodes[node];
        if entry.state == FilterState::Closed {
            return Ok(());
        }
        entry.state = FilterState::Closed;
        debug!(pipeline = %self.pipeline, filter = %entry.name, "Closing filter");
        match entry.slot.as_mut() {
            Some(slot) => slot.filter.close_filter(),
            None => Err(RoutingError::Reentrant {
                filter: entry.name.clone(),
            }
            .into()),
        }
    }

    /// Re-runs a filter's `zero_inputs`.
    pub(crate) fn zero_inputs(&mut self, node: NodeId) -> FilterResult<()> {
        let mut slot = self.take_slot(node)?;
        slot.filter.zero_inputs();
        self.nodes[node].slot = Some(slot);
        Ok(())
    }
}

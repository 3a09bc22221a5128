//! Contexts handed to filters at setup time and while processing.

use crate::core::{AttributeSchema, BottleMessage, MessageBottle, Packet, Route, Unit};
use crate::errors::{AttributeError, FilterError, FilterResult};
use crate::params::Params;
use crate::pipeline::{Graph, NodeId, ShutdownToken};
use crate::tank::TankHandle;
use serde_json::Value;
use tracing::{debug, trace};

/// What a filter sees of the filter at the end of one of its links.
#[derive(Debug, Clone)]
pub struct LinkInfo {
    /// Instance name of the linked filter.
    pub name: String,
    /// Type tag of the linked filter.
    pub type_tag: String,
    /// The linked filter's tank buffer, if it is a tank.
    pub tank: Option<TankHandle>,
    /// Whether the linked filter itself has a branch link.
    pub has_branch: bool,
}

/// Read-only view given to `validate_params` and `init_filter`.
#[derive(Debug)]
pub struct SetupContext<'a> {
    name: &'a str,
    params: &'a Params,
    main: Option<LinkInfo>,
    branch: Option<LinkInfo>,
    shutdown: &'a ShutdownToken,
}

impl<'a> SetupContext<'a> {
    /// Creates a setup context.
    #[must_use]
    pub fn new(
        name: &'a str,
        params: &'a Params,
        main: Option<LinkInfo>,
        branch: Option<LinkInfo>,
        shutdown: &'a ShutdownToken,
    ) -> Self {
        Self {
            name,
            params,
            main,
            branch,
            shutdown,
        }
    }

    /// The filter instance name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name
    }

    /// The resolved parameters.
    #[must_use]
    pub fn params(&self) -> &Params {
        self.params
    }

    /// The filter linked on a route, if any.
    #[must_use]
    pub fn link(&self, route: Route) -> Option<&LinkInfo> {
        match route {
            Route::Main => self.main.as_ref(),
            Route::Branch => self.branch.as_ref(),
        }
    }

    /// The pipeline's shutdown token.
    #[must_use]
    pub fn shutdown(&self) -> &ShutdownToken {
        self.shutdown
    }
}

/// The per-call context of a running filter: its parameters, its links and
/// the shared shutdown token.
///
/// Sending through the context is a direct synchronous call into the linked
/// filter; it returns once that filter and everything downstream of it are
/// done with the unit.
pub struct FilterContext<'a> {
    graph: &'a mut Graph,
    node: NodeId,
    params: &'a mut Params,
    schema: Option<&'a AttributeSchema>,
}

impl<'a> FilterContext<'a> {
    pub(crate) fn new(
        graph: &'a mut Graph,
        node: NodeId,
        params: &'a mut Params,
        schema: Option<&'a AttributeSchema>,
    ) -> Self {
        Self {
            graph,
            node,
            params,
            schema,
        }
    }

    /// The filter instance name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.graph.node_name(self.node)
    }

    /// The filter type tag.
    #[must_use]
    pub fn type_tag(&self) -> &str {
        self.graph.node_type_tag(self.node)
    }

    /// The owning pipeline's name.
    #[must_use]
    pub fn pipeline_name(&self) -> &str {
        self.graph.pipeline_name()
    }

    /// The resolved parameters.
    #[must_use]
    pub fn params(&self) -> &Params {
        self.params
    }

    /// Mutable access to the parameters.
    pub fn params_mut(&mut self) -> &mut Params {
        self.params
    }

    /// Returns true if a link is attached on `route`.
    #[must_use]
    pub fn has_link(&self, route: Route) -> bool {
        self.graph.link(self.node, route).is_some()
    }

    /// Hands a unit to the filter linked on `route`.
    ///
    /// With no link attached the unit is dropped.
    pub fn send_on(&mut self, unit: impl Into<Unit>, route: Route) -> FilterResult<()> {
        let unit = unit.into();
        match self.graph.link(self.node, route) {
            Some(target) => self.graph.deliver(target, unit),
            None => {
                trace!(
                    filter = %self.name(),
                    %route,
                    control = unit.is_control(),
                    "No link attached, dropping unit"
                );
                Ok(())
            }
        }
    }

    /// Sends on the main route.
    pub fn send_main(&mut self, unit: impl Into<Unit>) -> FilterResult<()> {
        self.send_on(unit, Route::Main)
    }

    /// Sends on the branch route.
    pub fn send_branch(&mut self, unit: impl Into<Unit>) -> FilterResult<()> {
        self.send_on(unit, Route::Branch)
    }

    /// The pipeline's shutdown token.
    #[must_use]
    pub fn shutdown(&self) -> &ShutdownToken {
        self.graph.shutdown()
    }

    /// Returns true once the pipeline has begun shutting down.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.graph.shutdown().is_shutting_down()
    }

    /// Asks the pipeline to stop pulling from its source.
    pub fn request_shutdown(&self, reason: &str) {
        self.graph.shutdown().shut_down(reason);
    }

    /// Returns true if this filter is the bottle's addressee.
    #[must_use]
    pub fn is_addressee(&self, bottle: &MessageBottle) -> bool {
        bottle.destination.matches(self.name(), self.type_tag())
    }

    /// Applies a bottle's message to this filter's parameters.
    ///
    /// A reset sets `param_name` to `new_value`. Custom messages have no
    /// default meaning and are ignored.
    pub fn apply_message(&mut self, bottle: &MessageBottle) -> FilterResult<()> {
        match &bottle.message {
            BottleMessage::Reset => {
                let (name, value) = bottle.reset_target().ok_or_else(|| {
                    FilterError::data(format!(
                        "Reset bottle for '{}' has no string 'param_name'",
                        bottle.destination
                    ))
                })?;
                debug!(filter = %self.name(), param = name, value = %value, "Resetting parameter");
                self.params.set(name, value.clone())?;
                Ok(())
            }
            BottleMessage::Custom(message) => {
                debug!(filter = %self.name(), message = %message, "Ignoring custom message");
                Ok(())
            }
        }
    }

    fn check(
        &self,
        name: &str,
        allowed: impl Fn(&AttributeSchema, &str) -> bool,
    ) -> Result<(), AttributeError> {
        match self.schema {
            Some(schema) if !allowed(schema, name) => Err(AttributeError::Undeclared {
                filter: self.name().to_string(),
                name: name.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Reads a packet attribute this filter declared.
    pub fn read(&self, packet: &Packet, name: &str) -> FilterResult<Value> {
        self.check(name, AttributeSchema::may_read)?;
        Ok(packet.get(name)?)
    }

    /// Reads an integer packet attribute this filter declared.
    pub fn read_i64(&self, packet: &Packet, name: &str) -> FilterResult<i64> {
        self.check(name, AttributeSchema::may_read)?;
        Ok(packet.get_i64(name)?)
    }

    /// Writes a packet attribute this filter declared.
    pub fn write(&self, packet: &Packet, name: &str, value: impl Into<Value>) -> FilterResult<()> {
        self.check(name, AttributeSchema::may_write)?;
        packet.set(name, value);
        Ok(())
    }
}

impl std::fmt::Debug for FilterContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterContext")
            .field("filter", &self.name())
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

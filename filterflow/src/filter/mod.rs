//! The filter plugin contract.
//!
//! Filters are the processing stages of a pipeline. Each one declares a
//! parameter schema, runs through a fixed lifecycle and emits results on its
//! two outbound routes through a [`FilterContext`].
//!
//! Lifecycle, in call order:
//! 1. [`Filter::validate_params`], a pure check run at build time
//! 2. [`Filter::init_filter`], one-time setup from parameters
//! 3. [`Filter::zero_inputs`], (re)initialisation of mutable state
//! 4. any number of [`Filter::process`] and [`Filter::handle_control`] calls
//! 5. [`Filter::flush_buffer`], once, before close
//! 6. [`Filter::close_filter`], idempotent release of external resources

mod context;
mod registry;

pub use context::{FilterContext, LinkInfo, SetupContext};
pub use registry::{FilterFactory, FilterRegistry};

use crate::core::{AttributeSchema, MessageBottle, Packet, Route};
use crate::errors::FilterResult;
use crate::params::{ParameterSchema, Params};
use crate::tank::TankHandle;
use std::fmt::Debug;

/// Trait for pipeline filters.
///
/// Only [`Filter::type_tag`] and [`Filter::process`] are required; every
/// other hook has a no-op or protocol default.
pub trait Filter: Send + Debug {
    /// Returns the filter type tag, e.g. `"batch"`.
    fn type_tag(&self) -> &str;

    /// Declares the parameters this filter accepts.
    fn parameter_schema(&self) -> ParameterSchema {
        ParameterSchema::new()
    }

    /// Declares the packet attributes this filter reads and writes.
    ///
    /// `None` leaves attribute access through the context unchecked.
    fn attribute_schema(&self, _params: &Params) -> Option<AttributeSchema> {
        None
    }

    /// Checks the resolved parameters and the wiring before any data flows.
    ///
    /// The default requires every declared parameter to be set. Filters with
    /// optional-by-design parameters override this.
    fn validate_params(&self, setup: &SetupContext<'_>) -> FilterResult<()> {
        setup.params().ensure_all_set()?;
        Ok(())
    }

    /// One-time setup derived from parameters.
    fn init_filter(&mut self, _setup: &SetupContext<'_>) -> FilterResult<()> {
        Ok(())
    }

    /// Resets all mutable per-instance state.
    fn zero_inputs(&mut self) {}

    /// Processes one data packet.
    fn process(&mut self, packet: Packet, ctx: &mut FilterContext<'_>) -> FilterResult<()>;

    /// Intercepts a control bottle.
    ///
    /// The default opens bottles addressed to this filter and forwards them on
    /// main unless they are single use; any other bottle is forwarded unchanged.
    fn handle_control(
        &mut self,
        bottle: MessageBottle,
        ctx: &mut FilterContext<'_>,
    ) -> FilterResult<()> {
        if ctx.is_addressee(&bottle) {
            self.open_message_bottle(&bottle, ctx)?;
            if bottle.single_use {
                return Ok(());
            }
        }
        ctx.send_main(bottle)
    }

    /// Applies a bottle addressed to this filter.
    fn open_message_bottle(
        &mut self,
        bottle: &MessageBottle,
        ctx: &mut FilterContext<'_>,
    ) -> FilterResult<()> {
        ctx.apply_message(bottle)
    }

    /// Emits any held partial state. Called once, before close.
    fn flush_buffer(&mut self, _ctx: &mut FilterContext<'_>) -> FilterResult<()> {
        Ok(())
    }

    /// Releases external resources. Must tolerate repeated calls.
    fn close_filter(&mut self) -> FilterResult<()> {
        Ok(())
    }

    /// Returns the buffer of a tank filter, so a feeder can push into it.
    fn tank(&self) -> Option<TankHandle> {
        None
    }

    /// Returns true if units sent on `route` are delivered through the router.
    ///
    /// Links a filter never forwards on are left out of cycle detection and
    /// graph ordering.
    fn forwards_on(&self, _route: Route) -> bool {
        true
    }
}

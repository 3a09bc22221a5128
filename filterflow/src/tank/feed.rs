//! The tank feeder.

use super::buffer::TankHandle;
use crate::core::{MessageBottle, Packet, Route};
use crate::errors::{FilterResult, RoutingError};
use crate::filter::{Filter, FilterContext, SetupContext};
use tracing::trace;

/// Pushes packets straight into the buffer of the tank linked on its main
/// route, bypassing the router.
///
/// This is what lets a tank's own drain loop feed continuations back to
/// itself without re-entering its `process` call. The feeder must have a tank
/// as its main link and no branch link.
#[derive(Debug, Default)]
pub struct TankFeed {
    tank: Option<TankHandle>,
}

impl TankFeed {
    /// Creates an unwired feeder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn wired_tank(setup: &SetupContext<'_>) -> Result<TankHandle, RoutingError> {
        if setup.link(Route::Branch).is_some() {
            return Err(RoutingError::topology(setup.name(), "must not have a branch link"));
        }
        let main = setup
            .link(Route::Main)
            .ok_or_else(|| {
                RoutingError::topology(setup.name(), "must be linked to a tank on main")
            })?;
        main.tank.clone().ok_or_else(|| {
            RoutingError::topology(
                setup.name(),
                format!("must be linked to a tank, but '{}' is a '{}'", main.name, main.type_tag),
            )
        })
    }
}

impl Filter for TankFeed {
    fn type_tag(&self) -> &str {
        "tank_feed"
    }

    fn validate_params(&self, setup: &SetupContext<'_>) -> FilterResult<()> {
        Self::wired_tank(setup)?;
        Ok(())
    }

    fn init_filter(&mut self, setup: &SetupContext<'_>) -> FilterResult<()> {
        self.tank = Some(Self::wired_tank(setup)?);
        Ok(())
    }

    fn process(&mut self, packet: Packet, ctx: &mut FilterContext<'_>) -> FilterResult<()> {
        let tank = self
            .tank
            .as_ref()
            .ok_or_else(|| RoutingError::topology(ctx.name(), "was never wired to a tank"))?;
        trace!(filter = %ctx.name(), "Feeding packet back into tank");
        tank.push(packet)?;
        Ok(())
    }

    fn handle_control(
        &mut self,
        bottle: MessageBottle,
        ctx: &mut FilterContext<'_>,
    ) -> FilterResult<()> {
        if ctx.is_addressee(&bottle) {
            self.open_message_bottle(&bottle, ctx)?;
        }
        Ok(())
    }

    fn forwards_on(&self, route: Route) -> bool {
        route != Route::Main
    }
}

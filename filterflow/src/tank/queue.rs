//! Tank filters that buffer and drain in priority order.

use super::buffer::{TankEntry, TankHandle};
use crate::core::{AttributeSchema, MessageBottle, Packet, Payload};
use crate::errors::{ConfigurationError, FilterResult};
use crate::filter::{Filter, FilterContext, SetupContext};
use crate::params::{ParameterSchema, Params};
use tracing::debug;

const TANK_SIZE: &str = "tank_size";
const PRIORITY_FIELD_NAME: &str = "priority_field_name";

/// A priority-ordered reentrant buffer.
///
/// Every admitted packet is pushed at its priority; then, while occupancy
/// exceeds `tank_size`, the head is popped and forwarded on main. Packets a
/// downstream [`super::TankFeed`] pushes back during that drain are drained
/// by the same loop, so everything derived from one input finishes before
/// the next input is admitted.
///
/// The windowed variant (`tank_branch`) also sends a `Packets` snapshot of the
/// buffer to branch after each admission, and before each packet evicted on
/// main while the pipeline is shutting down.
#[derive(Debug)]
pub struct TankQueue {
    tank: TankHandle,
    windowed: bool,
    size: i64,
}

impl TankQueue {
    /// Creates a plain tank (`tank_queue`).
    #[must_use]
    pub fn new() -> Self {
        Self {
            tank: TankHandle::new(0, "seq_num"),
            windowed: false,
            size: 0,
        }
    }

    /// Creates a windowed-snapshot tank (`tank_branch`).
    #[must_use]
    pub fn windowed() -> Self {
        Self {
            windowed: true,
            ..Self::new()
        }
    }

    /// Reads `tank_size` and a non-empty `priority_field_name`.
    fn tank_params(params: &Params, name: &str) -> FilterResult<(i64, String)> {
        let size = params.i64(TANK_SIZE)?;
        let field = params.str(PRIORITY_FIELD_NAME)?;
        if field.is_empty() {
            let err = ConfigurationError::bad_value(name, PRIORITY_FIELD_NAME, "must not be empty");
            return Err(err.into());
        }
        Ok((size, field.to_string()))
    }

    fn snapshot(&self) -> Packet {
        Packet::new(Payload::Packets(self.tank.sorted_packets()))
    }

    /// Sets capacity and moves entries to match: shrinking evicts the head on
    /// main, growing pads the front with placeholders.
    fn resize(&mut self, size: i64, ctx: &mut FilterContext<'_>) -> FilterResult<()> {
        self.size = size;
        self.tank.with(|buffer| buffer.set_capacity(size));
        self.drain_excess(ctx)?;
        self.tank.with(super::buffer::TankBuffer::pad_to_capacity);
        Ok(())
    }

    fn drain_excess(&mut self, ctx: &mut FilterContext<'_>) -> FilterResult<()> {
        loop {
            if ctx.shutdown().is_aborted() {
                debug!(
                    filter = %ctx.name(),
                    held = self.tank.len(),
                    "Pipeline aborted, leaving tank drain"
                );
                return Ok(());
            }
            match self.tank.pop_excess() {
                None => return Ok(()),
                Some(TankEntry::Placeholder) => {}
                Some(TankEntry::Packet(packet)) => {
                    if self.windowed && ctx.is_shutting_down() {
                        ctx.send_branch(self.snapshot())?;
                    }
                    ctx.send_main(packet)?;
                }
            }
        }
    }
}

impl Default for TankQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter for TankQueue {
    fn type_tag(&self) -> &str {
        if self.windowed {
            "tank_branch"
        } else {
            "tank_queue"
        }
    }

    fn parameter_schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .optional(TANK_SIZE, 0)
            .optional(PRIORITY_FIELD_NAME, "seq_num")
    }

    fn attribute_schema(&self, params: &Params) -> Option<AttributeSchema> {
        let field = params.str(PRIORITY_FIELD_NAME).ok()?;
        Some(AttributeSchema::new().reads(field))
    }

    fn validate_params(&self, setup: &SetupContext<'_>) -> FilterResult<()> {
        Self::tank_params(setup.params(), setup.name())?;
        Ok(())
    }

    fn init_filter(&mut self, setup: &SetupContext<'_>) -> FilterResult<()> {
        self.size = setup.params().i64(TANK_SIZE)?;
        let field = setup.params().str(PRIORITY_FIELD_NAME)?.to_string();
        let size = self.size;
        self.tank.with(|buffer| {
            buffer.set_capacity(size);
            buffer.set_priority_field_name(field);
        });
        Ok(())
    }

    fn zero_inputs(&mut self) {
        self.tank.with(|buffer| {
            buffer.clear();
            buffer.pad_to_capacity();
        });
    }

    fn process(&mut self, packet: Packet, ctx: &mut FilterContext<'_>) -> FilterResult<()> {
        self.tank.push(packet)?;
        self.drain_excess(ctx)?;
        if self.windowed {
            ctx.send_branch(self.snapshot())?;
        }
        Ok(())
    }

    fn open_message_bottle(
        &mut self,
        bottle: &MessageBottle,
        ctx: &mut FilterContext<'_>,
    ) -> FilterResult<()> {
        let previous = ctx.params().clone();
        ctx.apply_message(bottle)?;
        let (size, field) = match Self::tank_params(ctx.params(), ctx.name()) {
            Ok(checked) => checked,
            Err(e) => {
                *ctx.params_mut() = previous;
                return Err(e);
            }
        };
        self.tank.with(|buffer| buffer.set_priority_field_name(field));
        if size != self.size {
            debug!(filter = %ctx.name(), from = self.size, to = size, "Resizing tank");
            self.resize(size, ctx)?;
        }
        Ok(())
    }

    fn flush_buffer(&mut self, ctx: &mut FilterContext<'_>) -> FilterResult<()> {
        debug!(filter = %ctx.name(), held = self.tank.packets_held(), "Draining tank");
        self.tank.with(|buffer| buffer.set_capacity(0));
        self.drain_excess(ctx)
    }

    fn tank(&self) -> Option<TankHandle> {
        Some(self.tank.clone())
    }
}

//! Sequence numbering, loop counting and collection.

use crate::core::{AttributeSchema, Packet, Payload};
use crate::errors::{ConfigurationError, FilterResult};
use crate::filter::{Filter, FilterContext, SetupContext};
use crate::params::{ParameterSchema, Params};

const SEQ_FIELD: &str = "seq_packet_field_name";

/// Numbers packets that do not already carry a non-negative sequence number.
#[derive(Debug, Default)]
pub struct SeqPacket {
    start_at: i64,
    next: i64,
}

impl SeqPacket {
    /// Creates the filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Filter for SeqPacket {
    fn type_tag(&self) -> &str {
        "seq_packet"
    }

    fn parameter_schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .optional(SEQ_FIELD, "seq_num")
            .optional("start_at", 0)
    }

    fn attribute_schema(&self, params: &Params) -> Option<AttributeSchema> {
        let field = params.str(SEQ_FIELD).ok()?;
        Some(AttributeSchema::new().reads(field).writes(field))
    }

    fn init_filter(&mut self, setup: &SetupContext<'_>) -> FilterResult<()> {
        self.start_at = setup.params().i64("start_at")?;
        Ok(())
    }

    fn zero_inputs(&mut self) {
        self.next = self.start_at;
    }

    fn process(&mut self, packet: Packet, ctx: &mut FilterContext<'_>) -> FilterResult<()> {
        let field = ctx.params().str(SEQ_FIELD)?.to_string();
        let numbered = packet.get_opt(&field).and_then(|v| v.as_i64()).is_some_and(|n| n >= 0);
        if !numbered {
            ctx.write(&packet, &field, self.next)?;
            self.next += 1;
        }
        ctx.send_main(packet)
    }
}

const LOOP_FIELD: &str = "count_loops_field_name";

/// Increments a per-packet loop counter, starting at 1.
#[derive(Debug, Default)]
pub struct CountLoops;

impl CountLoops {
    /// Creates the filter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Filter for CountLoops {
    fn type_tag(&self) -> &str {
        "count_loops"
    }

    fn parameter_schema(&self) -> ParameterSchema {
        ParameterSchema::new().optional(LOOP_FIELD, "loop_num")
    }

    fn process(&mut self, packet: Packet, ctx: &mut FilterContext<'_>) -> FilterResult<()> {
        let field = ctx.params().str(LOOP_FIELD)?.to_string();
        let count = if packet.has(&field) { ctx.read_i64(&packet, &field)? + 1 } else { 1 };
        ctx.write(&packet, &field, count)?;
        ctx.send_main(packet)
    }
}

/// Every `collection_size` packets, sends one packet whose payload is the
/// collected packets to branch. Every packet also goes on to main.
#[derive(Debug, Default)]
pub struct CollectData {
    collected: Vec<Packet>,
}

impl CollectData {
    /// Creates the filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn collection_size(params: &Params) -> Result<usize, ConfigurationError> {
        let size = params.usize("collection_size")?;
        if size == 0 {
            return Err(ConfigurationError::bad_value(
                params.filter_name(),
                "collection_size",
                "must be at least 1",
            ));
        }
        Ok(size)
    }
}

impl Filter for CollectData {
    fn type_tag(&self) -> &str {
        "collect_data"
    }

    fn parameter_schema(&self) -> ParameterSchema {
        ParameterSchema::new().optional("collection_size", 5)
    }

    fn validate_params(&self, setup: &SetupContext<'_>) -> FilterResult<()> {
        Self::collection_size(setup.params())?;
        Ok(())
    }

    fn zero_inputs(&mut self) {
        self.collected.clear();
    }

    fn process(&mut self, packet: Packet, ctx: &mut FilterContext<'_>) -> FilterResult<()> {
        self.collected.push(packet.clone_packet(None));
        if self.collected.len() >= Self::collection_size(ctx.params())? {
            let collection = std::mem::take(&mut self.collected);
            ctx.send_branch(packet.clone_packet(Some(Payload::Packets(collection))))?;
        }
        ctx.send_main(packet)
    }
}

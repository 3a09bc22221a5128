//! Result collector.

use crate::core::{MessageBottle, Packet, Unit};
use crate::errors::FilterResult;
use crate::filter::{Filter, FilterContext, SetupContext};
use crate::params::ParameterSchema;
use parking_lot::Mutex;
use std::sync::Arc;

/// Shared view of the units a [`Sink`] captured.
#[derive(Debug, Clone, Default)]
pub struct SinkHandle {
    units: Arc<Mutex<Vec<Unit>>>,
}

impl SinkHandle {
    /// Creates an empty handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything captured, in arrival order.
    #[must_use]
    pub fn units(&self) -> Vec<Unit> {
        self.units.lock().clone()
    }

    /// Captured packets.
    #[must_use]
    pub fn packets(&self) -> Vec<Packet> {
        self.units.lock().iter().filter_map(Unit::as_packet).cloned().collect()
    }

    /// Captured bottles.
    #[must_use]
    pub fn bottles(&self) -> Vec<MessageBottle> {
        self.units.lock().iter().filter_map(Unit::as_bottle).cloned().collect()
    }

    /// Text of every captured packet with a text payload.
    #[must_use]
    pub fn texts(&self) -> Vec<String> {
        self.packets().iter().filter_map(Packet::text).collect()
    }

    /// Number of captured units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.lock().len()
    }

    /// Returns true if nothing was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.lock().is_empty()
    }

    /// Drops everything captured.
    pub fn clear(&self) {
        self.units.lock().clear();
    }

    fn push(&self, unit: Unit, limit: usize) {
        let mut units = self.units.lock();
        if limit == 0 || units.len() < limit {
            units.push(unit);
        }
    }
}

/// Captures packets for inspection and forwards them on main.
///
/// At most `max_results` units are kept (0 keeps everything). Bottles are
/// captured only with `capture_msgs`.
#[derive(Debug, Default)]
pub struct Sink {
    handle: SinkHandle,
    limit: usize,
    capture_msgs: bool,
}

impl Sink {
    /// Creates a sink with its own handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sink that captures into an existing handle.
    #[must_use]
    pub fn with_handle(handle: SinkHandle) -> Self {
        Self {
            handle,
            ..Self::default()
        }
    }

    /// Returns a handle onto this sink's captures.
    #[must_use]
    pub fn handle(&self) -> SinkHandle {
        self.handle.clone()
    }
}

impl Filter for Sink {
    fn type_tag(&self) -> &str {
        "sink"
    }

    fn parameter_schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .optional("max_results", 30)
            .optional("capture_msgs", false)
    }

    fn init_filter(&mut self, setup: &SetupContext<'_>) -> FilterResult<()> {
        self.limit = setup.params().usize("max_results")?;
        self.capture_msgs = setup.params().bool("capture_msgs")?;
        Ok(())
    }

    fn zero_inputs(&mut self) {
        self.handle.clear();
    }

    fn process(&mut self, packet: Packet, ctx: &mut FilterContext<'_>) -> FilterResult<()> {
        self.handle.push(packet.clone().into(), self.limit);
        ctx.send_main(packet)
    }

    fn handle_control(
        &mut self,
        bottle: MessageBottle,
        ctx: &mut FilterContext<'_>,
    ) -> FilterResult<()> {
        if self.capture_msgs {
            self.handle.push(bottle.clone().into(), self.limit);
        }
        if ctx.is_addressee(&bottle) {
            self.open_message_bottle(&bottle, ctx)?;
            if bottle.single_use {
                return Ok(());
            }
        }
        ctx.send_main(bottle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineBuilder;
    use serde_json::{json, Value};

    #[test]
    fn test_sink_limits_results() {
        let sink = Sink::new();
        let handle = sink.handle();
        let mut pipeline = PipelineBuilder::new("sink")
            .filter("s", sink, json!({"max_results": 2}))
            .unwrap()
            .build()
            .unwrap();

        for text in ["a", "b", "c"] {
            pipeline.send(Packet::new(text)).unwrap();
        }
        assert_eq!(handle.texts(), vec!["a", "b"]);
    }

    #[test]
    fn test_sink_captures_bottles_on_request() {
        let sink = Sink::new();
        let handle = sink.handle();
        let mut pipeline = PipelineBuilder::new("sink")
            .filter("s", sink, json!({"capture_msgs": true}))
            .unwrap()
            .build()
            .unwrap();

        pipeline.send(MessageBottle::to_filter("elsewhere", "hello")).unwrap();
        pipeline.send(Packet::new("a")).unwrap();
        assert_eq!(handle.bottles().len(), 1);
        assert_eq!(handle.len(), 2);
    }

    #[test]
    fn test_shared_handle() {
        let handle = SinkHandle::new();
        let mut pipeline = PipelineBuilder::new("sink")
            .filter("s", Sink::with_handle(handle.clone()), Value::Null)
            .unwrap()
            .build()
            .unwrap();

        pipeline.send(Packet::new("a")).unwrap();
        assert_eq!(handle.texts(), vec!["a"]);
    }
}

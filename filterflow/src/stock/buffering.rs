//! Filters that hold partial input between packets and emit it on flush.

use crate::core::{Packet, Payload};
use crate::errors::{ConfigurationError, FilterError, FilterResult};
use crate::filter::{Filter, FilterContext, SetupContext};
use crate::params::{ParameterSchema, Params};
use serde_json::Value;
use tracing::trace;

fn payload_bytes(packet: &Packet, filter: &str) -> FilterResult<(Vec<u8>, bool)> {
    packet.with_payload(|payload| match payload {
        Payload::Text(s) => Ok((s.as_bytes().to_vec(), true)),
        Payload::Bytes(b) => Ok((b.clone(), false)),
        Payload::Empty => Ok((Vec::new(), false)),
        other => Err(FilterError::data(format!(
            "'{filter}' needs a byte or text payload, got {}",
            other.kind_name()
        ))),
    })
}

fn block_payload(bytes: Vec<u8>, text: bool) -> Payload {
    if text {
        match String::from_utf8(bytes) {
            Ok(s) => Payload::Text(s),
            Err(e) => Payload::Bytes(e.into_bytes()),
        }
    } else {
        Payload::Bytes(bytes)
    }
}

/// Re-blocks byte or text payloads into `size`-byte blocks.
///
/// `size` and `fork_dest` are re-read before every block, so a reset bottle
/// takes effect mid-stream. The remainder is held until the next packet or
/// flush.
#[derive(Debug, Default)]
pub struct Batch {
    buffer: Vec<u8>,
    text: bool,
}

impl Batch {
    /// Creates the filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn size(params: &Params) -> Result<usize, ConfigurationError> {
        match params.usize("size")? {
            0 => Err(ConfigurationError::bad_value(
                params.filter_name(),
                "size",
                "must be a positive integer",
            )),
            n => Ok(n),
        }
    }
}

impl Filter for Batch {
    fn type_tag(&self) -> &str {
        "batch"
    }

    fn parameter_schema(&self) -> ParameterSchema {
        ParameterSchema::new().required("size").optional("fork_dest", "main")
    }

    fn validate_params(&self, setup: &SetupContext<'_>) -> FilterResult<()> {
        setup.params().ensure_all_set()?;
        Self::size(setup.params())?;
        setup.params().route("fork_dest")?;
        Ok(())
    }

    fn zero_inputs(&mut self) {
        self.buffer.clear();
        self.text = false;
    }

    fn process(&mut self, packet: Packet, ctx: &mut FilterContext<'_>) -> FilterResult<()> {
        let (bytes, text) = payload_bytes(&packet, ctx.name())?;
        if self.buffer.is_empty() {
            self.text = text;
        } else {
            self.text &= text;
        }
        self.buffer.extend_from_slice(&bytes);

        loop {
            let size = Self::size(ctx.params())?;
            if self.buffer.len() < size {
                break;
            }
            let block: Vec<u8> = self.buffer.drain(..size).collect();
            let route = ctx.params().route("fork_dest")?;
            ctx.send_on(packet.clone_packet(Some(block_payload(block, self.text))), route)?;
        }
        trace!(filter = %ctx.name(), held = self.buffer.len(), "Batch remainder");
        Ok(())
    }

    fn flush_buffer(&mut self, ctx: &mut FilterContext<'_>) -> FilterResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let rest = std::mem::take(&mut self.buffer);
        let route = ctx.params().route("fork_dest")?;
        ctx.send_on(Packet::new(block_payload(rest, self.text)), route)
    }
}

/// Joins consecutive text payloads with `join_str`.
///
/// A packet with a non-text payload ends the run: the joined text goes out as
/// a new packet and the terminating packet is dropped.
#[derive(Debug, Default)]
pub struct Join {
    parts: Vec<String>,
}

impl Join {
    /// Creates the filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn emit(&mut self, ctx: &mut FilterContext<'_>) -> FilterResult<()> {
        let separator = ctx.params().str("join_str")?.to_string();
        let joined = std::mem::take(&mut self.parts).join(&separator);
        ctx.send_main(Packet::new(joined))
    }
}

impl Filter for Join {
    fn type_tag(&self) -> &str {
        "join"
    }

    fn parameter_schema(&self) -> ParameterSchema {
        ParameterSchema::new().optional("join_str", " ")
    }

    fn zero_inputs(&mut self) {
        self.parts.clear();
    }

    fn process(&mut self, packet: Packet, ctx: &mut FilterContext<'_>) -> FilterResult<()> {
        match packet.text() {
            Some(text) => {
                self.parts.push(text);
                Ok(())
            }
            None => self.emit(ctx),
        }
    }

    fn flush_buffer(&mut self, ctx: &mut FilterContext<'_>) -> FilterResult<()> {
        if self.parts.is_empty() {
            Ok(())
        } else {
            self.emit(ctx)
        }
    }
}

/// Holds one packet back and stamps it with a `peek` at the next packet's
/// first `peek_ahead` bytes.
#[derive(Debug, Default)]
pub struct Peek {
    held: Option<Packet>,
}

impl Peek {
    /// Creates the filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn peek_value(bytes: &[u8]) -> Value {
        match std::str::from_utf8(bytes) {
            Ok(s) => Value::from(s),
            Err(_) => Value::from(bytes.to_vec()),
        }
    }
}

impl Filter for Peek {
    fn type_tag(&self) -> &str {
        "peek"
    }

    fn parameter_schema(&self) -> ParameterSchema {
        ParameterSchema::new().required("peek_ahead")
    }

    fn validate_params(&self, setup: &SetupContext<'_>) -> FilterResult<()> {
        setup.params().ensure_all_set()?;
        setup.params().usize("peek_ahead")?;
        Ok(())
    }

    fn zero_inputs(&mut self) {
        self.held = None;
    }

    fn process(&mut self, packet: Packet, ctx: &mut FilterContext<'_>) -> FilterResult<()> {
        let ahead = ctx.params().usize("peek_ahead")?;
        let (bytes, _) = payload_bytes(&packet, ctx.name())?;
        let next = std::mem::replace(&mut self.held, Some(packet));
        match next {
            Some(previous) => {
                previous.set("peek", Self::peek_value(&bytes[..ahead.min(bytes.len())]));
                ctx.send_main(previous)
            }
            None => Ok(()),
        }
    }

    fn flush_buffer(&mut self, ctx: &mut FilterContext<'_>) -> FilterResult<()> {
        match self.held.take() {
            Some(last) => {
                last.set("peek", "");
                ctx.send_main(last)
            }
            None => Ok(()),
        }
    }
}

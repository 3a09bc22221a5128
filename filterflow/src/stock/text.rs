//! Text splitting and content hashing.

use crate::core::{Packet, Payload};
use crate::errors::{ConfigurationError, FilterError, FilterResult};
use crate::filter::{Filter, FilterContext, SetupContext};
use crate::params::{ParameterSchema, Params};
use regex::Regex;
use sha2::{Digest, Sha256};

fn text_of(packet: &Packet, filter: &str) -> FilterResult<String> {
    packet.with_payload(|payload| match payload {
        Payload::Text(s) => Ok(s.clone()),
        Payload::Bytes(b) => String::from_utf8(b.clone()).map_err(|e| {
            FilterError::data(format!("'{filter}' got bytes that are not UTF-8: {e}"))
        }),
        other => Err(FilterError::data(format!(
            "'{filter}' needs a text payload, got {}",
            other.kind_name()
        ))),
    })
}

/// Emits one packet per non-blank line of text.
#[derive(Debug, Default)]
pub struct SplitLines;

impl SplitLines {
    /// Creates the filter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Filter for SplitLines {
    fn type_tag(&self) -> &str {
        "split_lines"
    }

    fn process(&mut self, packet: Packet, ctx: &mut FilterContext<'_>) -> FilterResult<()> {
        let text = text_of(&packet, ctx.name())?;
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            ctx.send_main(packet.clone_packet(Some(Payload::from(line))))?;
        }
        Ok(())
    }
}

/// Splits text on a regular expression into one packet per word.
#[derive(Debug)]
pub struct SplitWords {
    pattern: Option<Regex>,
    source: String,
}

impl SplitWords {
    /// Creates the filter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pattern: None,
            source: String::new(),
        }
    }

    fn compile(params: &Params) -> Result<Regex, ConfigurationError> {
        let source = params.str("split_on")?;
        Regex::new(source)
            .map_err(|e| ConfigurationError::bad_value(params.filter_name(), "split_on", e))
    }
}

impl Default for SplitWords {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter for SplitWords {
    fn type_tag(&self) -> &str {
        "split_words"
    }

    fn parameter_schema(&self) -> ParameterSchema {
        ParameterSchema::new().optional("split_on", r"\s+")
    }

    fn validate_params(&self, setup: &SetupContext<'_>) -> FilterResult<()> {
        Self::compile(setup.params())?;
        Ok(())
    }

    fn init_filter(&mut self, setup: &SetupContext<'_>) -> FilterResult<()> {
        self.source = setup.params().str("split_on")?.to_string();
        self.pattern = Some(Self::compile(setup.params())?);
        Ok(())
    }

    fn process(&mut self, packet: Packet, ctx: &mut FilterContext<'_>) -> FilterResult<()> {
        // Recompile only when a reset bottle changed the pattern.
        if ctx.params().str("split_on")? != self.source {
            self.source = ctx.params().str("split_on")?.to_string();
            self.pattern = Some(Self::compile(ctx.params())?);
        }
        let pattern = self
            .pattern
            .as_ref()
            .ok_or_else(|| FilterError::logic("split_words used before init"))?;

        let text = text_of(&packet, ctx.name())?;
        let words: Vec<&str> = pattern.split(&text).filter(|w| !w.is_empty()).collect();
        for word in words {
            ctx.send_main(packet.clone_packet(Some(Payload::from(word))))?;
        }
        Ok(())
    }
}

/// Forwards packets unchanged while hashing their payload bytes.
///
/// On flush the hex SHA-256 digest goes to branch as a text packet.
#[derive(Debug, Default)]
pub struct HashSha256 {
    hasher: Sha256,
}

impl HashSha256 {
    /// Creates the filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Filter for HashSha256 {
    fn type_tag(&self) -> &str {
        "hash_sha256"
    }

    fn zero_inputs(&mut self) {
        self.hasher = Sha256::new();
    }

    fn process(&mut self, packet: Packet, ctx: &mut FilterContext<'_>) -> FilterResult<()> {
        packet.with_payload(|payload| match payload {
            Payload::Text(s) => {
                self.hasher.update(s.as_bytes());
                Ok(())
            }
            Payload::Bytes(b) => {
                self.hasher.update(b);
                Ok(())
            }
            Payload::Empty => Ok(()),
            other => Err(FilterError::data(format!(
                "'{}' can only hash bytes or text, got {}",
                ctx.name(),
                other.kind_name()
            ))),
        })?;
        ctx.send_main(packet)
    }

    fn flush_buffer(&mut self, ctx: &mut FilterContext<'_>) -> FilterResult<()> {
        let digest = std::mem::take(&mut self.hasher).finalize();
        ctx.send_branch(Packet::new(hex::encode(digest)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MessageBottle;
    use crate::pipeline::PipelineBuilder;
    use crate::stock::Sink;
    use serde_json::{json, Value};

    #[test]
    fn test_split_lines_skips_blank() {
        let sink = Sink::new();
        let handle = sink.handle();
        let mut pipeline = PipelineBuilder::new("lines")
            .filter("split", SplitLines::new(), Value::Null)
            .unwrap()
            .filter("sink", sink, Value::Null)
            .unwrap()
            .main("split", "sink")
            .unwrap()
            .build()
            .unwrap();

        pipeline.send(Packet::new("one\n\n  \ntwo\r\nthree").with_attr("file", "a.txt")).unwrap();
        assert_eq!(handle.texts(), vec!["one", "two", "three"]);
        assert_eq!(handle.packets()[2].get_str("file").unwrap(), "a.txt");
    }

    #[test]
    fn test_split_words_and_reset_pattern() {
        let sink = Sink::new();
        let handle = sink.handle();
        let mut pipeline = PipelineBuilder::new("words")
            .filter("split", SplitWords::new(), Value::Null)
            .unwrap()
            .filter("sink", sink, Value::Null)
            .unwrap()
            .main("split", "sink")
            .unwrap()
            .build()
            .unwrap();

        pipeline.send(Packet::new("  the quick\tfox ")).unwrap();
        assert_eq!(handle.texts(), vec!["the", "quick", "fox"]);

        pipeline.send(MessageBottle::reset("split", "split_on", ",")).unwrap();
        pipeline.send(Packet::new("a,b")).unwrap();
        assert_eq!(handle.texts()[3..], ["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_split_words_bad_pattern() {
        let err = PipelineBuilder::new("words")
            .filter("split", SplitWords::new(), json!({"split_on": "("}))
            .unwrap()
            .build()
            .unwrap_err();
        assert!(matches!(err, FilterError::Configuration(_)));
    }

    #[test]
    fn test_hash_digest_on_flush() {
        let digests = Sink::new();
        let data = Sink::new();
        let (hd, hp) = (digests.handle(), data.handle());
        let mut pipeline = PipelineBuilder::new("hash")
            .filter("hash", HashSha256::new(), Value::Null)
            .unwrap()
            .filter("digests", digests, Value::Null)
            .unwrap()
            .filter("data", data, Value::Null)
            .unwrap()
            .branch("hash", "digests")
            .unwrap()
            .main("hash", "data")
            .unwrap()
            .build()
            .unwrap();

        pipeline.send(Packet::new("ab")).unwrap();
        pipeline.send(Packet::new(b"c".to_vec())).unwrap();
        pipeline.shut_down().unwrap();

        assert_eq!(hp.len(), 2);
        assert_eq!(
            hd.texts(),
            vec!["ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"]
        );
    }
}

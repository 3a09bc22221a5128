//! Routing filters: pass, discard, merge and fork.

use crate::core::{AttributeSchema, MessageBottle, Packet, Route};
use crate::errors::{ConfigurationError, FilterError, FilterResult};
use crate::filter::{Filter, FilterContext, SetupContext};
use crate::params::{ParameterSchema, Params};
use serde_json::Value;
use std::cmp::Ordering;
use std::str::FromStr;

/// Forwards every unit on main.
#[derive(Debug, Default)]
pub struct PassThrough;

impl PassThrough {
    /// Creates the filter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Filter for PassThrough {
    fn type_tag(&self) -> &str {
        "pass_through"
    }

    fn process(&mut self, packet: Packet, ctx: &mut FilterContext<'_>) -> FilterResult<()> {
        ctx.send_main(packet)
    }
}

/// Absorbs every unit. Bottles addressed to it are still opened.
#[derive(Debug, Default)]
pub struct Waste;

impl Waste {
    /// Creates the filter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Filter for Waste {
    fn type_tag(&self) -> &str {
        "waste"
    }

    fn process(&mut self, _packet: Packet, _ctx: &mut FilterContext<'_>) -> FilterResult<()> {
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
}

/// Confluence point: forwards everything arriving on any link to main.
#[derive(Debug, Default)]
pub struct Merge;

impl Merge {
    /// Creates the filter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Filter for Merge {
    fn type_tag(&self) -> &str {
        "merge"
    }

    fn process(&mut self, packet: Packet, ctx: &mut FilterContext<'_>) -> FilterResult<()> {
        ctx.send_main(packet)
    }
}

/// Sends an independent copy to branch, then the original to main.
#[derive(Debug, Default)]
pub struct BranchClone;

impl BranchClone {
    /// Creates the filter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Filter for BranchClone {
    fn type_tag(&self) -> &str {
        "branch_clone"
    }

    fn process(&mut self, packet: Packet, ctx: &mut FilterContext<'_>) -> FilterResult<()> {
        ctx.send_branch(packet.clone_packet(None))?;
        ctx.send_main(packet)
    }
}

/// Sends the same packet to branch, then to main.
///
/// Whatever the branch does to the packet is visible on main.
#[derive(Debug, Default)]
pub struct BranchRef;

impl BranchRef {
    /// Creates the filter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Filter for BranchRef {
    fn type_tag(&self) -> &str {
        "branch_ref"
    }

    fn process(&mut self, packet: Packet, ctx: &mut FilterContext<'_>) -> FilterResult<()> {
        ctx.send_branch(packet.clone())?;
        ctx.send_main(packet)
    }
}

/// Comparison applied by [`BranchIf`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// `lhs == rhs`
    Equals,
    /// `lhs != rhs`
    NotEquals,
    /// `lhs < rhs`
    LessThan,
    /// `lhs > rhs`
    GreaterThan,
}

impl FromStr for Comparison {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "equals" => Ok(Self::Equals),
            "not_equals" => Ok(Self::NotEquals),
            "less_than" => Ok(Self::LessThan),
            "greater_than" => Ok(Self::GreaterThan),
            other => Err(format!(
                "unknown comparison '{other}', expected \
                 equals, not_equals, less_than or greater_than"
            )),
        }
    }
}

impl Comparison {
    /// Evaluates the comparison. Numbers compare numerically.
    pub fn evaluate(self, lhs: &Value, rhs: &Value) -> FilterResult<bool> {
        match self {
            Self::Equals => Ok(values_equal(lhs, rhs)),
            Self::NotEquals => Ok(!values_equal(lhs, rhs)),
            Self::LessThan => Ok(order(lhs, rhs)? == Ordering::Less),
            Self::GreaterThan => Ok(order(lhs, rhs)? == Ordering::Greater),
        }
    }
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs.as_f64(), rhs.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => lhs == rhs,
    }
}

fn order(lhs: &Value, rhs: &Value) -> FilterResult<Ordering> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => {
            let (a, b) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
            a.partial_cmp(&b)
                .ok_or_else(|| FilterError::data(format!("Cannot order {a} and {b}")))
        }
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        _ => Err(FilterError::data(format!("Cannot order {lhs} and {rhs}"))),
    }
}

const BRANCH_KEY: &str = "branch_key";
const COMPARISON: &str = "comparison";
const COMPARE_VALUE: &str = "compare_value";
const BRANCH_ON_PACKET: &str = "branch_on_packet";

/// Compares an attribute with `compare_value`: true goes to branch, false to
/// main.
///
/// With `branch_on_packet` false the left-hand side is the filter's own
/// parameter named by `branch_key` instead of a packet attribute.
#[derive(Debug)]
pub struct BranchIf {
    comparison: Comparison,
}

impl BranchIf {
    /// Creates the filter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            comparison: Comparison::Equals,
        }
    }

    fn parse_comparison(params: &Params) -> Result<Comparison, ConfigurationError> {
        params
            .str(COMPARISON)?
            .parse()
            .map_err(|e: String| ConfigurationError::bad_value(params.filter_name(), COMPARISON, e))
    }
}

impl Default for BranchIf {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter for BranchIf {
    fn type_tag(&self) -> &str {
        "branch_if"
    }

    fn parameter_schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .required(BRANCH_KEY)
            .optional(COMPARISON, "equals")
            .optional(COMPARE_VALUE, true)
            .optional(BRANCH_ON_PACKET, true)
    }

    fn attribute_schema(&self, params: &Params) -> Option<AttributeSchema> {
        if params.bool(BRANCH_ON_PACKET).ok()? {
            Some(AttributeSchema::new().reads(params.str(BRANCH_KEY).ok()?))
        } else {
            None
        }
    }

    fn validate_params(&self, setup: &SetupContext<'_>) -> FilterResult<()> {
        let params = setup.params();
        params.ensure_all_set()?;
        params.str(BRANCH_KEY)?;
        params.bool(BRANCH_ON_PACKET)?;
        Self::parse_comparison(params)?;
        Ok(())
    }

    fn init_filter(&mut self, setup: &SetupContext<'_>) -> FilterResult<()> {
        self.comparison = Self::parse_comparison(setup.params())?;
        Ok(())
    }

    fn process(&mut self, packet: Packet, ctx: &mut FilterContext<'_>) -> FilterResult<()> {
        let key = ctx.params().str(BRANCH_KEY)?.to_string();
        let lhs = if ctx.params().bool(BRANCH_ON_PACKET)? {
            ctx.read(&packet, &key)?
        } else {
            ctx.params().get(&key)?.clone()
        };
        let rhs = ctx.params().get(COMPARE_VALUE)?.clone();
        let route = if self.comparison.evaluate(&lhs, &rhs)? {
            Route::Branch
        } else {
            Route::Main
        };
        ctx.send_on(packet, route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineBuilder;
    use crate::stock::Sink;
    use crate::testing::{assert_before, EventLog, RecordingFilter};
    use serde_json::json;

    #[test]
    fn test_comparisons() {
        assert!(Comparison::Equals.evaluate(&json!(1), &json!(1.0)).unwrap());
        assert!(Comparison::NotEquals.evaluate(&json!("a"), &json!("b")).unwrap());
        assert!(Comparison::LessThan.evaluate(&json!(1), &json!(2)).unwrap());
        assert!(Comparison::GreaterThan.evaluate(&json!("b"), &json!("a")).unwrap());
        assert!(Comparison::LessThan.evaluate(&json!(true), &json!(1)).is_err());
        assert!("between".parse::<Comparison>().is_err());
    }

    #[test]
    fn test_branch_clone_sends_independent_copy_first() {
        let log = EventLog::new();
        let mut pipeline = PipelineBuilder::new("clone")
            .filter("fork", BranchClone::new(), Value::Null)
            .unwrap()
            .filter("b", RecordingFilter::new(log.clone()), Value::Null)
            .unwrap()
            .filter("m", RecordingFilter::new(log.clone()), Value::Null)
            .unwrap()
            .branch("fork", "b")
            .unwrap()
            .main("fork", "m")
            .unwrap()
            .build()
            .unwrap();

        pipeline.send(Packet::new("x")).unwrap();
        assert_before(&log.events(), "b:x", "m:x");

        let seen = log.packets();
        assert!(!seen[0].same_as(&seen[1]));
    }

    #[test]
    fn test_branch_ref_shares_packet() {
        let sink_b = Sink::new();
        let sink_m = Sink::new();
        let (hb, hm) = (sink_b.handle(), sink_m.handle());
        let mut pipeline = PipelineBuilder::new("ref")
            .filter("fork", BranchRef::new(), Value::Null)
            .unwrap()
            .filter("b", sink_b, Value::Null)
            .unwrap()
            .filter("m", sink_m, Value::Null)
            .unwrap()
            .branch("fork", "b")
            .unwrap()
            .main("fork", "m")
            .unwrap()
            .build()
            .unwrap();

        pipeline.send(Packet::new("x")).unwrap();
        assert!(hb.packets()[0].same_as(&hm.packets()[0]));
    }

    #[test]
    fn test_branch_if_routes() {
        let yes = Sink::new();
        let no = Sink::new();
        let (hy, hn) = (yes.handle(), no.handle());
        let mut pipeline = PipelineBuilder::new("if")
            .filter(
                "if",
                BranchIf::new(),
                json!({"branch_key": "n", "comparison": "greater_than", "compare_value": 2}),
            )
            .unwrap()
            .filter("yes", yes, Value::Null)
            .unwrap()
            .filter("no", no, Value::Null)
            .unwrap()
            .branch("if", "yes")
            .unwrap()
            .main("if", "no")
            .unwrap()
            .build()
            .unwrap();

        for n in 1..=4 {
            pipeline.send(Packet::new("x").with_attr("n", n)).unwrap();
        }
        assert_eq!(hy.len(), 2);
        assert_eq!(hn.len(), 2);

        let err = pipeline.send(Packet::new("no attribute")).unwrap_err();
        assert!(matches!(err, FilterError::Attribute(_)));
    }

    #[test]
    fn test_branch_if_bad_comparison() {
        let err = PipelineBuilder::new("if")
            .filter("if", BranchIf::new(), json!({"branch_key": "n", "comparison": "between"}))
            .unwrap()
            .build()
            .unwrap_err();
        match err {
            FilterError::Configuration(e) => assert_eq!(e.code(), Some("CONFIG-BAD_VALUE")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_waste_absorbs_bottles() {
        let sink = Sink::new();
        let handle = sink.handle();
        let mut pipeline = PipelineBuilder::new("waste")
            .filter("w", Waste::new(), Value::Null)
            .unwrap()
            .filter("s", sink, json!({"capture_msgs": true}))
            .unwrap()
            .main("w", "s")
            .unwrap()
            .build()
            .unwrap();

        pipeline.send(Packet::new("x")).unwrap();
        pipeline.send(MessageBottle::to_filter("s", "note").single_use(false)).unwrap();
        assert!(handle.is_empty());
    }
}

//! Filters that emit control bottles.

use crate::core::{MessageBottle, Packet, Route};
use crate::errors::{ConfigurationError, FilterError, FilterResult, RoutingError};
use crate::filter::{Filter, FilterContext, SetupContext};
use crate::params::ParameterSchema;
use serde_json::Value;

/// Emits a single-use reset bottle ahead of every packet.
///
/// The new value is `value` itself, or the packet attribute `value` names, or
/// when `value` is null the packet attribute named `param_name`.
#[derive(Debug, Default)]
pub struct Reset;

impl Reset {
    /// Creates the filter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn new_value(packet: &Packet, param_name: &str, value: &Value) -> FilterResult<Value> {
        match value {
            Value::Null => Ok(packet.get(param_name)?),
            Value::String(attr) if packet.has(attr) => Ok(packet.get(attr)?),
            other => Ok(other.clone()),
        }
    }
}

impl Filter for Reset {
    fn type_tag(&self) -> &str {
        "reset"
    }

    fn parameter_schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .required("target_filter_name")
            .required("param_name")
            .optional("value", Value::Null)
    }

    fn validate_params(&self, setup: &SetupContext<'_>) -> FilterResult<()> {
        setup.params().ensure_all_set()?;
        setup.params().str("target_filter_name")?;
        setup.params().str("param_name")?;
        if setup.link(Route::Main).is_none() {
            return Err(RoutingError::topology(
                setup.name(),
                "must have a main link to carry its reset bottles",
            )
            .into());
        }
        Ok(())
    }

    fn process(&mut self, packet: Packet, ctx: &mut FilterContext<'_>) -> FilterResult<()> {
        let params = ctx.params();
        let target = params.str("target_filter_name")?.to_string();
        let param_name = params.str("param_name")?.to_string();
        let new_value = Self::new_value(&packet, &param_name, params.get("value")?)?;

        ctx.send_main(MessageBottle::reset(target, &param_name, new_value))?;
        ctx.send_main(packet)
    }
}

/// Sends a custom bottle to branch, then the packet to main.
#[derive(Debug, Default)]
pub struct SendMessage;

impl SendMessage {
    /// Creates the filter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Filter for SendMessage {
    fn type_tag(&self) -> &str {
        "send_message"
    }

    fn parameter_schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .required("target_filter_name")
            .required("message")
            .optional("values", serde_json::json!({}))
    }

    fn validate_params(&self, setup: &SetupContext<'_>) -> FilterResult<()> {
        let params = setup.params();
        params.ensure_all_set()?;
        params.str("target_filter_name")?;
        params.str("message")?;
        if !params.get("values")?.is_object() {
            return Err(ConfigurationError::bad_value(
                params.filter_name(),
                "values",
                "expected an object",
            )
            .into());
        }
        Ok(())
    }

    fn process(&mut self, packet: Packet, ctx: &mut FilterContext<'_>) -> FilterResult<()> {
        let params = ctx.params();
        let mut bottle =
            MessageBottle::to_filter(params.str("target_filter_name")?, params.str("message")?);
        match params.get("values")? {
            Value::Object(values) => {
                for (key, value) in values {
                    bottle = bottle.with_value(key.clone(), value.clone());
                }
            }
            other => {
                return Err(FilterError::data(format!(
                    "'values' must be an object, found {other}"
                )))
            }
        }
        ctx.send_branch(bottle)?;
        ctx.send_main(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BottleMessage;
    use crate::pipeline::PipelineBuilder;
    use crate::stock::{Batch, Sink};
    use serde_json::json;

    #[test]
    fn test_reset_drives_downstream_param() {
        let sink = Sink::new();
        let handle = sink.handle();
        let mut pipeline = PipelineBuilder::new("reset")
            .filter(
                "reset",
                Reset::new(),
                json!({"target_filter_name": "batch", "param_name": "size"}),
            )
            .unwrap()
            .filter("batch", Batch::new(), json!({"size": 100}))
            .unwrap()
            .filter("sink", sink, Value::Null)
            .unwrap()
            .chain(&["reset", "batch", "sink"])
            .unwrap()
            .build()
            .unwrap();

        pipeline.send(Packet::new("abcdef").with_attr("size", 2)).unwrap();
        assert_eq!(handle.texts(), vec!["ab", "cd", "ef"]);
    }

    #[test]
    fn test_reset_value_from_named_attribute() {
        let packet = Packet::new("x").with_attr("width", 7);
        assert_eq!(Reset::new_value(&packet, "size", &json!("width")).unwrap(), json!(7));
        assert_eq!(Reset::new_value(&packet, "size", &json!("plain")).unwrap(), json!("plain"));
        assert!(Reset::new_value(&packet, "size", &Value::Null).is_err());
    }

    #[test]
    fn test_reset_needs_main_link() {
        let err = PipelineBuilder::new("reset")
            .filter("reset", Reset::new(), json!({"target_filter_name": "x", "param_name": "y"}))
            .unwrap()
            .build()
            .unwrap_err();
        assert!(matches!(err, FilterError::Routing(RoutingError::Topology { .. })));
    }

    #[test]
    fn test_send_message_bottle_before_packet() {
        let msgs = Sink::new();
        let data = Sink::new();
        let (hm, hd) = (msgs.handle(), data.handle());
        let mut pipeline = PipelineBuilder::new("message")
            .filter(
                "send",
                SendMessage::new(),
                json!({
                    "target_filter_name": "elsewhere",
                    "message": "wake",
                    "values": {"level": 3},
                }),
            )
            .unwrap()
            .filter("msgs", msgs, json!({"capture_msgs": true}))
            .unwrap()
            .filter("data", data, Value::Null)
            .unwrap()
            .branch("send", "msgs")
            .unwrap()
            .main("send", "data")
            .unwrap()
            .build()
            .unwrap();

        pipeline.send(Packet::new("p")).unwrap();
        let bottles = hm.bottles();
        assert_eq!(bottles.len(), 1);
        assert_eq!(bottles[0].message, BottleMessage::Custom("wake".into()));
        assert_eq!(bottles[0].get("level"), Some(&json!(3)));
        assert_eq!(hd.texts(), vec!["p"]);
    }
}

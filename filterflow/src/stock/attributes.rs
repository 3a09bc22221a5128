//! Filters that write packet attributes.

use crate::core::{AttributeSchema, Packet};
use crate::errors::{AttributeError, ConfigurationError, FilterError, FilterResult};
use crate::filter::{Filter, FilterContext, SetupContext};
use crate::params::{ParameterSchema, Params};
use serde_json::{Number, Value};
use std::str::FromStr;

/// Sets `tag_field_name` to `tag_field_value` on every packet.
#[derive(Debug, Default)]
pub struct TagPacket;

impl TagPacket {
    /// Creates the filter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Filter for TagPacket {
    fn type_tag(&self) -> &str {
        "tag_packet"
    }

    fn parameter_schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .required("tag_field_name")
            .required("tag_field_value")
    }

    fn attribute_schema(&self, params: &Params) -> Option<AttributeSchema> {
        Some(AttributeSchema::new().writes(params.str("tag_field_name").ok()?))
    }

    fn process(&mut self, packet: Packet, ctx: &mut FilterContext<'_>) -> FilterResult<()> {
        let name = ctx.params().str("tag_field_name")?.to_string();
        let value = ctx.params().get("tag_field_value")?.clone();
        ctx.write(&packet, &name, value)?;
        ctx.send_main(packet)
    }
}

/// Arithmetic applied by [`Calculate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `lhs + rhs`
    Add,
    /// `lhs - rhs`
    Subtract,
    /// `lhs * rhs`
    Multiply,
    /// `lhs / rhs`, always as a float.
    Divide,
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(Self::Add),
            "subtract" => Ok(Self::Subtract),
            "multiply" => Ok(Self::Multiply),
            "divide" => Ok(Self::Divide),
            other => Err(format!(
                "unknown operator '{other}', expected add, subtract, multiply or divide"
            )),
        }
    }
}

impl Operator {
    /// Applies the operator. Integer operands stay integers except for
    /// division; overflow and division by zero are logic errors.
    pub fn apply(self, lhs: &Number, rhs: &Number) -> FilterResult<Value> {
        if self != Self::Divide {
            if let (Some(a), Some(b)) = (lhs.as_i64(), rhs.as_i64()) {
                let result = match self {
                    Self::Add => a.checked_add(b),
                    Self::Subtract => a.checked_sub(b),
                    _ => a.checked_mul(b),
                };
                return result
                    .map(Value::from)
                    .ok_or_else(|| {
                        FilterError::logic(format!("Integer overflow in {a} {self:?} {b}"))
                    });
            }
        }

        let (a, b) = (to_f64(lhs)?, to_f64(rhs)?);
        let result = match self {
            Self::Add => a + b,
            Self::Subtract => a - b,
            Self::Multiply => a * b,
            Self::Divide => {
                if b == 0.0 {
                    return Err(FilterError::logic(format!("Division by zero: {a} / {b}")));
                }
                a / b
            }
        };
        Number::from_f64(result)
            .map(Value::Number)
            .ok_or_else(|| FilterError::logic(format!("Result {result} is not a finite number")))
    }
}

fn to_f64(n: &Number) -> FilterResult<f64> {
    n.as_f64()
        .ok_or_else(|| FilterError::data(format!("{n} is not representable as a float")))
}

/// Computes `lhs operator rhs` into the `param_result` attribute.
///
/// Either operand may be a number or the name of a packet attribute holding
/// one. The result attribute must not already exist.
#[derive(Debug)]
pub struct Calculate {
    operator: Operator,
}

impl Calculate {
    /// Creates the filter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            operator: Operator::Add,
        }
    }

    fn parse_operator(params: &Params) -> Result<Operator, ConfigurationError> {
        params
            .str("operator")?
            .parse()
            .map_err(|e: String| ConfigurationError::bad_value(params.filter_name(), "operator", e))
    }

    fn operand(packet: &Packet, param: &str, value: &Value) -> FilterResult<Number> {
        let resolved = match value {
            Value::String(attr) => packet.get(attr)?,
            other => other.clone(),
        };
        match resolved {
            Value::Number(n) => Ok(n),
            other => Err(FilterError::data(format!(
                "Operand '{param}' must be a number, found {other}"
            ))),
        }
    }
}

impl Default for Calculate {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter for Calculate {
    fn type_tag(&self) -> &str {
        "calculate"
    }

    fn parameter_schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .required("lhs_value")
            .optional("operator", "add")
            .required("rhs_value")
            .required("param_result")
    }

    fn validate_params(&self, setup: &SetupContext<'_>) -> FilterResult<()> {
        setup.params().ensure_all_set()?;
        setup.params().str("param_result")?;
        Self::parse_operator(setup.params())?;
        Ok(())
    }

    fn init_filter(&mut self, setup: &SetupContext<'_>) -> FilterResult<()> {
        self.operator = Self::parse_operator(setup.params())?;
        Ok(())
    }

    fn process(&mut self, packet: Packet, ctx: &mut FilterContext<'_>) -> FilterResult<()> {
        let params = ctx.params();
        let result_name = params.str("param_result")?;
        if packet.has(result_name) {
            return Err(AttributeError::AlreadySet {
                name: result_name.to_string(),
            }
            .into());
        }
        let lhs = Self::operand(&packet, "lhs_value", params.get("lhs_value")?)?;
        let rhs = Self::operand(&packet, "rhs_value", params.get("rhs_value")?)?;
        packet.set_new(result_name, self.operator.apply(&lhs, &rhs)?)?;
        ctx.send_main(packet)
    }
}

use crate::core::{Packet, Payload};
use crate::errors::{FilterError, FilterResult};
use crate::filter::{Filter, FilterContext};
use crate::params::ParameterSchema;

const WINDOW: usize = 5;

/// Five-point slope over a window of packets.
///
/// Expects a `Packets` payload, such as the snapshot a windowed tank sends on
/// branch. With exactly five packets, the slope of `calc_source_name` is
/// written onto the centre packet as `{calc_source_name}_{calc_name_suffix}`.
/// Smaller windows pass through untouched.
#[derive(Debug, Default)]
pub struct CalcSlope;

impl CalcSlope {
    /// Creates the filter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// `(v4 - v0 + v3 - v1) / 6`
    #[must_use]
    pub fn slope(values: [f64; WINDOW]) -> f64 {
        (values[4] - values[0] + values[3] - values[1]) / 6.0
    }
}

impl Filter for CalcSlope {
    fn type_tag(&self) -> &str {
        "calc_slope"
    }

    fn parameter_schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .required("calc_source_name")
            .optional("calc_name_suffix", "slope")
    }

    fn process(&mut self, packet: Packet, ctx: &mut FilterContext<'_>) -> FilterResult<()> {
        let window = match packet.payload() {
            Payload::Packets(window) => window,
            other => {
                return Err(FilterError::data(format!(
                    "'{}' needs a packet window, got {}",
                    ctx.name(),
                    other.kind_name()
                )))
            }
        };
        if window.len() > WINDOW {
            return Err(FilterError::data(format!(
                "Slope window holds {} packets, expected at most {WINDOW}",
                window.len()
            )));
        }

        if window.len() == WINDOW {
            let source = ctx.params().str("calc_source_name")?;
            let mut values = [0.0; WINDOW];
            for (value, member) in values.iter_mut().zip(&window) {
                *value = member.get_f64(source)?;
            }
            let target = format!("{source}_{}", ctx.params().str("calc_name_suffix")?);
            window[2].set(target, Self::slope(values));
        }
        ctx.send_main(packet)
    }
}

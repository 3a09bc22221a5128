//! Sources that drive a pipeline.
//!
//! A source is an explicit resumable state machine: every
//! [`Source::pull`] call returns the next unit, and the source keeps its
//! position between calls. Sources that can block poll the shutdown token
//! and stop promptly once it is set.

mod chunk;
mod iter;

#[cfg(feature = "channel-source")]
mod channel;
#[cfg(feature = "stream-source")]
mod stream;

pub use chunk::ChunkSource;
pub use iter::IterSource;

#[cfg(feature = "channel-source")]
pub use channel::{channel, ChannelSource, UnitSender};
#[cfg(feature = "stream-source")]
pub use stream::StreamSource;

use crate::core::Unit;
use crate::errors::FilterResult;
use crate::pipeline::ShutdownToken;

/// Trait for pipeline sources.
pub trait Source: Send {
    /// Produces the next unit, or `None` when exhausted or shutting down.
    fn pull(&mut self, shutdown: &ShutdownToken) -> FilterResult<Option<Unit>>;

    /// Releases any resource held by the source. Must tolerate repeated calls.
    fn close_source(&mut self) -> FilterResult<()> {
        Ok(())
    }
}

//! Pipeline assembly and execution.
//!
//! This module provides:
//! - The pipeline builder with graph validation
//! - Serializable pipeline descriptions and config
//! - Synchronous graph dispatch
//! - Flush-then-close shutdown orchestration

mod builder;
mod config;
mod failure;
mod graph;
mod runtime;
mod shutdown;
mod spec;


pub use builder::PipelineBuilder;
pub use config::{FailurePolicy, PipelineConfig};
pub use failure::{FailureRecord, RunSummary};
pub use graph::NodeId;
pub(crate) use graph::Graph;
pub use runtime::Pipeline;
pub use shutdown::{ShutdownCallback, ShutdownToken};
pub use spec::{FilterSpec, LinkSpec, PipelineSpec};

//! # Filterflow
//!
//! A pipes-and-filters dataflow engine.
//!
//! Filterflow moves packets through a graph of filters with support for:
//!
//! - **Two-route forwarding**: every filter may emit on a main and a branch route
//! - **Control bottles**: addressed messages that reset filter parameters in flight
//! - **Tanks**: priority-ordered buffers that turn feedback loops into iteration
//! - **Ordered shutdown**: every filter is flushed, then every filter is closed
//! - **Sources**: iterators, chunked readers, channels and async streams
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use filterflow::prelude::*;
//! use serde_json::json;
//!
//! let sink = Sink::new();
//! let out = sink.handle();
//! let mut pipeline = PipelineBuilder::new("words")
//!     .filter("split", SplitWords::new(), json!({}))?
//!     .filter("out", sink, json!({"max_results": 0}))?
//!     .main("split", "out")?
//!     .build()?;
//!
//! pipeline.send(Packet::new("hello filter world"))?;
//! pipeline.shut_down()?;
//! assert_eq!(out.texts(), vec!["hello", "filter", "world"]);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod core;
pub mod errors;
pub mod filter;
pub mod observability;
pub mod params;
pub mod pipeline;
pub mod sources;
pub mod stock;
pub mod tank;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{
        BottleMessage, Destination, FilterState, MessageBottle, Packet, Payload, Route, Unit,
    };
    pub use crate::errors::{
        AttributeError, ConfigurationError, ErrorKind, FilterError, FilterResult, RoutingError,
    };
    pub use crate::filter::{Filter, FilterContext, FilterRegistry, SetupContext};
    pub use crate::params::{ParameterSchema, Params};
    pub use crate::pipeline::{
        FailurePolicy, Pipeline, PipelineBuilder, PipelineConfig, PipelineSpec, RunSummary,
        ShutdownToken,
    };
    pub use crate::sources::{ChunkSource, IterSource, Source};
    pub use crate::stock::{Sink, SinkHandle};
    pub use crate::tank::{TankFeed, TankQueue};
}

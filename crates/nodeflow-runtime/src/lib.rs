#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod definition;
pub mod engine;
mod error;
pub mod graph;
pub mod node;
pub mod nodes;
pub mod port;

#[doc(hidden)]
pub mod prelude;

pub use error::{AggregateError, Error, NodeError, NodeFailure, NodeResult, Result};
pub use nodeflow_core::{NodeId, PortId, TypeRegistry, Value, ValueType};

/// Tracing target for runtime operations.
pub const TRACING_TARGET: &str = "nodeflow_runtime";

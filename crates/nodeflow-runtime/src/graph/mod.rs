//! Graph structure and connection contract.

mod graph;
mod link;
mod slot;

pub use graph::Graph;
pub(crate) use graph::SharedNode;
pub(crate) use link::LinkKind;
pub use link::Connection;
pub(crate) use slot::PortSlot;

/// Tracing target for graph construction.
pub(crate) const TRACING_TARGET: &str = "nodeflow_runtime::graph";

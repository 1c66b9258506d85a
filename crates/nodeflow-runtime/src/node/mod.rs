//! Node trait, execution context and node metadata.
//!
//! - [`Node`]: a unit of computation with a fixed port layout
//! - [`ExecContext`]: the per-execution working area
//! - [`PropertyDescriptor`]: editable property metadata
//! - [`NodeRegistry`]: factories keyed by node type name

mod context;
mod property;
mod registry;

use std::any::Any;

use async_trait::async_trait;

pub use context::{ExecContext, Triggered};
pub use property::{Constraint, PropertyDescriptor, PropertyError, PropertyKind};
pub use registry::{NodeFactory, NodeRegistry};

use crate::error::NodeResult;
use crate::port::NodePorts;

/// A typed unit of computation.
///
/// A node declares its ports once through [`Node::ports`]; the layout is
/// captured when the node joins a graph. Each execution snapshots the
/// connected inputs into an [`ExecContext`], runs [`Node::execute`] and,
/// on success, publishes the written outputs to every linked input.
///
/// A node that declares any exec port is an execution node. If it has exec
/// inputs it only runs when control reaches it; calling
/// [`ExecContext::trigger`] selects which exec outputs fire, and marking
/// none fires all of them.
#[async_trait]
pub trait Node: Any + Send {
    /// Returns the stable type name used by registries and documents.
    fn type_name(&self) -> &'static str;

    /// Declares the port layout.
    fn ports(&self) -> NodePorts;

    /// Describes the editable properties.
    fn properties(&self) -> Vec<PropertyDescriptor> {
        Vec::new()
    }

    /// Clears per-run state. Called once per run before the first execution.
    fn reset(&mut self) {}

    /// Runs the computation.
    async fn execute(&mut self, ctx: &mut ExecContext) -> NodeResult<()>;
}

//! Graph, execution and node error types.

use std::fmt;
use std::time::Duration;

use nodeflow_core::{BoxedError, NodeId, ValueError};
use thiserror::Error;

use crate::engine::EngineConfigBuilderError;
use crate::node::PropertyError;
use crate::port::PortKind;

/// Result type for graph and execution operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Result type for node computations.
pub type NodeResult<T> = std::result::Result<T, NodeError>;

/// Errors raised by graph construction, persistence and execution.
#[derive(Debug, Error)]
pub enum Error {
    /// No node with this ID exists in the graph.
    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    /// A node with this ID already exists in the graph.
    #[error("node {0} already exists")]
    DuplicateNode(NodeId),

    /// No factory is registered for this node type.
    #[error("unknown node type '{0}'")]
    UnknownNodeType(String),

    /// Reading or writing a node property failed.
    #[error(transparent)]
    Property(#[from] PropertyError),

    /// The node is executing and cannot be inspected right now.
    #[error("node {0} is busy executing")]
    NodeBusy(NodeId),

    /// The graph has nodes but none of them can ever start.
    #[error("graph cannot start: {0}")]
    Unsatisfiable(String),

    /// The run was cancelled and no node reported a failure.
    ///
    /// Nodes that stopped because of the cancellation are reported
    /// through [`Error::Execution`] instead, with the `cancelled` flag set.
    #[error("execution cancelled")]
    Cancelled,

    /// One or more nodes failed during the run.
    #[error(transparent)]
    Execution(#[from] AggregateError),

    /// Engine configuration is invalid.
    #[error("invalid engine config: {0}")]
    InvalidConfig(String),

    /// A persisted graph document is malformed or inconsistent.
    #[error("invalid graph document: {0}")]
    Document(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<EngineConfigBuilderError> for Error {
    fn from(error: EngineConfigBuilderError) -> Self {
        Self::InvalidConfig(error.to_string())
    }
}

/// Error returned by a single node computation.
#[derive(Debug, Error)]
pub enum NodeError {
    /// The node rejected its inputs or state.
    #[error("{0}")]
    Failed(String),

    /// A required input holds no value.
    #[error("input {index} holds no value")]
    MissingInput {
        /// Position of the input port.
        index: usize,
    },

    /// A value had an unexpected type or failed to convert.
    #[error(transparent)]
    Value(#[from] ValueError),

    /// The node addressed a port it does not declare.
    #[error("{kind} port {index} is out of range")]
    PortOutOfRange {
        /// Kind of the addressed port.
        kind: PortKind,
        /// Position that was addressed.
        index: usize,
    },

    /// A run parameter the node reads was not supplied.
    #[error("missing run parameter '{0}'")]
    MissingParameter(String),

    /// The node observed cancellation and stopped early.
    #[error("cancelled")]
    Cancelled,

    /// The computation exceeded the configured node timeout.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The computation panicked.
    #[error("panicked: {0}")]
    Panicked(String),

    /// Any other error raised by user code.
    #[error(transparent)]
    Other(BoxedError),
}

impl NodeError {
    /// Creates a [`NodeError::Failed`] from a message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Wraps an arbitrary error.
    pub fn other(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Other(Box::new(error))
    }
}

/// A node failure recorded during a run.
#[derive(Debug)]
pub struct NodeFailure {
    /// ID of the failed node.
    pub node_id: NodeId,
    /// Type name of the failed node.
    pub type_name: &'static str,
    /// The error it returned.
    pub error: NodeError,
}

impl fmt::Display for NodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.type_name, self.node_id, self.error)
    }
}

/// Every failure collected over one run, raised after the run drains.
#[derive(Debug, Error)]
pub struct AggregateError {
    /// Failures in completion order.
    pub failures: Vec<NodeFailure>,
    /// Whether the run was also cancelled.
    pub cancelled: bool,
}

impl AggregateError {
    /// Returns the failure recorded for a node, if any.
    pub fn failure(&self, node_id: NodeId) -> Option<&NodeFailure> {
        self.failures.iter().find(|f| f.node_id == node_id)
    }

    /// Returns the IDs of every failed node.
    pub fn failed_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.failures.iter().map(|f| f.node_id)
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} node(s) failed", self.failures.len())?;
        if self.cancelled {
            f.write_str(" in a cancelled run")?;
        }
        for failure in &self.failures {
            write!(f, "\n  - {failure}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_display_lists_every_failure() {
        let first = NodeId::new();
        let second = NodeId::new();
        let error = AggregateError {
            failures: vec![
                NodeFailure {
                    node_id: first,
                    type_name: "fail",
                    error: NodeError::failed("boom"),
                },
                NodeFailure {
                    node_id: second,
                    type_name: "fail",
                    error: NodeError::MissingInput { index: 1 },
                },
            ],
            cancelled: false,
        };

        let text = error.to_string();
        assert!(text.starts_with("2 node(s) failed"));
        assert!(text.contains(&format!("fail ({first}): boom")));
        assert!(text.contains(&format!("fail ({second}): input 1 holds no value")));
        assert!(error.failure(second).is_some());
    }
}

//! Prelude module for convenient imports.
//!
//! This module re-exports commonly used types for ergonomic imports:
//!
//! ```rust
//! use nodeflow_runtime::prelude::*;
//! ```

pub use async_trait::async_trait;
pub use nodeflow_core::{NodeId, PortId, TypeRegistry, Value, ValueType};

pub use crate::definition::{GraphDocument, GraphMetadata};
pub use crate::engine::{
    EngineConfig, ExecuteOptions, ExecutionObserver, ExecutionReport, GraphExecutor, Parameters,
};
pub use crate::error::{AggregateError, Error, NodeError, NodeFailure, NodeResult, Result};
pub use crate::graph::{Connection, Graph};
pub use crate::node::{
    Constraint, ExecContext, Node, NodeRegistry, PropertyDescriptor, PropertyError, PropertyKind,
    Triggered,
};
pub use crate::nodes::{Branch, ForLoop, Parameter, Sequence, Start};
pub use crate::port::{NodePorts, PortKind, PortRef};

//! Per-run options: parameters, observer and cancellation.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use nodeflow_core::{NodeId, Value};
use tokio_util::sync::CancellationToken;

use crate::error::NodeError;

/// Named values supplied to a run and read by nodes during compute.
#[derive(Debug, Clone, Default)]
pub struct Parameters(HashMap<String, Value>);

impl Parameters {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a parameter.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }

    /// Returns a parameter by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Returns whether a parameter is present.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Returns the number of parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether no parameter is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over all parameters.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}

/// Receives node lifecycle events of a run.
///
/// Callbacks run on the scheduling loop and must not block. They observe
/// only; nothing they do affects scheduling.
pub trait ExecutionObserver: Send + Sync {
    /// A node execution was started.
    fn on_node_started(&self, _node_id: NodeId) {}

    /// A node execution finished successfully.
    fn on_node_finished(&self, _node_id: NodeId) {}

    /// A node execution failed.
    fn on_node_failed(&self, _node_id: NodeId, _error: &NodeError) {}
}

impl<T: ExecutionObserver + ?Sized> ExecutionObserver for Arc<T> {
    fn on_node_started(&self, node_id: NodeId) {
        (**self).on_node_started(node_id);
    }

    fn on_node_finished(&self, node_id: NodeId) {
        (**self).on_node_finished(node_id);
    }

    fn on_node_failed(&self, node_id: NodeId, error: &NodeError) {
        (**self).on_node_failed(node_id, error);
    }
}

/// Options for a single [`GraphExecutor::execute`] call.
///
/// [`GraphExecutor::execute`]: crate::engine::GraphExecutor::execute
#[derive(Clone, Default)]
pub struct ExecuteOptions {
    /// Run parameters.
    pub parameters: Parameters,
    /// Lifecycle observer.
    pub observer: Option<Arc<dyn ExecutionObserver>>,
    /// Cooperative cancellation signal.
    pub cancel: CancellationToken,
}

impl ExecuteOptions {
    /// Creates default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the run parameters.
    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Adds one run parameter.
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name, value);
        self
    }

    /// Sets the lifecycle observer.
    pub fn with_observer(mut self, observer: impl ExecutionObserver + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Sets the cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

impl fmt::Debug for ExecuteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecuteOptions")
            .field("parameters", &self.parameters)
            .field("observer", &self.observer.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

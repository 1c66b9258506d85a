//! Private working area handed to a node for one execution.

use std::any::Any;
use std::collections::BTreeSet;
use std::sync::Arc;

use nodeflow_core::{NodeId, Value, ValueError, ValueType};
use tokio_util::sync::CancellationToken;

use crate::engine::Parameters;
use crate::error::{NodeError, NodeResult};
use crate::port::{NodePorts, PortKind};

/// Exec outputs fired by one execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Triggered {
    /// Every exec output fires.
    All,
    /// Only the listed exec outputs fire.
    Only(BTreeSet<usize>),
}

impl Triggered {
    /// Returns whether exec output `index` fires.
    pub fn contains(&self, index: usize) -> bool {
        match self {
            Self::All => true,
            Self::Only(set) => set.contains(&index),
        }
    }
}

/// Snapshot of a node's inputs plus buffers for its outputs and fired
/// branches.
///
/// The scheduler builds a fresh context per execution, so triggered
/// branches never leak from one run into the next.
#[derive(Debug)]
pub struct ExecContext {
    node_id: NodeId,
    inputs: Vec<Option<Value>>,
    outputs: Vec<Option<Value>>,
    output_types: Vec<ValueType>,
    exec_outputs: usize,
    triggered: BTreeSet<usize>,
    parameters: Arc<Parameters>,
    cancel: CancellationToken,
}

impl ExecContext {
    pub(crate) fn new(
        node_id: NodeId,
        inputs: Vec<Option<Value>>,
        output_types: Vec<ValueType>,
        exec_outputs: usize,
        parameters: Arc<Parameters>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            node_id,
            inputs,
            outputs: vec![None; output_types.len()],
            output_types,
            exec_outputs,
            triggered: BTreeSet::new(),
            parameters,
            cancel,
        }
    }

    /// Creates a context outside any graph, shaped after `ports`.
    ///
    /// Useful for exercising a node on its own; inputs start empty.
    pub fn detached(ports: &NodePorts) -> Self {
        let output_types = ports
            .ports(PortKind::Output)
            .iter()
            .map(|spec| spec.value_type.unwrap_or_else(ValueType::dynamic))
            .collect();

        Self::new(
            NodeId::new(),
            vec![None; ports.len(PortKind::Input)],
            output_types,
            ports.len(PortKind::ExecOut),
            Arc::default(),
            CancellationToken::new(),
        )
    }

    /// Sets an input value on a detached context.
    pub fn with_input(mut self, index: usize, value: impl Into<Value>) -> Self {
        if let Some(slot) = self.inputs.get_mut(index) {
            *slot = Some(value.into());
        }
        self
    }

    /// Replaces the run parameters.
    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = Arc::new(parameters);
        self
    }

    /// Returns the executing node's ID.
    #[inline]
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Returns the number of data inputs.
    #[inline]
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Returns the number of data outputs.
    #[inline]
    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    /// Returns the snapshot of input `index`.
    pub fn input(&self, index: usize) -> Option<&Value> {
        self.inputs.get(index).and_then(Option::as_ref)
    }

    /// Reads input `index` as a `T`, or `None` when it holds nothing.
    pub fn input_as<T: Any + Clone>(&self, index: usize) -> NodeResult<Option<T>> {
        self.check_port(PortKind::Input, index, self.inputs.len())?;
        match self.input(index) {
            Some(value) => Ok(Some(value.get::<T>()?)),
            None => Ok(None),
        }
    }

    /// Reads input `index` as a `T`, failing when it holds nothing.
    pub fn require<T: Any + Clone>(&self, index: usize) -> NodeResult<T> {
        self.input_as::<T>(index)?
            .ok_or(NodeError::MissingInput { index })
    }

    /// Reads input `index` as a `T`, falling back to `default`.
    pub fn input_or<T: Any + Clone>(&self, index: usize, default: T) -> NodeResult<T> {
        Ok(self.input_as::<T>(index)?.unwrap_or(default))
    }

    /// Writes output `index`; the value must match the declared type.
    pub fn set_output(&mut self, index: usize, value: impl Into<Value>) -> NodeResult<()> {
        self.check_port(PortKind::Output, index, self.outputs.len())?;

        let value = value.into();
        let declared = self.output_types[index];
        if !declared.is_dynamic() && declared != value.value_type() {
            return Err(ValueError::TypeMismatch {
                expected: declared.name(),
                found: value.value_type().name(),
            }
            .into());
        }

        self.outputs[index] = Some(value);
        Ok(())
    }

    /// Returns the value written to output `index` so far.
    pub fn output(&self, index: usize) -> Option<&Value> {
        self.outputs.get(index).and_then(Option::as_ref)
    }

    /// Marks exec output `index` as fired.
    pub fn trigger(&mut self, index: usize) -> NodeResult<()> {
        self.check_port(PortKind::ExecOut, index, self.exec_outputs)?;
        self.triggered.insert(index);
        Ok(())
    }

    /// Returns the fired exec outputs; nothing marked means all of them.
    pub fn triggered(&self) -> Triggered {
        if self.triggered.is_empty() {
            Triggered::All
        } else {
            Triggered::Only(self.triggered.clone())
        }
    }

    /// Returns the run parameters.
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Returns the run parameter called `name`.
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    /// Returns the run's cancellation token.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns whether the run was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fails with [`NodeError::Cancelled`] once the run is cancelled.
    pub fn check_cancelled(&self) -> NodeResult<()> {
        if self.is_cancelled() {
            return Err(NodeError::Cancelled);
        }
        Ok(())
    }

    pub(crate) fn into_parts(self) -> (Vec<Option<Value>>, Triggered) {
        let triggered = self.triggered();
        (self.outputs, triggered)
    }

    fn check_port(&self, kind: PortKind, index: usize, len: usize) -> NodeResult<()> {
        if index >= len {
            return Err(NodeError::PortOutOfRange { kind, index });
        }
        Ok(())
    }
}

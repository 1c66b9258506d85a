//! Port kinds, port references and per-node port layouts.

use std::any::Any;

use derive_more::Display;
use nodeflow_core::{NodeId, PortId, ValueType};
use serde::{Deserialize, Serialize};

/// The four port kinds a node may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[derive(strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PortKind {
    /// Data consumer.
    Input,
    /// Data producer.
    Output,
    /// Control-flow consumer.
    ExecIn,
    /// Control-flow producer.
    ExecOut,
}

/// How many links a port may hold at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arity {
    /// At most one link; connecting again replaces it.
    Single,
    /// Any number of links; connecting appends.
    Multi,
}

impl PortKind {
    /// Returns whether the port carries control flow rather than data.
    #[inline]
    pub const fn is_exec(self) -> bool {
        matches!(self, Self::ExecIn | Self::ExecOut)
    }

    /// Returns whether the port is the producing end of a link.
    #[inline]
    pub const fn is_producer(self) -> bool {
        matches!(self, Self::Output | Self::ExecOut)
    }

    /// Returns the connection arity of the port kind.
    #[inline]
    pub const fn arity(self) -> Arity {
        match self {
            Self::Input | Self::ExecOut => Arity::Single,
            Self::Output | Self::ExecIn => Arity::Multi,
        }
    }

    /// Returns the kind a port of this kind links to.
    #[inline]
    pub const fn counterpart(self) -> Self {
        match self {
            Self::Input => Self::Output,
            Self::Output => Self::Input,
            Self::ExecIn => Self::ExecOut,
            Self::ExecOut => Self::ExecIn,
        }
    }
}

/// Address of one port of one node in a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display("{node}:{kind}[{index}]")]
pub struct PortRef {
    /// Owning node.
    pub node: NodeId,
    /// Port kind.
    pub kind: PortKind,
    /// Position within the node's ports of that kind.
    pub index: usize,
}

impl PortRef {
    /// Creates a port reference.
    #[inline]
    pub const fn new(node: NodeId, kind: PortKind, index: usize) -> Self {
        Self { node, kind, index }
    }

    /// References a data input.
    #[inline]
    pub const fn input(node: NodeId, index: usize) -> Self {
        Self::new(node, PortKind::Input, index)
    }

    /// References a data output.
    #[inline]
    pub const fn output(node: NodeId, index: usize) -> Self {
        Self::new(node, PortKind::Output, index)
    }

    /// References an exec input.
    #[inline]
    pub const fn exec_in(node: NodeId, index: usize) -> Self {
        Self::new(node, PortKind::ExecIn, index)
    }

    /// References an exec output.
    #[inline]
    pub const fn exec_out(node: NodeId, index: usize) -> Self {
        Self::new(node, PortKind::ExecOut, index)
    }
}

/// Declaration of a single port.
#[derive(Debug, Clone, PartialEq)]
pub struct PortSpec {
    /// Stable identifier, restored from persisted documents.
    pub id: PortId,
    /// Human-readable name.
    pub name: String,
    /// Carried value type; `None` for exec ports.
    pub value_type: Option<ValueType>,
}

impl PortSpec {
    fn data(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            id: PortId::new(),
            name: name.into(),
            value_type: Some(value_type),
        }
    }

    fn exec(name: impl Into<String>) -> Self {
        Self {
            id: PortId::new(),
            name: name.into(),
            value_type: None,
        }
    }
}

/// Ordered port layout of a node, fixed when the node joins a graph.
///
/// ```rust
/// use nodeflow_runtime::port::{NodePorts, PortKind};
///
/// let ports = NodePorts::new()
///     .exec_in("exec")
///     .input::<bool>("condition")
///     .exec_out("true")
///     .exec_out("false");
///
/// assert!(ports.is_flow_gated());
/// assert_eq!(ports.len(PortKind::ExecOut), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodePorts {
    inputs: Vec<PortSpec>,
    outputs: Vec<PortSpec>,
    exec_inputs: Vec<PortSpec>,
    exec_outputs: Vec<PortSpec>,
}

impl NodePorts {
    /// Creates an empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a data input carrying `T`.
    pub fn input<T: Any>(self, name: impl Into<String>) -> Self {
        self.input_of(name, ValueType::of::<T>())
    }

    /// Appends a data input with an explicit type tag.
    pub fn input_of(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.inputs.push(PortSpec::data(name, value_type));
        self
    }

    /// Appends a data output carrying `T`.
    pub fn output<T: Any>(self, name: impl Into<String>) -> Self {
        self.output_of(name, ValueType::of::<T>())
    }

    /// Appends a data output with an explicit type tag.
    pub fn output_of(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.outputs.push(PortSpec::data(name, value_type));
        self
    }

    /// Appends an exec input.
    pub fn exec_in(mut self, name: impl Into<String>) -> Self {
        self.exec_inputs.push(PortSpec::exec(name));
        self
    }

    /// Appends an exec output.
    pub fn exec_out(mut self, name: impl Into<String>) -> Self {
        self.exec_outputs.push(PortSpec::exec(name));
        self
    }

    /// Returns the ports of one kind, in declaration order.
    pub fn ports(&self, kind: PortKind) -> &[PortSpec] {
        match kind {
            PortKind::Input => &self.inputs,
            PortKind::Output => &self.outputs,
            PortKind::ExecIn => &self.exec_inputs,
            PortKind::ExecOut => &self.exec_outputs,
        }
    }

    /// Returns the number of ports of one kind.
    pub fn len(&self, kind: PortKind) -> usize {
        self.ports(kind).len()
    }

    /// Returns the port at `index` of the given kind.
    pub fn get(&self, kind: PortKind, index: usize) -> Option<&PortSpec> {
        self.ports(kind).get(index)
    }

    /// Finds a port by its identifier.
    pub fn find(&self, id: PortId) -> Option<(PortKind, usize)> {
        self.iter()
            .find(|(_, _, spec)| spec.id == id)
            .map(|(kind, index, _)| (kind, index))
    }

    /// Iterates every port with its kind and index.
    pub fn iter(&self) -> impl Iterator<Item = (PortKind, usize, &PortSpec)> + '_ {
        [
            PortKind::Input,
            PortKind::Output,
            PortKind::ExecIn,
            PortKind::ExecOut,
        ]
        .into_iter()
        .flat_map(move |kind| {
            self.ports(kind)
                .iter()
                .enumerate()
                .map(move |(index, spec)| (kind, index, spec))
        })
    }

    /// Returns whether the node declares any exec port.
    pub fn is_execution_node(&self) -> bool {
        !self.exec_inputs.is_empty() || !self.exec_outputs.is_empty()
    }

    /// Returns whether the node only runs when control reaches it.
    pub fn is_flow_gated(&self) -> bool {
        !self.exec_inputs.is_empty()
    }

    pub(crate) fn set_id(&mut self, kind: PortKind, index: usize, id: PortId) -> bool {
        let ports = match kind {
            PortKind::Input => &mut self.inputs,
            PortKind::Output => &mut self.outputs,
            PortKind::ExecIn => &mut self.exec_inputs,
            PortKind::ExecOut => &mut self.exec_outputs,
        };

        match ports.get_mut(index) {
            Some(spec) => {
                spec.id = id;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_table() {
        assert_eq!(PortKind::Output.arity(), Arity::Multi);
        assert_eq!(PortKind::Input.arity(), Arity::Single);
        assert_eq!(PortKind::ExecOut.arity(), Arity::Single);
        assert_eq!(PortKind::ExecIn.arity(), Arity::Multi);
    }

    #[test]
    fn test_counterparts_pair_producers_with_consumers() {
        for kind in [
            PortKind::Input,
            PortKind::Output,
            PortKind::ExecIn,
            PortKind::ExecOut,
        ] {
            let other = kind.counterpart();
            assert_ne!(kind.is_producer(), other.is_producer());
            assert_eq!(kind.is_exec(), other.is_exec());
            assert_eq!(other.counterpart(), kind);
        }
    }

    #[test]
    fn test_layout_lookup() {
        let ports = NodePorts::new()
            .input::<i64>("a")
            .input::<i64>("b")
            .output::<i64>("sum");

        assert!(!ports.is_execution_node());
        assert_eq!(ports.len(PortKind::Input), 2);
        assert_eq!(ports.get(PortKind::Input, 1).unwrap().name, "b");

        let id = ports.get(PortKind::Output, 0).unwrap().id;
        assert_eq!(ports.find(id), Some((PortKind::Output, 0)));
        assert_eq!(ports.iter().count(), 3);
    }

    #[test]
    fn test_port_kind_names() {
        assert_eq!(PortKind::ExecOut.to_string(), "exec_out");
        assert_eq!("exec_in".parse::<PortKind>().unwrap(), PortKind::ExecIn);
    }
}

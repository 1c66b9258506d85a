//! Node graph arena.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use nodeflow_core::{Conversion, NodeId, PortId, TypeRegistry, Value};
use petgraph::Direction;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use serde_json::Value as Json;
use tokio::sync::Mutex;

use super::TRACING_TARGET;
use super::link::{Connection, Link, LinkKind};
use super::slot::PortSlot;
use crate::definition::GraphMetadata;
use crate::engine::{EngineConfig, ExecutionPlan, GraphExecutor};
use crate::error::{Error, Result};
use crate::node::{Node, NodeRegistry, PropertyDescriptor, PropertyError};
use crate::port::{Arity, NodePorts, PortKind, PortRef, PortSpec};

/// A node behind the lock that serialises its executions.
pub(crate) type SharedNode = Arc<Mutex<Box<dyn Node>>>;

/// A node together with its captured layout and port state.
pub(crate) struct NodeEntry {
    pub id: NodeId,
    pub type_name: &'static str,
    pub node: SharedNode,
    pub ports: NodePorts,
    pub inputs: Vec<PortSlot>,
    pub outputs: Vec<PortSlot>,
}

/// A graph of nodes linked through typed data ports and exec ports.
///
/// Nodes live in an arena addressed by [`NodeId`]; links refer to ports by
/// node and position, so nodes hold no pointers to each other. Insertion
/// order is preserved and reported by [`Graph::node_ids`].
pub struct Graph {
    /// The underlying directed graph.
    graph: StableDiGraph<NodeEntry, Link>,
    /// Mapping from NodeId to petgraph's NodeIndex.
    node_indices: HashMap<NodeId, NodeIndex>,
    /// Node IDs in insertion order.
    order: Vec<NodeId>,
    /// Conversion table consulted when linking data ports.
    types: Arc<TypeRegistry>,
    /// Graph metadata.
    pub metadata: GraphMetadata,
}

impl Graph {
    /// Creates an empty graph sharing the global conversion table.
    pub fn new() -> Self {
        Self::with_registry(TypeRegistry::global())
    }

    /// Creates an empty graph with its own conversion table.
    pub fn with_registry(types: Arc<TypeRegistry>) -> Self {
        Self {
            graph: StableDiGraph::new(),
            node_indices: HashMap::new(),
            order: Vec::new(),
            types,
            metadata: GraphMetadata::default(),
        }
    }

    /// Returns the conversion table used for data links.
    pub fn type_registry(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    /// Returns the number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of links in the graph.
    pub fn link_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns whether the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Adds a node and returns its new ID.
    pub fn add_node(&mut self, node: impl Node) -> NodeId {
        self.add_boxed(Box::new(node))
    }

    /// Adds a boxed node and returns its new ID.
    pub fn add_boxed(&mut self, node: Box<dyn Node>) -> NodeId {
        let id = NodeId::new();
        self.insert(id, node);
        id
    }

    /// Adds a node under a caller-chosen ID.
    pub fn add_node_with_id(&mut self, id: NodeId, node: Box<dyn Node>) -> Result<()> {
        if self.contains_node(id) {
            return Err(Error::DuplicateNode(id));
        }
        self.insert(id, node);
        Ok(())
    }

    fn insert(&mut self, id: NodeId, node: Box<dyn Node>) {
        let ports = node.ports();
        let type_name = node.type_name();
        let entry = NodeEntry {
            id,
            type_name,
            inputs: (0..ports.len(PortKind::Input)).map(|_| PortSlot::default()).collect(),
            outputs: (0..ports.len(PortKind::Output)).map(|_| PortSlot::default()).collect(),
            ports,
            node: Arc::new(Mutex::new(node)),
        };

        let index = self.graph.add_node(entry);
        self.node_indices.insert(id, index);
        self.order.push(id);

        tracing::debug!(
            target: TRACING_TARGET,
            node_id = %id,
            node_type = type_name,
            "Node added"
        );
    }

    /// Removes a node after severing all of its links.
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        let index = self
            .node_indices
            .get(&id)
            .copied()
            .ok_or(Error::NodeNotFound(id))?;

        let mut edges: Vec<EdgeIndex> = self
            .graph
            .edges_directed(index, Direction::Outgoing)
            .chain(self.graph.edges_directed(index, Direction::Incoming))
            .map(|edge| edge.id())
            .collect();
        edges.sort();
        edges.dedup();

        for edge in edges {
            self.remove_link(edge);
        }

        self.graph.remove_node(index);
        self.node_indices.remove(&id);
        self.order.retain(|other| *other != id);

        tracing::debug!(target: TRACING_TARGET, node_id = %id, "Node removed");
        Ok(())
    }

    /// Returns whether a node exists.
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.node_indices.contains_key(&id)
    }

    /// Returns all node IDs in insertion order.
    pub fn node_ids(&self) -> &[NodeId] {
        &self.order
    }

    /// Returns the type name of a node.
    pub fn node_type(&self, id: NodeId) -> Option<&'static str> {
        self.entry(id).map(|entry| entry.type_name)
    }

    /// Returns the port layout of a node.
    pub fn ports(&self, id: NodeId) -> Option<&NodePorts> {
        self.entry(id).map(|entry| &entry.ports)
    }

    /// Returns the declaration of a single port.
    pub fn port(&self, port: PortRef) -> Option<&PortSpec> {
        self.ports(port.node)?.get(port.kind, port.index)
    }

    /// Returns whether `a` and `b` could be linked, in either order.
    ///
    /// The producer must face a consumer of its own class, and the
    /// consumer must accept the producer's value type. Nothing is changed.
    pub fn can_connect(&self, a: PortRef, b: PortRef) -> bool {
        self.plan_link(a, b).is_some()
    }

    /// Links two ports given in either order.
    ///
    /// A single-connect endpoint loses its previous link first; a
    /// multi-connect endpoint keeps its links. Returns `false` and changes
    /// nothing when the ports are incompatible. No value is pushed.
    pub fn connect(&mut self, a: PortRef, b: PortRef) -> bool {
        let Some((producer, consumer, link)) = self.plan_link(a, b) else {
            tracing::debug!(
                target: TRACING_TARGET,
                first = %a,
                second = %b,
                "Connection rejected"
            );
            return false;
        };

        let (Some(&from), Some(&to)) = (
            self.node_indices.get(&producer.node),
            self.node_indices.get(&consumer.node),
        ) else {
            return false;
        };

        for port in [producer, consumer] {
            if port.kind.arity() == Arity::Single {
                self.disconnect(port);
            }
        }

        tracing::trace!(
            target: TRACING_TARGET,
            from = %producer,
            to = %consumer,
            conversion = ?link.conversion,
            "Ports connected"
        );

        self.graph.add_edge(from, to, link);
        true
    }

    /// Links data output `output` of `from` to data input `input` of `to`.
    pub fn connect_data(&mut self, from: NodeId, output: usize, to: NodeId, input: usize) -> bool {
        self.connect(PortRef::output(from, output), PortRef::input(to, input))
    }

    /// Links exec output `exec_out` of `from` to exec input `exec_in` of `to`.
    pub fn connect_exec(&mut self, from: NodeId, exec_out: usize, to: NodeId, exec_in: usize) -> bool {
        self.connect(PortRef::exec_out(from, exec_out), PortRef::exec_in(to, exec_in))
    }

    /// Removes every link of a port and returns how many were removed.
    ///
    /// Data inputs that lose their link also lose their held value.
    pub fn disconnect(&mut self, port: PortRef) -> usize {
        let edges: Vec<EdgeIndex> = self
            .port_edges(port)
            .into_iter()
            .map(|(edge, _)| edge)
            .collect();

        for edge in &edges {
            self.remove_link(*edge);
        }
        edges.len()
    }

    /// Removes the link between two ports given in either order.
    pub fn disconnect_link(&mut self, a: PortRef, b: PortRef) -> bool {
        let (producer, consumer) = if a.kind.is_producer() { (a, b) } else { (b, a) };

        let edge = self
            .port_edges(producer)
            .into_iter()
            .find(|(_, other)| *other == consumer)
            .map(|(edge, _)| edge);

        match edge {
            Some(edge) => {
                self.remove_link(edge);
                true
            }
            None => false,
        }
    }

    /// Returns the ports linked to `port`.
    pub fn connections(&self, port: PortRef) -> Vec<PortRef> {
        self.port_edges(port)
            .into_iter()
            .map(|(_, other)| other)
            .collect()
    }

    /// Returns every link in the graph.
    pub fn links(&self) -> Vec<Connection> {
        self.raw_links()
            .map(|(source, target, link)| Connection {
                from: PortRef::new(source.id, link.kind.producer(), link.from_port),
                to: PortRef::new(target.id, link.kind.consumer(), link.to_port),
            })
            .collect()
    }

    /// Returns the value currently held by a data input.
    pub fn input_value(&self, id: NodeId, index: usize) -> Option<Value> {
        self.entry(id)?.inputs.get(index)?.load()
    }

    /// Returns the value last published by a data output.
    pub fn output_value(&self, id: NodeId, index: usize) -> Option<Value> {
        self.entry(id)?.outputs.get(index)?.load()
    }

    /// Returns the property descriptors of a node.
    pub fn properties(&self, id: NodeId) -> Result<Vec<PropertyDescriptor>> {
        self.with_node(id, |node| node.properties())
    }

    /// Reads a property of a node as JSON.
    pub fn property(&self, id: NodeId, name: &str) -> Result<Json> {
        let value = self.with_node(id, |node| {
            let descriptor = find_property(node, name)?;
            let node: &dyn Any = &*node;
            descriptor.get(node).ok_or_else(|| PropertyError::Invalid {
                name: name.to_owned(),
                message: "value is not representable as JSON".to_owned(),
            })
        })??;
        Ok(value)
    }

    /// Validates and writes a property of a node.
    pub fn set_property(&self, id: NodeId, name: &str, value: Json) -> Result<()> {
        self.with_node(id, |node| {
            let descriptor = find_property(node, name)?;
            let node: &mut dyn Any = node;
            descriptor.set(node, value)
        })??;

        tracing::trace!(
            target: TRACING_TARGET,
            node_id = %id,
            property = name,
            "Property updated"
        );
        Ok(())
    }

    /// Copies a subset of nodes into a new graph.
    ///
    /// Every copy gets a fresh ID and the source's property values. A link
    /// is kept only when both of its ends are in the subset.
    pub fn clone_subgraph(&self, ids: &[NodeId], registry: &NodeRegistry) -> Result<Graph> {
        let selected: HashSet<NodeId> = ids.iter().copied().collect();
        if let Some(missing) = selected.iter().find(|id| !self.contains_node(**id)) {
            return Err(Error::NodeNotFound(*missing));
        }

        let mut clone = Graph::with_registry(Arc::clone(&self.types));
        let mut mapping = HashMap::with_capacity(selected.len());

        for entry in self.entries().filter(|entry| selected.contains(&entry.id)) {
            let mut copy = registry.create(entry.type_name)?;
            {
                let source = entry
                    .node
                    .try_lock()
                    .map_err(|_| Error::NodeBusy(entry.id))?;
                let source: &dyn Any = &**source;
                for descriptor in copy.properties() {
                    if let Some(value) = descriptor.get(source) {
                        let target: &mut dyn Any = &mut *copy;
                        descriptor.set(target, value)?;
                    }
                }
            }
            mapping.insert(entry.id, clone.add_boxed(copy));
        }

        for link in self.links() {
            let (Some(&from), Some(&to)) = (mapping.get(&link.from.node), mapping.get(&link.to.node)) else {
                continue;
            };

            let from = PortRef { node: from, ..link.from };
            let to = PortRef { node: to, ..link.to };
            if !clone.connect(from, to) {
                return Err(Error::Internal(format!(
                    "cloned link {from} -> {to} was rejected"
                )));
            }
        }

        tracing::debug!(
            target: TRACING_TARGET,
            nodes = clone.node_count(),
            links = clone.link_count(),
            "Subgraph cloned"
        );
        Ok(clone)
    }

    /// Builds an executor over a snapshot of the current structure.
    pub fn create_executor(&self) -> GraphExecutor {
        self.create_executor_with(EngineConfig::default())
    }

    /// Builds an executor with an explicit engine configuration.
    pub fn create_executor_with(&self, config: EngineConfig) -> GraphExecutor {
        GraphExecutor::new(ExecutionPlan::new(self), config)
    }

    pub(crate) fn entry(&self, id: NodeId) -> Option<&NodeEntry> {
        let index = self.node_indices.get(&id)?;
        self.graph.node_weight(*index)
    }

    /// Iterates node entries in insertion order.
    pub(crate) fn entries(&self) -> impl Iterator<Item = &NodeEntry> + '_ {
        self.order.iter().filter_map(|id| self.entry(*id))
    }

    pub(crate) fn raw_links(&self) -> impl Iterator<Item = (&NodeEntry, &NodeEntry, &Link)> + '_ {
        self.graph.edge_references().filter_map(|edge| {
            let source = self.graph.node_weight(edge.source())?;
            let target = self.graph.node_weight(edge.target())?;
            Some((source, target, edge.weight()))
        })
    }

    pub(crate) fn assign_port_id(&mut self, id: NodeId, kind: PortKind, index: usize, port_id: PortId) -> bool {
        let Some(&node_index) = self.node_indices.get(&id) else {
            return false;
        };
        self.graph
            .node_weight_mut(node_index)
            .is_some_and(|entry| entry.ports.set_id(kind, index, port_id))
    }

    fn with_node<R>(&self, id: NodeId, f: impl FnOnce(&mut dyn Node) -> R) -> Result<R> {
        let entry = self.entry(id).ok_or(Error::NodeNotFound(id))?;
        let mut guard = entry.node.try_lock().map_err(|_| Error::NodeBusy(id))?;
        Ok(f(&mut **guard))
    }

    /// Validates a link and resolves its conversion without touching state.
    fn plan_link(&self, a: PortRef, b: PortRef) -> Option<(PortRef, PortRef, Link)> {
        let (producer, consumer) = if a.kind.is_producer() { (a, b) } else { (b, a) };
        if !producer.kind.is_producer() || consumer.kind != producer.kind.counterpart() {
            return None;
        }

        let source = self.port(producer)?;
        let target = self.port(consumer)?;

        let (kind, conversion) = if producer.kind.is_exec() {
            (LinkKind::Exec, Conversion::Identity)
        } else {
            let conversion = self.types.resolve(source.value_type?, target.value_type?)?;
            (LinkKind::Data, conversion)
        };

        let link = Link {
            kind,
            from_port: producer.index,
            to_port: consumer.index,
            conversion,
        };
        Some((producer, consumer, link))
    }

    /// Lists the links touching `port` with the port at their other end.
    fn port_edges(&self, port: PortRef) -> Vec<(EdgeIndex, PortRef)> {
        let Some(&index) = self.node_indices.get(&port.node) else {
            return Vec::new();
        };

        let producer = port.kind.is_producer();
        let direction = if producer {
            Direction::Outgoing
        } else {
            Direction::Incoming
        };

        self.graph
            .edges_directed(index, direction)
            .filter_map(|edge| {
                let link = edge.weight();
                if producer {
                    if !link.starts_at(port.kind, port.index) {
                        return None;
                    }
                    let target = self.graph.node_weight(edge.target())?;
                    Some((edge.id(), PortRef::new(target.id, link.kind.consumer(), link.to_port)))
                } else {
                    if !link.ends_at(port.kind, port.index) {
                        return None;
                    }
                    let source = self.graph.node_weight(edge.source())?;
                    Some((edge.id(), PortRef::new(source.id, link.kind.producer(), link.from_port)))
                }
            })
            .collect()
    }

    fn remove_link(&mut self, edge: EdgeIndex) {
        let Some((_, target)) = self.graph.edge_endpoints(edge) else {
            return;
        };
        let Some(link) = self.graph.remove_edge(edge) else {
            return;
        };

        if link.kind == LinkKind::Data {
            if let Some(slot) = self
                .graph
                .node_weight(target)
                .and_then(|entry| entry.inputs.get(link.to_port))
            {
                slot.clear();
            }
        }
    }
}

fn find_property(node: &dyn Node, name: &str) -> std::result::Result<PropertyDescriptor, PropertyError> {
    node.properties()
        .into_iter()
        .find(|descriptor| descriptor.name() == name)
        .ok_or_else(|| PropertyError::Unknown(name.to_owned()))
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("nodes", &self.node_count())
            .field("links", &self.link_count())
            .field("metadata", &self.metadata)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use nodeflow_core::ValueType;
    use serde_json::json;

    use super::*;
    use crate::error::NodeResult;
    use crate::node::{Constraint, ExecContext, PropertyKind};

    #[derive(Default)]
    struct Emit {
        value: i64,
    }

    #[async_trait]
    impl Node for Emit {
        fn type_name(&self) -> &'static str {
            "emit"
        }

        fn ports(&self) -> NodePorts {
            NodePorts::new().output::<i64>("value")
        }

        fn properties(&self) -> Vec<PropertyDescriptor> {
            vec![
                PropertyDescriptor::new(
                    "value",
                    PropertyKind::Integer,
                    |n: &Self| n.value,
                    |n: &mut Self, v: i64| n.value = v,
                )
                .with_constraint(Constraint::Range {
                    min: -100.0,
                    max: 100.0,
                }),
            ]
        }

        async fn execute(&mut self, ctx: &mut ExecContext) -> NodeResult<()> {
            ctx.set_output(0, self.value)
        }
    }

    struct Sink(ValueType);

    #[async_trait]
    impl Node for Sink {
        fn type_name(&self) -> &'static str {
            "sink"
        }

        fn ports(&self) -> NodePorts {
            NodePorts::new()
                .exec_in("exec")
                .input_of("value", self.0)
                .exec_out("then")
        }

        async fn execute(&mut self, _ctx: &mut ExecContext) -> NodeResult<()> {
            Ok(())
        }
    }

    struct Pair;

    #[async_trait]
    impl Node for Pair {
        fn type_name(&self) -> &'static str {
            "pair"
        }

        fn ports(&self) -> NodePorts {
            NodePorts::new()
                .input::<i64>("a")
                .input::<i64>("b")
                .output::<i64>("first")
                .output::<i64>("second")
        }

        async fn execute(&mut self, _ctx: &mut ExecContext) -> NodeResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_node_ids_keep_insertion_order() {
        let mut graph = Graph::new();
        let a = graph.add_node(Emit::default());
        let b = graph.add_node(Emit::default());
        let c = graph.add_node(Emit::default());
        graph.remove_node(b).unwrap();

        assert_eq!(graph.node_ids(), &[a, c]);
        assert_eq!(graph.node_type(a), Some("emit"));
        assert!(matches!(graph.remove_node(b), Err(Error::NodeNotFound(_))));
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let mut graph = Graph::new();
        let id = NodeId::new();
        graph.add_node_with_id(id, Box::new(Emit::default())).unwrap();

        let err = graph
            .add_node_with_id(id, Box::new(Emit::default()))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateNode(dup) if dup == id));
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn test_connect_accepts_either_order() {
        let mut graph = Graph::new();
        let emit = graph.add_node(Emit::default());
        let sink = graph.add_node(Sink(ValueType::of::<i64>()));

        assert!(graph.connect(PortRef::input(sink, 0), PortRef::output(emit, 0)));
        assert_eq!(
            graph.connections(PortRef::output(emit, 0)),
            vec![PortRef::input(sink, 0)]
        );
    }

    #[test]
    fn test_kind_mismatch_is_rejected() {
        let mut graph = Graph::new();
        let emit = graph.add_node(Emit::default());
        let sink = graph.add_node(Sink(ValueType::of::<i64>()));

        assert!(!graph.can_connect(PortRef::output(emit, 0), PortRef::exec_in(sink, 0)));
        assert!(!graph.can_connect(PortRef::input(sink, 0), PortRef::input(sink, 0)));
        assert!(!graph.can_connect(PortRef::output(emit, 3), PortRef::input(sink, 0)));
        assert!(!graph.connect(PortRef::exec_out(sink, 0), PortRef::input(sink, 0)));
        assert_eq!(graph.link_count(), 0);
    }

    #[test]
    fn test_disconnect_clears_input_value() {
        let mut graph = Graph::new();
        let emit = graph.add_node(Emit::default());
        let sink = graph.add_node(Sink(ValueType::of::<i64>()));
        assert!(graph.connect_data(emit, 0, sink, 0));

        graph.entry(sink).unwrap().inputs[0].store(Value::from(1_i64));
        assert!(graph.input_value(sink, 0).is_some());

        assert_eq!(graph.disconnect(PortRef::input(sink, 0)), 1);
        assert!(graph.input_value(sink, 0).is_none());
        assert_eq!(graph.link_count(), 0);
    }

    #[test]
    fn test_input_slots_are_independent() {
        let mut graph = Graph::new();
        let left = graph.add_node(Emit::default());
        let right = graph.add_node(Emit::default());
        let pair = graph.add_node(Pair);
        assert!(graph.connect_data(left, 0, pair, 0));
        assert!(graph.connect_data(right, 0, pair, 1));

        let entry = graph.entry(pair).unwrap();
        entry.inputs[0].store(Value::from(2_i64));
        entry.inputs[1].store(Value::from(40_i64));
        assert_eq!(graph.input_value(pair, 0).unwrap().get::<i64>().unwrap(), 2);
        assert_eq!(graph.input_value(pair, 1).unwrap().get::<i64>().unwrap(), 40);

        assert_eq!(graph.disconnect(PortRef::input(pair, 0)), 1);
        assert!(graph.input_value(pair, 0).is_none());
        assert_eq!(graph.input_value(pair, 1).unwrap().get::<i64>().unwrap(), 40);
        assert!(graph.output_value(pair, 0).is_none());
    }

    #[test]
    fn test_exec_self_loop_is_allowed_and_removed_with_node() {
        let mut graph = Graph::new();
        let sink = graph.add_node(Sink(ValueType::dynamic()));

        assert!(graph.connect_exec(sink, 0, sink, 0));
        assert_eq!(graph.link_count(), 1);

        graph.remove_node(sink).unwrap();
        assert!(graph.is_empty());
        assert_eq!(graph.link_count(), 0);
    }

    #[test]
    fn test_property_access() {
        let mut graph = Graph::new();
        let emit = graph.add_node(Emit::default());

        graph.set_property(emit, "value", json!(12)).unwrap();
        assert_eq!(graph.property(emit, "value").unwrap(), json!(12));

        assert!(matches!(
            graph.set_property(emit, "value", json!(1000)),
            Err(Error::Property(PropertyError::OutOfRange { .. }))
        ));
        assert!(matches!(
            graph.property(emit, "missing"),
            Err(Error::Property(PropertyError::Unknown(_)))
        ));
        assert_eq!(graph.property(emit, "value").unwrap(), json!(12));
    }
}

//! Conversion between [`Graph`] and [`GraphDocument`].

use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet};

use nodeflow_core::{NodeId, PortId};

use super::TRACING_TARGET;
use super::document::{ConnectionDocument, DOCUMENT_VERSION, GraphDocument, NodeDocument, PortDocument};
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::node::NodeRegistry;
use crate::port::{PortKind, PortRef};

impl Graph {
    /// Captures the graph as a serializable document.
    ///
    /// Fails with [`Error::NodeBusy`] if a node is executing.
    pub fn to_document(&self) -> Result<GraphDocument> {
        let mut nodes = Vec::with_capacity(self.node_count());
        for entry in self.entries() {
            let properties = {
                let node = entry.node.try_lock().map_err(|_| Error::NodeBusy(entry.id))?;
                let source: &dyn Any = &**node;
                node.properties()
                    .into_iter()
                    .filter_map(|descriptor| {
                        let value = descriptor.get(source)?;
                        Some((descriptor.name().to_owned(), value))
                    })
                    .collect::<BTreeMap<_, _>>()
            };

            let ports = entry
                .ports
                .iter()
                .map(|(kind, index, spec)| PortDocument {
                    id: spec.id,
                    kind,
                    index,
                    name: spec.name.clone(),
                    value_type: spec.value_type.map(|ty| ty.name().to_owned()),
                })
                .collect();

            nodes.push(NodeDocument {
                id: entry.id,
                type_name: entry.type_name.to_owned(),
                properties,
                ports,
            });
        }

        let connections = self
            .raw_links()
            .filter_map(|(source, target, link)| {
                let source_port = source.ports.get(link.kind.producer(), link.from_port)?;
                let target_port = target.ports.get(link.kind.consumer(), link.to_port)?;
                Some(ConnectionDocument {
                    source_node: source.id,
                    source_port: source_port.id,
                    target_node: target.id,
                    target_port: target_port.id,
                })
            })
            .collect();

        Ok(GraphDocument {
            version: DOCUMENT_VERSION,
            metadata: self.metadata.clone(),
            nodes,
            connections,
        })
    }

    /// Rebuilds a graph from a document.
    ///
    /// Nodes are created through `registry` and receive their persisted
    /// properties and port IDs. Links are restored strictly by port ID; any
    /// inconsistency fails the whole load with [`Error::Document`].
    pub fn from_document(document: &GraphDocument, registry: &NodeRegistry) -> Result<Graph> {
        if document.version.major != DOCUMENT_VERSION.major {
            return Err(Error::Document(format!(
                "unsupported document version {} (expected {}.x)",
                document.version, DOCUMENT_VERSION.major
            )));
        }

        let mut graph = Graph::new();
        graph.metadata = document.metadata.clone();

        let mut owners: HashMap<PortId, PortRef> = HashMap::new();
        for node_document in &document.nodes {
            restore_node(&mut graph, node_document, registry, &mut owners)?;
        }

        for connection in &document.connections {
            let source = resolve_port(&owners, connection.source_port, connection.source_node)?;
            let target = resolve_port(&owners, connection.target_port, connection.target_node)?;
            if !source.kind.is_producer() || !graph.connect(source, target) {
                return Err(Error::Document(format!(
                    "incompatible connection {source} -> {target}"
                )));
            }
        }

        tracing::debug!(
            target: TRACING_TARGET,
            nodes = graph.node_count(),
            links = graph.link_count(),
            "Graph loaded from document"
        );
        Ok(graph)
    }
}

fn restore_node(
    graph: &mut Graph,
    document: &NodeDocument,
    registry: &NodeRegistry,
    owners: &mut HashMap<PortId, PortRef>,
) -> Result<()> {
    let mut node = registry.create(&document.type_name).map_err(|_| {
        Error::Document(format!(
            "node {} has unknown type '{}'",
            document.id, document.type_name
        ))
    })?;

    let descriptors = node.properties();
    for (name, value) in &document.properties {
        let descriptor = descriptors
            .iter()
            .find(|descriptor| descriptor.name() == name)
            .ok_or_else(|| {
                Error::Document(format!("node {} has unknown property '{name}'", document.id))
            })?;
        let target: &mut dyn Any = &mut *node;
        descriptor
            .set(target, value.clone())
            .map_err(|err| Error::Document(format!("node {}: {err}", document.id)))?;
    }

    graph
        .add_node_with_id(document.id, node)
        .map_err(|_| Error::Document(format!("duplicate node id {}", document.id)))?;

    let Some(layout) = graph.ports(document.id).cloned() else {
        return Err(Error::Internal(format!("node {} vanished", document.id)));
    };

    for kind in [PortKind::Input, PortKind::Output, PortKind::ExecIn, PortKind::ExecOut] {
        let persisted = document.ports.iter().filter(|port| port.kind == kind).count();
        if persisted != layout.len(kind) {
            return Err(Error::Document(format!(
                "node {} declares {} {kind} port(s) but the document lists {persisted}",
                document.id,
                layout.len(kind)
            )));
        }
    }

    let mut seen = HashSet::new();
    for port in &document.ports {
        if !seen.insert((port.kind, port.index)) {
            return Err(Error::Document(format!(
                "node {} lists {} port {} twice",
                document.id, port.kind, port.index
            )));
        }

        let spec = layout.get(port.kind, port.index).ok_or_else(|| {
            Error::Document(format!(
                "node {} has no {} port {}",
                document.id, port.kind, port.index
            ))
        })?;

        let declared = spec.value_type.map(|ty| ty.name());
        if declared != port.value_type.as_deref() {
            return Err(Error::Document(format!(
                "node {} {} port {} carries {} but the document says {}",
                document.id,
                port.kind,
                port.index,
                declared.unwrap_or("exec"),
                port.value_type.as_deref().unwrap_or("exec"),
            )));
        }

        let port_ref = PortRef::new(document.id, port.kind, port.index);
        if owners.insert(port.id, port_ref).is_some() {
            return Err(Error::Document(format!("duplicate port id {}", port.id)));
        }
        graph.assign_port_id(document.id, port.kind, port.index, port.id);
    }

    Ok(())
}

fn resolve_port(
    owners: &HashMap<PortId, PortRef>,
    port_id: PortId,
    node_id: NodeId,
) -> Result<PortRef> {
    let port = owners
        .get(&port_id)
        .copied()
        .ok_or_else(|| Error::Document(format!("unknown port id {port_id}")))?;
    if port.node != node_id {
        return Err(Error::Document(format!(
            "port {port_id} does not belong to node {node_id}"
        )));
    }
    Ok(port)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::definition::GraphMetadata;
    use crate::error::NodeResult;
    use crate::node::{ExecContext, Node, PropertyDescriptor, PropertyKind};
    use crate::port::NodePorts;

    #[derive(Default)]
    struct Gain {
        factor: f64,
    }

    #[async_trait]
    impl Node for Gain {
        fn type_name(&self) -> &'static str {
            "gain"
        }

        fn ports(&self) -> NodePorts {
            NodePorts::new().input::<f64>("in").output::<f64>("out")
        }

        fn properties(&self) -> Vec<PropertyDescriptor> {
            vec![PropertyDescriptor::new(
                "factor",
                PropertyKind::Float,
                |n: &Self| n.factor,
                |n: &mut Self, v: f64| n.factor = v,
            )]
        }

        async fn execute(&mut self, ctx: &mut ExecContext) -> NodeResult<()> {
            let value = ctx.require::<f64>(0)?;
            ctx.set_output(0, value * self.factor)
        }
    }

    fn registry() -> NodeRegistry {
        let mut registry = NodeRegistry::new();
        registry.register::<Gain>();
        registry
    }

    #[test]
    fn test_round_trip_preserves_ids_properties_and_links() {
        let mut graph = Graph::new();
        graph.metadata = GraphMetadata::new().with_name("chain");
        let a = graph.add_node(Gain { factor: 2.0 });
        let b = graph.add_node(Gain { factor: 0.5 });
        assert!(graph.connect_data(a, 0, b, 0));

        let document = graph.to_document().unwrap();
        let json = document.to_json_pretty().unwrap();
        let parsed = GraphDocument::from_json(&json).unwrap();
        let restored = Graph::from_document(&parsed, &registry()).unwrap();

        assert_eq!(restored.node_ids(), &[a, b]);
        assert_eq!(restored.property(b, "factor").unwrap(), json!(0.5));
        assert_eq!(restored.links(), graph.links());
        assert_eq!(restored.ports(a), graph.ports(a));
        assert_eq!(restored.metadata.name.as_deref(), Some("chain"));
        assert_eq!(restored.to_document().unwrap(), document);
    }

    #[test]
    fn test_unknown_type_fails() {
        let mut graph = Graph::new();
        graph.add_node(Gain::default());
        let document = graph.to_document().unwrap();

        let err = Graph::from_document(&document, &NodeRegistry::new()).unwrap_err();
        assert!(matches!(err, Error::Document(message) if message.contains("unknown type")));
    }

    #[test]
    fn test_newer_major_version_fails() {
        let mut document = Graph::new().to_document().unwrap();
        document.version = semver::Version::new(2, 0, 0);

        assert!(matches!(
            Graph::from_document(&document, &registry()),
            Err(Error::Document(_))
        ));
    }

    #[test]
    fn test_port_layout_mismatch_fails() {
        let mut graph = Graph::new();
        graph.add_node(Gain::default());
        let mut document = graph.to_document().unwrap();
        document.nodes[0].ports.pop();

        assert!(matches!(
            Graph::from_document(&document, &registry()),
            Err(Error::Document(message)) if message.contains("port")
        ));
    }
}

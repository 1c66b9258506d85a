//! Subgraph cloning and document persistence.

use nodeflow_runtime::prelude::*;
use nodeflow_test::{Add, Constant, Probe, fixtures_registry};
use serde_json::json;

fn arithmetic_graph() -> (Graph, NodeId, NodeId, NodeId) {
    let mut graph = Graph::new();
    let a = graph.add_node(Constant::new(2_i64));
    let b = graph.add_node(Constant::new(40_i64));
    let add = graph.add_node(Add);
    assert!(graph.connect_data(a, 0, add, 0));
    assert!(graph.connect_data(b, 0, add, 1));
    (graph, a, b, add)
}

#[tokio::test]
async fn test_clone_subgraph_keeps_internal_links_only() {
    let mut graph = Graph::new();
    let a = graph.add_node(Constant::new(2_i64));
    let b = graph.add_node(Add);
    let c = graph.add_node(Probe::<i64>::new());
    assert!(graph.connect_data(a, 0, b, 0));
    assert!(graph.connect_data(a, 0, b, 1));
    assert!(graph.connect_data(b, 0, c, 0));

    let clone = graph.clone_subgraph(&[a, b], &fixtures_registry()).unwrap();

    assert_eq!(clone.node_count(), 2);
    assert_eq!(clone.link_count(), 2);
    assert!(!clone.contains_node(a));
    assert!(!clone.contains_node(b));

    let ids = clone.node_ids().to_vec();
    let (a_copy, b_copy) = (ids[0], ids[1]);
    assert_eq!(clone.node_type(a_copy), Some("constant_i64"));
    assert_eq!(clone.property(a_copy, "value").unwrap(), json!(2));
    assert_eq!(
        clone.connections(PortRef::input(b_copy, 0)),
        vec![PortRef::output(a_copy, 0)]
    );
    assert_eq!(
        clone.connections(PortRef::input(b_copy, 1)),
        vec![PortRef::output(a_copy, 0)]
    );
    assert!(clone.connections(PortRef::output(b_copy, 0)).is_empty());
    assert_eq!(graph.node_count(), 3);
    assert_eq!(graph.link_count(), 3);

    graph
        .create_executor()
        .execute(ExecuteOptions::new())
        .await
        .unwrap();
    clone
        .create_executor()
        .execute(ExecuteOptions::new())
        .await
        .unwrap();

    assert_eq!(graph.output_value(b, 0).unwrap().get::<i64>(), Ok(4));
    assert_eq!(clone.output_value(b_copy, 0).unwrap().get::<i64>(), Ok(4));
}

#[test]
fn test_clone_subgraph_rejects_unknown_nodes() {
    let (graph, ..) = arithmetic_graph();

    let result = graph.clone_subgraph(&[NodeId::new()], &fixtures_registry());
    assert!(matches!(result, Err(Error::NodeNotFound(_))));
}

#[test]
fn test_clone_subgraph_needs_registered_types() {
    let mut graph = Graph::new();
    let probe = graph.add_node(Probe::<i64>::new());

    let result = graph.clone_subgraph(&[probe], &fixtures_registry());
    assert!(matches!(result, Err(Error::UnknownNodeType(name)) if name == "probe"));
}

#[tokio::test]
async fn test_document_round_trip_runs_identically() {
    let (mut graph, _, b, add) = arithmetic_graph();
    graph.metadata = GraphMetadata::new().with_name("answer");
    graph.set_property(b, "value", json!(40)).unwrap();

    let json = graph.to_document().unwrap().to_json_pretty().unwrap();
    let restored =
        Graph::from_document(&GraphDocument::from_json(&json).unwrap(), &fixtures_registry())
            .unwrap();

    assert_eq!(restored.node_ids(), graph.node_ids());
    assert_eq!(restored.links(), graph.links());
    assert_eq!(restored.metadata.name.as_deref(), Some("answer"));

    restored
        .create_executor()
        .execute(ExecuteOptions::new())
        .await
        .unwrap();
    assert_eq!(restored.output_value(add, 0).unwrap().get::<i64>(), Ok(42));
}

#[test]
fn test_document_keeps_control_flow_links() {
    let mut graph = Graph::new();
    let start = graph.add_node(Start);
    let looping = graph.add_node(ForLoop::new(3));
    let sequence = graph.add_node(Sequence);
    assert!(graph.connect_exec(start, 0, looping, 0));
    assert!(graph.connect_exec(looping, 0, sequence, 0));
    assert!(graph.connect_exec(sequence, 1, looping, 0));

    let document = graph.to_document().unwrap();
    let restored = Graph::from_document(&document, &fixtures_registry()).unwrap();

    assert_eq!(restored.links(), graph.links());
    assert_eq!(restored.property(looping, "count").unwrap(), json!(3));
}

#[test]
fn test_unknown_port_id_fails_loading() {
    let (graph, ..) = arithmetic_graph();
    let mut document = graph.to_document().unwrap();
    document.connections[0].target_port = PortId::new();

    let result = Graph::from_document(&document, &fixtures_registry());
    assert!(matches!(result, Err(Error::Document(message)) if message.contains("unknown port")));
}

#[test]
fn test_port_of_another_node_fails_loading() {
    let (graph, a, b, _) = arithmetic_graph();
    let mut document = graph.to_document().unwrap();
    let connection = document
        .connections
        .iter_mut()
        .find(|connection| connection.source_node == a)
        .unwrap();
    connection.source_node = b;

    assert!(matches!(
        Graph::from_document(&document, &fixtures_registry()),
        Err(Error::Document(_))
    ));
}

#[test]
fn test_invalid_property_fails_loading() {
    let (graph, ..) = arithmetic_graph();
    let mut document = graph.to_document().unwrap();
    document.nodes[0]
        .properties
        .insert("value".to_owned(), json!("not a number"));

    assert!(matches!(
        Graph::from_document(&document, &fixtures_registry()),
        Err(Error::Document(_))
    ));
}

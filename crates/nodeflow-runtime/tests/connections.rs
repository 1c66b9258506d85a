//! Connection contract: compatibility, replacement and severing.

use nodeflow_runtime::prelude::*;
use nodeflow_test::{Add, Constant, ExecProbe, Probe};

#[tokio::test]
async fn test_single_input_keeps_only_latest_link() {
    let mut graph = Graph::new();
    let first = graph.add_node(Constant::new(1_i64));
    let second = graph.add_node(Constant::new(2_i64));
    let probe = Probe::<i64>::new();
    let sink = graph.add_node(probe.clone());

    assert!(graph.connect_data(first, 0, sink, 0));
    assert!(graph.connect_data(second, 0, sink, 0));

    assert_eq!(graph.link_count(), 1);
    assert_eq!(
        graph.connections(PortRef::input(sink, 0)),
        vec![PortRef::output(second, 0)]
    );
    assert!(graph.connections(PortRef::output(first, 0)).is_empty());

    graph
        .create_executor()
        .execute(ExecuteOptions::new())
        .await
        .unwrap();
    assert_eq!(probe.values(), vec![2]);
}

#[tokio::test]
async fn test_each_input_keeps_its_own_value() {
    let mut graph = Graph::new();
    let two = graph.add_node(Constant::new(2_i64));
    let forty = graph.add_node(Constant::new(40_i64));
    let add = graph.add_node(Add);
    assert!(graph.connect_data(two, 0, add, 0));
    assert!(graph.connect_data(forty, 0, add, 1));

    graph
        .create_executor()
        .execute(ExecuteOptions::new())
        .await
        .unwrap();

    assert_eq!(graph.input_value(add, 0).unwrap().get::<i64>(), Ok(2));
    assert_eq!(graph.input_value(add, 1).unwrap().get::<i64>(), Ok(40));
    assert_eq!(graph.output_value(add, 0).unwrap().get::<i64>(), Ok(42));

    assert_eq!(graph.disconnect(PortRef::input(add, 0)), 1);
    assert!(graph.input_value(add, 0).is_none());
    assert_eq!(graph.input_value(add, 1).unwrap().get::<i64>(), Ok(40));
}

#[test]
fn test_output_fans_out() {
    let mut graph = Graph::new();
    let source = graph.add_node(Constant::new(1_i64));
    let left = graph.add_node(Probe::<i64>::new());
    let right = graph.add_node(Probe::<i64>::new());

    assert!(graph.connect_data(source, 0, left, 0));
    assert!(graph.connect_data(source, 0, right, 0));

    assert_eq!(graph.connections(PortRef::output(source, 0)).len(), 2);
}

#[test]
fn test_ports_may_be_given_in_either_order() {
    let mut graph = Graph::new();
    let source = graph.add_node(Constant::new(1_i64));
    let sink = graph.add_node(Probe::<i64>::new());

    assert!(graph.connect(PortRef::input(sink, 0), PortRef::output(source, 0)));
    assert_eq!(
        graph.links(),
        vec![Connection {
            from: PortRef::output(source, 0),
            to: PortRef::input(sink, 0),
        }]
    );
}

#[test]
fn test_incompatible_connections_change_nothing() {
    let mut graph = Graph::new();
    let number = graph.add_node(Constant::new(1_i64));
    let text = graph.add_node(Constant::new("one".to_owned()));
    let sink = graph.add_node(Probe::<i64>::new());
    let probe = graph.add_node(ExecProbe::new());
    assert!(graph.connect_data(number, 0, sink, 0));

    let before = graph.links();

    assert!(!graph.can_connect(PortRef::output(text, 0), PortRef::input(sink, 0)));
    assert!(!graph.connect_data(text, 0, sink, 0));
    assert!(!graph.connect(PortRef::output(number, 0), PortRef::output(text, 0)));
    assert!(!graph.connect(PortRef::output(number, 0), PortRef::exec_in(probe, 0)));
    assert!(!graph.connect(PortRef::exec_out(probe, 0), PortRef::input(sink, 0)));
    assert!(!graph.connect_data(number, 3, sink, 0));

    assert_eq!(graph.links(), before);
}

#[test]
fn test_can_connect_does_not_mutate() {
    let mut graph = Graph::new();
    let source = graph.add_node(Constant::new(1_i64));
    let sink = graph.add_node(Probe::<i64>::new());

    assert!(graph.can_connect(PortRef::output(source, 0), PortRef::input(sink, 0)));
    assert_eq!(graph.link_count(), 0);
}

#[test]
fn test_exec_output_is_replaced_and_exec_input_fans_in() {
    let mut graph = Graph::new();
    let start = graph.add_node(Start);
    let other = graph.add_node(Start);
    let first = graph.add_node(ExecProbe::new());
    let second = graph.add_node(ExecProbe::new());

    assert!(graph.connect_exec(start, 0, first, 0));
    assert!(graph.connect_exec(start, 0, second, 0));
    assert_eq!(
        graph.connections(PortRef::exec_out(start, 0)),
        vec![PortRef::exec_in(second, 0)]
    );

    assert!(graph.connect_exec(other, 0, second, 0));
    assert_eq!(graph.connections(PortRef::exec_in(second, 0)).len(), 2);
}

#[tokio::test]
async fn test_integer_widens_into_float_input() {
    let mut graph = Graph::new();
    let source = graph.add_node(Constant::new(42_i64));
    let probe = Probe::<f64>::new();
    let sink = graph.add_node(probe.clone());
    assert!(graph.connect_data(source, 0, sink, 0));

    graph
        .create_executor()
        .execute(ExecuteOptions::new())
        .await
        .unwrap();

    assert_eq!(probe.values(), vec![42.0]);
    assert_eq!(graph.input_value(sink, 0).unwrap().get::<f64>(), Ok(42.0));
    assert_eq!(graph.output_value(source, 0).unwrap().get::<i64>(), Ok(42));
}

#[tokio::test]
async fn test_severing_clears_input_value() {
    let mut graph = Graph::new();
    let source = graph.add_node(Constant::new(5_i64));
    let sink = graph.add_node(Probe::<i64>::new());
    assert!(graph.connect_data(source, 0, sink, 0));

    graph
        .create_executor()
        .execute(ExecuteOptions::new())
        .await
        .unwrap();
    assert!(graph.input_value(sink, 0).is_some());

    assert_eq!(graph.disconnect(PortRef::input(sink, 0)), 1);
    assert!(graph.input_value(sink, 0).is_none());
    assert!(graph.output_value(source, 0).is_some());
}

#[test]
fn test_remove_node_severs_links() {
    let mut graph = Graph::new();
    let source = graph.add_node(Constant::new(1_i64));
    let sink = graph.add_node(Probe::<i64>::new());
    assert!(graph.connect_data(source, 0, sink, 0));

    graph.remove_node(source).unwrap();

    assert!(!graph.contains_node(source));
    assert_eq!(graph.node_ids(), &[sink]);
    assert_eq!(graph.link_count(), 0);
    assert!(graph.connections(PortRef::input(sink, 0)).is_empty());
    assert!(matches!(graph.remove_node(source), Err(Error::NodeNotFound(_))));
}

#[test]
fn test_disconnect_link_removes_one_link() {
    let mut graph = Graph::new();
    let source = graph.add_node(Constant::new(1_i64));
    let left = graph.add_node(Probe::<i64>::new());
    let right = graph.add_node(Probe::<i64>::new());
    assert!(graph.connect_data(source, 0, left, 0));
    assert!(graph.connect_data(source, 0, right, 0));

    assert!(graph.disconnect_link(PortRef::input(left, 0), PortRef::output(source, 0)));
    assert!(!graph.disconnect_link(PortRef::output(source, 0), PortRef::input(left, 0)));
    assert_eq!(
        graph.connections(PortRef::output(source, 0)),
        vec![PortRef::input(right, 0)]
    );
}

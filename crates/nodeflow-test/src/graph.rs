//! Prebuilt graphs shared by integration tests.

use nodeflow_runtime::NodeId;
use nodeflow_runtime::graph::Graph;
use nodeflow_runtime::nodes::{ForLoop, Start};

use crate::mock::ExecProbe;

/// `Start -> ForLoop(count)` whose body is an [`ExecProbe`] looping back
/// into the loop, and whose `completed` branch reaches a second probe.
///
/// The loop `index` feeds the body probe's `value` input.
pub struct CountedLoop {
    pub graph: Graph,
    pub start: NodeId,
    pub looping: NodeId,
    pub body_id: NodeId,
    pub done_id: NodeId,
    pub body: ExecProbe,
    pub done: ExecProbe,
}

impl CountedLoop {
    pub fn new(count: i64) -> Self {
        let mut graph = Graph::new();
        let start = graph.add_node(Start);
        let looping = graph.add_node(ForLoop::new(count));
        let body = ExecProbe::new();
        let done = ExecProbe::new();
        let body_id = graph.add_node(body.clone());
        let done_id = graph.add_node(done.clone());

        let linked = graph.connect_exec(start, 0, looping, 0)
            && graph.connect_exec(looping, 0, body_id, 0)
            && graph.connect_exec(body_id, 0, looping, 0)
            && graph.connect_exec(looping, 1, done_id, 0)
            && graph.connect_data(looping, 0, body_id, 0);
        assert!(linked, "counted loop links must be accepted");

        Self {
            graph,
            start,
            looping,
            body_id,
            done_id,
            body,
            done,
        }
    }
}

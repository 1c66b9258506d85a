use std::sync::{Mutex, PoisonError};

use nodeflow_runtime::engine::ExecutionObserver;
use nodeflow_runtime::{NodeError, NodeId};

/// One node lifecycle notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Started(NodeId),
    Finished(NodeId),
    Failed(NodeId, String),
}

/// Observer keeping every notification in arrival order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Event>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded events.
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns how many times `node` was started.
    pub fn started(&self, node: NodeId) -> usize {
        self.count(|event| *event == Event::Started(node))
    }

    /// Returns how many times `node` finished successfully.
    pub fn finished(&self, node: NodeId) -> usize {
        self.count(|event| *event == Event::Finished(node))
    }

    /// Returns every node that reported a failure.
    pub fn failed(&self) -> Vec<NodeId> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Failed(node, _) => Some(node),
                _ => None,
            })
            .collect()
    }

    /// Position of the first start of `node` in the event log.
    pub fn first_start(&self, node: NodeId) -> Option<usize> {
        self.position(|event| *event == Event::Started(node))
    }

    /// Position of the first successful finish of `node` in the event log.
    pub fn first_finish(&self, node: NodeId) -> Option<usize> {
        self.position(|event| *event == Event::Finished(node))
    }

    /// Returns whether `before` finished before `after` was first started.
    pub fn finished_before_start(&self, before: NodeId, after: NodeId) -> bool {
        match (self.first_finish(before), self.first_start(after)) {
            (Some(finished), Some(started)) => finished < started,
            _ => false,
        }
    }

    fn count(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|event| predicate(event))
            .count()
    }

    fn position(&self, predicate: impl Fn(&Event) -> bool) -> Option<usize> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .position(predicate)
    }

    fn record(&self, event: Event) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl ExecutionObserver for RecordingObserver {
    fn on_node_started(&self, node_id: NodeId) {
        self.record(Event::Started(node_id));
    }

    fn on_node_finished(&self, node_id: NodeId) {
        self.record(Event::Finished(node_id));
    }

    fn on_node_failed(&self, node_id: NodeId, error: &NodeError) {
        self.record(Event::Failed(node_id, error.to_string()));
    }
}

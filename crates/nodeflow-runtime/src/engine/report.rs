//! Summary of a completed run.

use std::collections::HashMap;

use jiff::{SignedDuration, Timestamp};
use nodeflow_core::NodeId;

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    /// When the run started.
    pub started_at: Timestamp,
    /// When the run drained.
    pub finished_at: Timestamp,
    /// Number of executions per node; unreached nodes are absent.
    pub runs: HashMap<NodeId, u32>,
}

impl ExecutionReport {
    /// Returns how often a node executed.
    pub fn run_count(&self, node_id: NodeId) -> u32 {
        self.runs.get(&node_id).copied().unwrap_or(0)
    }

    /// Returns whether a node executed at least once.
    pub fn executed(&self, node_id: NodeId) -> bool {
        self.run_count(node_id) > 0
    }

    /// Returns the total number of node executions.
    pub fn total_runs(&self) -> u64 {
        self.runs.values().map(|count| u64::from(*count)).sum()
    }

    /// Returns the wall-clock duration of the run.
    pub fn elapsed(&self) -> SignedDuration {
        self.finished_at.duration_since(self.started_at)
    }
}

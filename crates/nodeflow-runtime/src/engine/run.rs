//! Scheduling loop of one run.
//!
//! The loop owns every counter and set; node tasks only see their own
//! context and the port slots. Plain data nodes start when all of their
//! data predecessors have produced once. Flow-gated nodes start only when
//! a control signal reaches them, after their stale plain ancestors have
//! been recomputed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::task::{Id, JoinError, JoinSet};

use super::TRACING_TARGET;
use super::options::ExecutionObserver;
use super::plan::ExecutionPlan;
use super::task::{TaskOutcome, TaskShared, panic_message, run_node};
use crate::error::{AggregateError, Error, NodeError, NodeFailure, Result};
use crate::node::Triggered;

/// Why a node was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
enum StartReason {
    /// All data predecessors produced.
    Data,
    /// A control signal arrived.
    Flow,
    /// A downstream flow-gated node needs fresh inputs.
    Refresh,
}

#[derive(Debug, Default)]
struct NodeState {
    /// Data predecessors that have not produced yet.
    remaining: usize,
    /// Successors were already credited for this node.
    produced: bool,
    started: bool,
    running: bool,
    /// A control signal arrived and was not served yet.
    flow_ready: bool,
    /// A control signal arrived while the node was running.
    pending_flow: bool,
    started_at: Option<u64>,
    finished_at: Option<u64>,
    runs: u32,
}

pub(crate) struct Run {
    plan: Arc<ExecutionPlan>,
    shared: Arc<TaskShared>,
    observer: Option<Arc<dyn ExecutionObserver>>,
    tasks: JoinSet<TaskOutcome>,
    /// Node position of every task still in the set.
    task_positions: HashMap<Id, usize>,
    state: Vec<NodeState>,
    /// Logical clock ordering starts and finishes.
    clock: u64,
    /// Nodes waiting to start, with the nodes they wait for.
    awaiting: HashMap<usize, HashSet<usize>>,
    failures: Vec<NodeFailure>,
    cancelled: bool,
}

impl Run {
    pub fn new(
        plan: Arc<ExecutionPlan>,
        shared: Arc<TaskShared>,
        observer: Option<Arc<dyn ExecutionObserver>>,
    ) -> Self {
        let state = plan
            .nodes
            .iter()
            .map(|node| NodeState {
                remaining: node.predecessors.len(),
                ..NodeState::default()
            })
            .collect();

        Self {
            plan,
            shared,
            observer,
            tasks: JoinSet::new(),
            task_positions: HashMap::new(),
            state,
            clock: 0,
            awaiting: HashMap::new(),
            failures: Vec::new(),
            cancelled: false,
        }
    }

    /// Drives the run to completion and returns per-node run counts.
    pub async fn drive(mut self) -> Result<Vec<u32>> {
        self.start_initial()?;

        while let Some(joined) = self.tasks.join_next_with_id().await {
            match joined {
                Ok((id, (position, result))) => {
                    self.task_positions.remove(&id);
                    self.complete(position, result);
                }
                Err(error) => self.join_failed(error)?,
            }
        }

        self.finish()
    }

    fn start_initial(&mut self) -> Result<()> {
        let mut started = 0_usize;
        for position in 0..self.plan.len() {
            let node = &self.plan.nodes[position];
            if !node.flow_gated && self.state[position].remaining == 0 && self.start(position, StartReason::Data) {
                started += 1;
            }
        }

        if started == 0 && !self.cancelled {
            let reachable = self
                .plan
                .nodes
                .iter()
                .zip(&self.state)
                .any(|(node, state)| node.flow_gated && state.remaining == 0);
            if !reachable {
                return Err(Error::Unsatisfiable(
                    "every node waits on a data dependency or a control signal".to_owned(),
                ));
            }
        }

        tracing::debug!(target: TRACING_TARGET, started, "Initial nodes started");
        Ok(())
    }

    fn start(&mut self, position: usize, reason: StartReason) -> bool {
        if self.shared.cancel.is_cancelled() {
            self.cancelled = true;
            return false;
        }

        let state = &mut self.state[position];
        if state.running {
            return false;
        }

        self.clock += 1;
        state.started = true;
        state.running = true;
        state.flow_ready = false;
        state.started_at = Some(self.clock);
        state.runs += 1;

        let node = &self.plan.nodes[position];
        tracing::trace!(
            target: TRACING_TARGET,
            node_id = %node.id,
            node_type = node.type_name,
            reason = %reason,
            "Starting node"
        );
        if let Some(observer) = &self.observer {
            observer.on_node_started(node.id);
        }

        let handle = self.tasks.spawn(run_node(
            Arc::clone(&self.plan),
            position,
            Arc::clone(&self.shared),
        ));
        self.task_positions.insert(handle.id(), position);
        true
    }

    /// Records a task that ended without reporting back as a failure of
    /// its node.
    fn join_failed(&mut self, error: JoinError) -> Result<()> {
        let Some(position) = self.task_positions.remove(&error.id()) else {
            return Err(Error::Internal(format!("unknown node task failed to join: {error}")));
        };

        let failure = if error.is_panic() {
            NodeError::Panicked(panic_message(error.into_panic().as_ref()))
        } else {
            NodeError::Failed(format!("node task was aborted: {error}"))
        };
        self.complete(position, Err(failure));
        Ok(())
    }

    fn complete(&mut self, position: usize, result: Result<Triggered, NodeError>) {
        let plan = Arc::clone(&self.plan);
        let node = &plan.nodes[position];
        self.clock += 1;
        self.state[position].running = false;

        let triggered = match result {
            Ok(triggered) => triggered,
            Err(error) => {
                tracing::debug!(
                    target: TRACING_TARGET,
                    node_id = %node.id,
                    node_type = node.type_name,
                    error = %error,
                    "Node failed"
                );
                if let Some(observer) = &self.observer {
                    observer.on_node_failed(node.id, &error);
                }

                let state = &mut self.state[position];
                state.pending_flow = false;
                state.flow_ready = false;
                self.failures.push(NodeFailure {
                    node_id: node.id,
                    type_name: node.type_name,
                    error,
                });
                self.abandon_waiters(position);
                return;
            }
        };

        tracing::trace!(
            target: TRACING_TARGET,
            node_id = %node.id,
            node_type = node.type_name,
            "Node finished"
        );
        if let Some(observer) = &self.observer {
            observer.on_node_finished(node.id);
        }

        let state = &mut self.state[position];
        state.finished_at = Some(self.clock);
        let first_success = !state.produced;
        state.produced = true;

        self.release_waiters(position);

        if first_success {
            for &successor in &node.successors {
                let state = &mut self.state[successor];
                state.remaining = state.remaining.saturating_sub(1);
                if state.remaining == 0 {
                    self.on_data_ready(successor);
                }
            }
        }

        if node.execution_node {
            for (exec_out, targets) in node.exec_targets.iter().enumerate() {
                if triggered.contains(exec_out) {
                    for &target in targets {
                        self.on_flow(target);
                    }
                }
            }
        }

        let state = &mut self.state[position];
        if state.pending_flow {
            state.pending_flow = false;
            self.on_flow(position);
        }
    }

    fn on_data_ready(&mut self, position: usize) {
        let state = &self.state[position];
        if self.plan.nodes[position].flow_gated
            || state.started
            || self.awaiting.contains_key(&position)
        {
            return;
        }
        self.start(position, StartReason::Data);
    }

    fn on_flow(&mut self, position: usize) {
        if self.shared.cancel.is_cancelled() {
            self.cancelled = true;
            return;
        }

        let state = &mut self.state[position];
        state.flow_ready = true;
        if state.running {
            state.pending_flow = true;
            return;
        }
        if self.awaiting.contains_key(&position) {
            return;
        }

        let blockers = self.demand(position);
        if blockers.is_empty() {
            self.awaiting.remove(&position);
            self.start(position, StartReason::Flow);
        } else {
            tracing::trace!(
                target: TRACING_TARGET,
                node_id = %self.plan.nodes[position].id,
                blockers = blockers.len(),
                "Waiting for inputs to refresh"
            );
            self.awaiting.insert(position, blockers);
        }
    }

    /// Refreshes the stale plain ancestors of `position`.
    ///
    /// Returns the predecessors that must finish before `position` may
    /// start. Leaves a placeholder entry for `position` in `awaiting` that
    /// the caller replaces or removes.
    fn demand(&mut self, position: usize) -> HashSet<usize> {
        self.awaiting.insert(position, HashSet::new());

        let plan = Arc::clone(&self.plan);
        let mut blockers = HashSet::new();

        for &predecessor in &plan.nodes[position].predecessors {
            if self.is_demanding(predecessor) {
                continue;
            }
            if self.state[predecessor].running || self.awaiting.contains_key(&predecessor) {
                blockers.insert(predecessor);
                continue;
            }
            if plan.nodes[predecessor].execution_node {
                continue;
            }
            if self.state[predecessor].remaining > 0 {
                if self.will_produce(predecessor, &mut HashSet::new()) {
                    blockers.insert(predecessor);
                }
                continue;
            }

            let upstream = self.demand(predecessor);
            if !upstream.is_empty() {
                self.awaiting.insert(predecessor, upstream);
                blockers.insert(predecessor);
                continue;
            }

            self.awaiting.remove(&predecessor);
            if self.is_stale(predecessor) && self.start(predecessor, StartReason::Refresh) {
                blockers.insert(predecessor);
            }
        }

        blockers
    }

    /// Returns whether `position` is on the current refresh path.
    ///
    /// Only an in-progress `demand` leaves an empty entry in `awaiting`.
    fn is_demanding(&self, position: usize) -> bool {
        self.awaiting.get(&position).is_some_and(HashSet::is_empty)
    }

    /// Returns whether a node that has not produced yet is bound to, because
    /// every input it still lacks is already being produced.
    ///
    /// Inputs that only a node on the refresh path would provide do not
    /// count: that node is about to start and must not wait on itself.
    fn will_produce(&self, position: usize, visited: &mut HashSet<usize>) -> bool {
        if self.is_demanding(position) {
            return false;
        }
        let state = &self.state[position];
        if state.running || self.awaiting.contains_key(&position) {
            return true;
        }
        if state.produced
            || state.started
            || self.plan.nodes[position].flow_gated
            || !visited.insert(position)
        {
            return false;
        }

        self.plan.nodes[position]
            .predecessors
            .iter()
            .filter(|&&p| !self.state[p].produced)
            .all(|&p| self.will_produce(p, visited))
    }

    /// A node is stale when it never ran or an input producer finished
    /// after it last started.
    fn is_stale(&self, position: usize) -> bool {
        let Some(started_at) = self.state[position].started_at else {
            return true;
        };

        self.plan.nodes[position]
            .predecessors
            .iter()
            .any(|&p| self.state[p].finished_at.is_some_and(|finished| finished > started_at))
    }

    fn release_waiters(&mut self, finished: usize) {
        let mut ready: Vec<usize> = self
            .awaiting
            .iter_mut()
            .filter_map(|(&waiter, blockers)| {
                (blockers.remove(&finished) && blockers.is_empty()).then_some(waiter)
            })
            .collect();
        ready.sort_unstable();

        for waiter in ready {
            self.awaiting.remove(&waiter);
            let reason = if self.plan.nodes[waiter].flow_gated {
                StartReason::Flow
            } else {
                StartReason::Refresh
            };
            self.start(waiter, reason);
        }
    }

    fn abandon_waiters(&mut self, failed: usize) {
        let waiters: Vec<usize> = self
            .awaiting
            .iter()
            .filter(|(_, blockers)| blockers.contains(&failed))
            .map(|(&waiter, _)| waiter)
            .collect();

        for waiter in waiters {
            if self.awaiting.remove(&waiter).is_none() {
                continue;
            }
            let state = &mut self.state[waiter];
            state.flow_ready = false;
            state.pending_flow = false;

            tracing::warn!(
                target: TRACING_TARGET,
                node_id = %self.plan.nodes[waiter].id,
                failed_node = %self.plan.nodes[failed].id,
                "Abandoning node after an input failed"
            );
            self.abandon_waiters(waiter);
        }
    }

    fn finish(self) -> Result<Vec<u32>> {
        let cancelled = self.cancelled || self.shared.cancel.is_cancelled();

        for (node, state) in self.plan.nodes.iter().zip(&self.state) {
            if state.flow_ready && !cancelled {
                tracing::warn!(
                    target: TRACING_TARGET,
                    node_id = %node.id,
                    node_type = node.type_name,
                    "Control signal was never served"
                );
            }
        }

        let failures = self.failures;
        tracing::debug!(
            target: TRACING_TARGET,
            failures = failures.len(),
            cancelled,
            "Run drained"
        );

        if !failures.is_empty() {
            return Err(AggregateError {
                failures,
                cancelled,
            }
            .into());
        }
        if cancelled {
            return Err(Error::Cancelled);
        }

        Ok(self.state.iter().map(|state| state.runs).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use tokio::sync::Semaphore;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::graph::Graph;
    use crate::nodes::Sequence;

    fn idle_run(nodes: usize) -> Run {
        let mut graph = Graph::new();
        for _ in 0..nodes {
            graph.add_node(Sequence);
        }

        let shared = TaskShared {
            semaphore: Semaphore::new(1),
            parameters: Arc::default(),
            cancel: CancellationToken::new(),
            node_timeout: None,
        };
        Run::new(Arc::new(ExecutionPlan::new(&graph)), Arc::new(shared), None)
    }

    #[tokio::test]
    async fn test_escaped_panic_is_recorded_and_siblings_drain() {
        let mut run = idle_run(2);
        let sibling_done = Arc::new(AtomicBool::new(false));

        let outcome: TaskOutcome = (0, Ok(Triggered::All));
        let handle = run.tasks.spawn(async move {
            assert_ne!(outcome.0, 0, "escaped");
            outcome
        });
        run.task_positions.insert(handle.id(), 0);
        run.state[0].running = true;

        let done = Arc::clone(&sibling_done);
        let handle = run.tasks.spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            done.store(true, Ordering::SeqCst);
            (1, Ok(Triggered::All))
        });
        run.task_positions.insert(handle.id(), 1);
        run.state[1].running = true;

        let node_id = run.plan.nodes[0].id;
        let Err(Error::Execution(aggregate)) = run.drive().await else {
            panic!("expected the escaped panic to be reported");
        };

        assert!(sibling_done.load(Ordering::SeqCst));
        assert_eq!(aggregate.failures.len(), 1);
        assert!(matches!(
            &aggregate.failure(node_id).unwrap().error,
            NodeError::Panicked(message) if message.contains("escaped")
        ));
    }
}

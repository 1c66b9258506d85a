//! A single node execution: snapshot, compute, publish.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use super::TRACING_TARGET;
use super::options::Parameters;
use super::plan::ExecutionPlan;
use crate::error::{NodeError, NodeResult};
use crate::node::{ExecContext, Triggered};

/// Resources shared by every task of one run.
pub(crate) struct TaskShared {
    pub semaphore: Semaphore,
    pub parameters: Arc<Parameters>,
    pub cancel: CancellationToken,
    pub node_timeout: Option<Duration>,
}

/// Result of one node task, tagged with the node position.
pub(crate) type TaskOutcome = (usize, NodeResult<Triggered>);

/// Runs the node at `position` once and reports the fired exec outputs.
///
/// A panic inside the node is caught and reported as
/// [`NodeError::Panicked`].
pub(crate) async fn run_node(
    plan: Arc<ExecutionPlan>,
    position: usize,
    shared: Arc<TaskShared>,
) -> TaskOutcome {
    let result = AssertUnwindSafe(execute(&plan, position, &shared))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(NodeError::Panicked(panic_message(panic.as_ref()))));
    (position, result)
}

async fn execute(plan: &ExecutionPlan, position: usize, shared: &TaskShared) -> NodeResult<Triggered> {
    let planned = &plan.nodes[position];

    let _permit = shared
        .semaphore
        .acquire()
        .await
        .map_err(|_| NodeError::Cancelled)?;
    let mut node = planned.node.lock().await;

    let mut ctx = ExecContext::new(
        planned.id,
        planned.snapshot(),
        planned.output_types.clone(),
        planned.exec_outputs,
        Arc::clone(&shared.parameters),
        shared.cancel.clone(),
    );

    tracing::trace!(
        target: TRACING_TARGET,
        node_id = %planned.id,
        node_type = planned.type_name,
        "Computing node"
    );

    match shared.node_timeout {
        Some(limit) => tokio::time::timeout(limit, node.execute(&mut ctx))
            .await
            .map_err(|_| NodeError::Timeout(limit))??,
        None => node.execute(&mut ctx).await?,
    }

    let (outputs, triggered) = ctx.into_parts();
    planned.publish(outputs)?;
    Ok(triggered)
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

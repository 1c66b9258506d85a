//! Graph executor.

use std::collections::HashMap;
use std::sync::Arc;

use jiff::Timestamp;
use tokio::sync::{Mutex, Semaphore};

use super::TRACING_TARGET;
use super::config::EngineConfig;
use super::options::ExecuteOptions;
use super::plan::ExecutionPlan;
use super::report::ExecutionReport;
use super::run::Run;
use super::task::TaskShared;
use crate::error::{Error, Result};

/// Runs a graph snapshot with maximal parallelism.
///
/// The executor shares nodes and port values with the graph it was created
/// from, but not its structure: links added afterwards are not seen. Runs
/// on one executor are serialised.
pub struct GraphExecutor {
    plan: Arc<ExecutionPlan>,
    config: EngineConfig,
    run_lock: Mutex<()>,
}

impl GraphExecutor {
    pub(crate) fn new(plan: ExecutionPlan, config: EngineConfig) -> Self {
        Self {
            plan: Arc::new(plan),
            config,
            run_lock: Mutex::new(()),
        }
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the number of nodes in the snapshot.
    pub fn node_count(&self) -> usize {
        self.plan.len()
    }

    /// Executes the graph once.
    ///
    /// Every node is reset, then every immediately startable node is
    /// started. The call returns once nothing is in flight. Node failures
    /// do not stop independent work; they are all returned together as
    /// [`Error::Execution`].
    pub async fn execute(&self, options: ExecuteOptions) -> Result<ExecutionReport> {
        let _guard = self.run_lock.lock().await;

        if options.cancel.is_cancelled() {
            tracing::debug!(target: TRACING_TARGET, "Run cancelled before start");
            return Err(Error::Cancelled);
        }

        let started_at = Timestamp::now();
        tracing::debug!(
            target: TRACING_TARGET,
            nodes = self.plan.len(),
            max_concurrency = self.config.max_concurrency,
            "Starting run"
        );

        if self.plan.is_empty() {
            return Ok(ExecutionReport {
                started_at,
                finished_at: Timestamp::now(),
                runs: HashMap::new(),
            });
        }

        for planned in &self.plan.nodes {
            planned.node.lock().await.reset();
        }

        let shared = Arc::new(TaskShared {
            semaphore: Semaphore::new(self.config.max_concurrency.max(1)),
            parameters: Arc::new(options.parameters),
            cancel: options.cancel,
            node_timeout: self.config.node_timeout,
        });

        let counts = Run::new(Arc::clone(&self.plan), shared, options.observer)
            .drive()
            .await
            .inspect_err(|error| {
                tracing::debug!(target: TRACING_TARGET, error = %error, "Run failed");
            })?;

        let runs = self
            .plan
            .nodes
            .iter()
            .zip(counts)
            .filter(|(_, count)| *count > 0)
            .map(|(planned, count)| (planned.id, count))
            .collect();

        let report = ExecutionReport {
            started_at,
            finished_at: Timestamp::now(),
            runs,
        };

        tracing::info!(
            target: TRACING_TARGET,
            executions = report.total_runs(),
            elapsed = ?report.elapsed(),
            "Run completed"
        );
        Ok(report)
    }
}

impl std::fmt::Debug for GraphExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphExecutor")
            .field("nodes", &self.plan.len())
            .field("config", &self.config)
            .finish()
    }
}

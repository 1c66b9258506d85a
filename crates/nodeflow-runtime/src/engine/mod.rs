//! Graph execution engine.
//!
//! This module provides the runtime for executing graphs:
//! - [`GraphExecutor`]: runs a graph snapshot concurrently
//! - [`EngineConfig`]: concurrency and timeout limits
//! - [`ExecuteOptions`]: per-run parameters, observer and cancellation
//! - [`ExecutionReport`]: per-node run counts and timing

mod config;
mod executor;
mod options;
mod plan;
mod report;
mod run;
mod task;

pub use config::{EngineConfig, EngineConfigBuilder, EngineConfigBuilderError};
pub use executor::GraphExecutor;
pub use options::{ExecuteOptions, ExecutionObserver, Parameters};
pub(crate) use plan::ExecutionPlan;
pub use report::ExecutionReport;

/// Tracing target for graph execution.
pub(crate) const TRACING_TARGET: &str = "nodeflow_runtime::engine";

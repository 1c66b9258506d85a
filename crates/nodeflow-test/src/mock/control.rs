use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use nodeflow_runtime::node::{Constraint, ExecContext, Node, PropertyDescriptor, PropertyKind};
use nodeflow_runtime::port::NodePorts;
use nodeflow_runtime::{NodeError, NodeResult, Value, ValueType};

/// Execution node that logs every run and then fires `then`.
///
/// Its optional dynamic `value` input is recorded alongside the run.
#[derive(Debug, Clone, Default)]
pub struct ExecProbe {
    runs: Arc<Mutex<Vec<Option<Value>>>>,
}

impl ExecProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many times the node ran, across runs of the graph.
    pub fn count(&self) -> usize {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns the recorded `value` input of every run as a `T`.
    pub fn values<T: Any + Clone>(&self) -> Vec<Option<T>> {
        self.runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|value| value.as_ref().and_then(|value| value.get::<T>().ok()))
            .collect()
    }
}

#[async_trait]
impl Node for ExecProbe {
    fn type_name(&self) -> &'static str {
        "exec_probe"
    }

    fn ports(&self) -> NodePorts {
        NodePorts::new()
            .exec_in("exec")
            .input_of("value", ValueType::dynamic())
            .exec_out("then")
    }

    async fn execute(&mut self, ctx: &mut ExecContext) -> NodeResult<()> {
        let value = ctx.input(0).cloned();
        self.runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(value);
        Ok(())
    }
}

/// Plain node that always fails with its `message` property.
#[derive(Debug, Clone)]
pub struct Fail {
    message: String,
}

impl Fail {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Default for Fail {
    fn default() -> Self {
        Self::new("fixture failure")
    }
}

#[async_trait]
impl Node for Fail {
    fn type_name(&self) -> &'static str {
        "fail"
    }

    fn ports(&self) -> NodePorts {
        NodePorts::new()
            .input_of("in", ValueType::dynamic())
            .output::<i64>("value")
    }

    fn properties(&self) -> Vec<PropertyDescriptor> {
        vec![PropertyDescriptor::new(
            "message",
            PropertyKind::String,
            |node: &Self| node.message.clone(),
            |node: &mut Self, message: String| node.message = message,
        )]
    }

    async fn execute(&mut self, _ctx: &mut ExecContext) -> NodeResult<()> {
        Err(NodeError::failed(self.message.clone()))
    }
}

/// Shared counter of nodes computing at the same time.
#[derive(Debug, Clone, Default)]
pub struct Gauge {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the highest number of concurrent holders observed.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Returns the number of current holders.
    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    fn enter(&self) -> GaugeGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        GaugeGuard(self)
    }
}

struct GaugeGuard<'a>(&'a Gauge);

impl Drop for GaugeGuard<'_> {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Plain node that waits `millis` milliseconds, then forwards its input.
///
/// Cancelling the run interrupts the wait with [`NodeError::Cancelled`].
#[derive(Debug, Clone)]
pub struct Sleep {
    millis: u64,
    gauge: Gauge,
}

impl Sleep {
    pub fn new(millis: u64) -> Self {
        Self {
            millis,
            gauge: Gauge::new(),
        }
    }

    /// Reports every execution to `gauge`.
    pub fn with_gauge(mut self, gauge: &Gauge) -> Self {
        self.gauge = gauge.clone();
        self
    }
}

impl Default for Sleep {
    fn default() -> Self {
        Self::new(10)
    }
}

#[async_trait]
impl Node for Sleep {
    fn type_name(&self) -> &'static str {
        "sleep"
    }

    fn ports(&self) -> NodePorts {
        NodePorts::new()
            .input_of("in", ValueType::dynamic())
            .output_of("out", ValueType::dynamic())
    }

    fn properties(&self) -> Vec<PropertyDescriptor> {
        vec![
            PropertyDescriptor::new(
                "millis",
                PropertyKind::Integer,
                |node: &Self| node.millis,
                |node: &mut Self, millis: u64| node.millis = millis,
            )
            .with_constraint(Constraint::at_least(0.0)),
        ]
    }

    async fn execute(&mut self, ctx: &mut ExecContext) -> NodeResult<()> {
        let _guard = self.gauge.enter();

        tokio::select! {
            _ = ctx.cancellation().cancelled() => return Err(NodeError::Cancelled),
            _ = tokio::time::sleep(Duration::from_millis(self.millis)) => {}
        }

        if let Some(value) = ctx.input(0).cloned() {
            ctx.set_output(0, value)?;
        }
        Ok(())
    }
}

use std::any::Any;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use nodeflow_runtime::{NodeResult, Value};
use nodeflow_runtime::node::{ExecContext, Node, PropertyDescriptor, PropertyKind};
use nodeflow_runtime::port::NodePorts;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Value types a [`Constant`] can hold.
pub trait ConstantType:
    Any + Clone + Debug + Default + Send + Sync + Serialize + DeserializeOwned
{
    /// Registered node type name of `Constant<Self>`.
    const TYPE_NAME: &'static str;
    /// Property kind the value is edited as.
    const KIND: PropertyKind;
}

impl ConstantType for i64 {
    const KIND: PropertyKind = PropertyKind::Integer;
    const TYPE_NAME: &'static str = "constant_i64";
}

impl ConstantType for f64 {
    const KIND: PropertyKind = PropertyKind::Float;
    const TYPE_NAME: &'static str = "constant_f64";
}

impl ConstantType for bool {
    const KIND: PropertyKind = PropertyKind::Bool;
    const TYPE_NAME: &'static str = "constant_bool";
}

impl ConstantType for String {
    const KIND: PropertyKind = PropertyKind::String;
    const TYPE_NAME: &'static str = "constant_string";
}

/// Publishes its `value` property on every execution.
#[derive(Debug, Clone, Default)]
pub struct Constant<T> {
    value: T,
}

impl<T: ConstantType> Constant<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }
}

#[async_trait]
impl<T: ConstantType> Node for Constant<T> {
    fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn ports(&self) -> NodePorts {
        NodePorts::new().output::<T>("value")
    }

    fn properties(&self) -> Vec<PropertyDescriptor> {
        vec![PropertyDescriptor::new(
            "value",
            T::KIND,
            |node: &Self| node.value.clone(),
            |node: &mut Self, value: T| node.value = value,
        )]
    }

    async fn execute(&mut self, ctx: &mut ExecContext) -> NodeResult<()> {
        ctx.set_output(0, Value::new(self.value.clone()))
    }
}

/// Plain data sink recording every input it receives.
///
/// Fails with a missing input error when nothing is linked.
#[derive(Debug, Clone)]
pub struct Probe<T> {
    seen: Arc<Mutex<Vec<T>>>,
}

impl<T> Probe<T> {
    pub fn new() -> Self {
        Self {
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns every value received so far, across runs.
    pub fn values(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns how many times the probe executed successfully.
    pub fn count(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl<T> Default for Probe<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Any + Clone + Debug + Send + Sync> Node for Probe<T> {
    fn type_name(&self) -> &'static str {
        "probe"
    }

    fn ports(&self) -> NodePorts {
        NodePorts::new().input::<T>("value")
    }

    async fn execute(&mut self, ctx: &mut ExecContext) -> NodeResult<()> {
        let value = ctx.require::<T>(0)?;
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(value);
        Ok(())
    }
}

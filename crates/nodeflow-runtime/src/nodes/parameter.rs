//! Run parameter source.

use async_trait::async_trait;
use nodeflow_core::{Value, ValueType};
use serde_json::Value as Json;

use crate::error::{NodeError, NodeResult};
use crate::node::{ExecContext, Node, PropertyDescriptor, PropertyKind};
use crate::port::NodePorts;

/// Publishes the run parameter called `name` on its `value` output.
///
/// When the parameter is absent the `default` property is used instead;
/// without a default the node fails.
#[derive(Debug, Clone, Default)]
pub struct Parameter {
    name: String,
    default: Option<Json>,
}

impl Parameter {
    /// Creates a node reading the parameter called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
        }
    }

    /// Sets the value used when the parameter is absent.
    pub fn with_default(mut self, default: Json) -> Self {
        self.default = Some(default);
        self
    }
}

#[async_trait]
impl Node for Parameter {
    fn type_name(&self) -> &'static str {
        "parameter"
    }

    fn ports(&self) -> NodePorts {
        NodePorts::new().output_of("value", ValueType::dynamic())
    }

    fn properties(&self) -> Vec<PropertyDescriptor> {
        vec![
            PropertyDescriptor::new(
                "name",
                PropertyKind::String,
                |node: &Self| node.name.clone(),
                |node: &mut Self, name: String| node.name = name,
            )
            .with_description("Name of the run parameter to read"),
            PropertyDescriptor::new(
                "default",
                PropertyKind::Json,
                |node: &Self| node.default.clone(),
                |node: &mut Self, default: Option<Json>| node.default = default,
            )
            .with_description("Value used when the parameter is not supplied"),
        ]
    }

    async fn execute(&mut self, ctx: &mut ExecContext) -> NodeResult<()> {
        let value = match (ctx.parameter(&self.name), &self.default) {
            (Some(value), _) => value.clone(),
            (None, Some(default)) => Value::from_json(default.clone()),
            (None, None) => return Err(NodeError::MissingParameter(self.name.clone())),
        };
        ctx.set_output(0, value)
    }
}

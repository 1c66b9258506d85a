use async_trait::async_trait;
use nodeflow_runtime::NodeResult;
use nodeflow_runtime::node::{ExecContext, Node, PropertyDescriptor, PropertyKind};
use nodeflow_runtime::port::NodePorts;

/// Sums two integers; an unlinked operand counts as zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct Add;

#[async_trait]
impl Node for Add {
    fn type_name(&self) -> &'static str {
        "add"
    }

    fn ports(&self) -> NodePorts {
        NodePorts::new()
            .input::<i64>("a")
            .input::<i64>("b")
            .output::<i64>("sum")
    }

    async fn execute(&mut self, ctx: &mut ExecContext) -> NodeResult<()> {
        let a = ctx.input_or::<i64>(0, 0)?;
        let b = ctx.input_or::<i64>(1, 0)?;
        ctx.set_output(0, a + b)
    }
}

/// Multiplies a float by its `factor` property.
#[derive(Debug, Clone, Copy)]
pub struct Scale {
    factor: f64,
}

impl Scale {
    pub fn new(factor: f64) -> Self {
        Self { factor }
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[async_trait]
impl Node for Scale {
    fn type_name(&self) -> &'static str {
        "scale"
    }

    fn ports(&self) -> NodePorts {
        NodePorts::new().input::<f64>("value").output::<f64>("scaled")
    }

    fn properties(&self) -> Vec<PropertyDescriptor> {
        vec![PropertyDescriptor::new(
            "factor",
            PropertyKind::Float,
            |node: &Self| node.factor,
            |node: &mut Self, factor: f64| node.factor = factor,
        )]
    }

    async fn execute(&mut self, ctx: &mut ExecContext) -> NodeResult<()> {
        let value = ctx.require::<f64>(0)?;
        ctx.set_output(0, value * self.factor)
    }
}

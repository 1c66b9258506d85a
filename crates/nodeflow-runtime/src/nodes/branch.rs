//! Two-way conditional.

use async_trait::async_trait;

use crate::error::NodeResult;
use crate::node::{ExecContext, Node};
use crate::port::NodePorts;

const TRUE: usize = 0;
const FALSE: usize = 1;

/// Fires `true` or `false` depending on its `condition` input.
///
/// A missing condition fails the node.
#[derive(Debug, Clone, Copy, Default)]
pub struct Branch;

#[async_trait]
impl Node for Branch {
    fn type_name(&self) -> &'static str {
        "branch"
    }

    fn ports(&self) -> NodePorts {
        NodePorts::new()
            .exec_in("exec")
            .input::<bool>("condition")
            .exec_out("true")
            .exec_out("false")
    }

    async fn execute(&mut self, ctx: &mut ExecContext) -> NodeResult<()> {
        let condition = ctx.require::<bool>(0)?;
        ctx.trigger(if condition { TRUE } else { FALSE })
    }
}

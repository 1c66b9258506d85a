//! Entry point of control flow.

use async_trait::async_trait;

use crate::error::NodeResult;
use crate::node::{ExecContext, Node};
use crate::port::NodePorts;

/// Fires its single exec output as soon as the run starts.
#[derive(Debug, Clone, Copy, Default)]
pub struct Start;

#[async_trait]
impl Node for Start {
    fn type_name(&self) -> &'static str {
        "start"
    }

    fn ports(&self) -> NodePorts {
        NodePorts::new().exec_out("then")
    }

    async fn execute(&mut self, _ctx: &mut ExecContext) -> NodeResult<()> {
        Ok(())
    }
}

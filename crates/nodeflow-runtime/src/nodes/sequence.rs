//! Fan-out of control flow.

use async_trait::async_trait;

use crate::error::NodeResult;
use crate::node::{ExecContext, Node};
use crate::port::NodePorts;

/// Fires both exec outputs each time control reaches it.
///
/// The two downstream chains are started together and run concurrently.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sequence;

#[async_trait]
impl Node for Sequence {
    fn type_name(&self) -> &'static str {
        "sequence"
    }

    fn ports(&self) -> NodePorts {
        NodePorts::new()
            .exec_in("exec")
            .exec_out("first")
            .exec_out("then")
    }

    async fn execute(&mut self, _ctx: &mut ExecContext) -> NodeResult<()> {
        Ok(())
    }
}

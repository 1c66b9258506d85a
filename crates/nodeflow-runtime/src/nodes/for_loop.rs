//! Counted loop over an exec cycle.

use async_trait::async_trait;

use crate::error::NodeResult;
use crate::node::{Constraint, ExecContext, Node, PropertyDescriptor, PropertyKind};
use crate::port::NodePorts;

const BODY: usize = 0;
const COMPLETED: usize = 1;

/// Runs its `body` branch `count` times, then fires `completed` once.
///
/// The body's last node links its exec output back to the loop's exec
/// input; each re-entry publishes the next `index` and fires `body` again
/// until the count is reached.
#[derive(Debug, Clone, Default)]
pub struct ForLoop {
    count: i64,
    next: i64,
}

impl ForLoop {
    /// Creates a loop running `count` iterations.
    pub fn new(count: i64) -> Self {
        Self { count, next: 0 }
    }

    /// Returns the configured iteration count.
    pub fn count(&self) -> i64 {
        self.count
    }
}

#[async_trait]
impl Node for ForLoop {
    fn type_name(&self) -> &'static str {
        "for_loop"
    }

    fn ports(&self) -> NodePorts {
        NodePorts::new()
            .exec_in("exec")
            .output::<i64>("index")
            .exec_out("body")
            .exec_out("completed")
    }

    fn properties(&self) -> Vec<PropertyDescriptor> {
        vec![
            PropertyDescriptor::new(
                "count",
                PropertyKind::Integer,
                |node: &Self| node.count,
                |node: &mut Self, count: i64| node.count = count,
            )
            .with_description("Number of times the body runs")
            .with_constraint(Constraint::at_least(0.0)),
        ]
    }

    fn reset(&mut self) {
        self.next = 0;
    }

    async fn execute(&mut self, ctx: &mut ExecContext) -> NodeResult<()> {
        ctx.check_cancelled()?;

        if self.next < self.count {
            ctx.set_output(0, self.next)?;
            self.next += 1;
            ctx.trigger(BODY)
        } else {
            self.next = 0;
            ctx.trigger(COMPLETED)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Triggered;

    #[tokio::test]
    async fn test_iterates_then_completes_and_rewinds() {
        let mut node = ForLoop::new(2);
        let mut fired = Vec::new();

        for _ in 0..4 {
            let mut ctx = ExecContext::detached(&node.ports());
            node.execute(&mut ctx).await.unwrap();
            let index = ctx.output(0).map(|value| value.get::<i64>().unwrap());
            fired.push((ctx.triggered(), index));
        }

        let body = || Triggered::Only([BODY].into());
        assert_eq!(
            fired,
            vec![
                (body(), Some(0)),
                (body(), Some(1)),
                (Triggered::Only([COMPLETED].into()), None),
                (body(), Some(0)),
            ]
        );
    }

    #[tokio::test]
    async fn test_reset_rewinds() {
        let mut node = ForLoop::new(3);
        let mut ctx = ExecContext::detached(&node.ports());
        node.execute(&mut ctx).await.unwrap();

        node.reset();
        let mut ctx = ExecContext::detached(&node.ports());
        node.execute(&mut ctx).await.unwrap();
        assert_eq!(ctx.output(0).unwrap().get::<i64>(), Ok(0));
    }
}

//! Immutable scheduling view of a graph.

use std::collections::{BTreeSet, HashMap};

use nodeflow_core::{Conversion, NodeId, Value, ValueType};

use crate::error::NodeResult;
use crate::graph::{Graph, LinkKind, PortSlot, SharedNode};
use crate::port::PortKind;

/// Delivery of one output value to one linked input.
pub(crate) struct Route {
    pub slot: PortSlot,
    pub conversion: Conversion,
}

/// Scheduling data of one node, captured when the executor is created.
pub(crate) struct PlannedNode {
    pub id: NodeId,
    pub type_name: &'static str,
    pub node: SharedNode,
    pub inputs: Vec<PortSlot>,
    pub outputs: Vec<PortSlot>,
    pub output_types: Vec<ValueType>,
    /// Linked inputs per output port.
    pub routes: Vec<Vec<Route>>,
    pub exec_outputs: usize,
    /// Target node positions per exec output.
    pub exec_targets: Vec<Vec<usize>>,
    pub flow_gated: bool,
    pub execution_node: bool,
    /// Distinct data predecessors, excluding the node itself.
    pub predecessors: Vec<usize>,
    /// Distinct data successors, excluding the node itself.
    pub successors: Vec<usize>,
}

impl PlannedNode {
    /// Copies the current value of every input port.
    pub fn snapshot(&self) -> Vec<Option<Value>> {
        self.inputs.iter().map(PortSlot::load).collect()
    }

    /// Stores written outputs and pushes them through every route.
    ///
    /// All conversions run before anything is stored, so a failing
    /// conversion leaves every port untouched.
    pub fn publish(&self, outputs: Vec<Option<Value>>) -> NodeResult<()> {
        let mut deliveries = Vec::new();
        for (port, value) in outputs.iter().enumerate() {
            let Some(value) = value else {
                continue;
            };
            for route in self.routes.get(port).into_iter().flatten() {
                deliveries.push((&route.slot, route.conversion.apply(value.clone())?));
            }
        }

        for (port, value) in outputs.into_iter().enumerate() {
            if let (Some(value), Some(slot)) = (value, self.outputs.get(port)) {
                slot.store(value);
            }
        }
        for (slot, value) in deliveries {
            slot.store(value);
        }
        Ok(())
    }
}

/// All planned nodes of a graph in insertion order.
pub(crate) struct ExecutionPlan {
    pub nodes: Vec<PlannedNode>,
}

impl ExecutionPlan {
    pub fn new(graph: &Graph) -> Self {
        let positions: HashMap<NodeId, usize> = graph
            .node_ids()
            .iter()
            .enumerate()
            .map(|(position, id)| (*id, position))
            .collect();

        let mut nodes: Vec<PlannedNode> = graph
            .entries()
            .map(|entry| PlannedNode {
                id: entry.id,
                type_name: entry.type_name,
                node: entry.node.clone(),
                inputs: entry.inputs.clone(),
                outputs: entry.outputs.clone(),
                output_types: entry
                    .ports
                    .ports(PortKind::Output)
                    .iter()
                    .map(|spec| spec.value_type.unwrap_or_else(ValueType::dynamic))
                    .collect(),
                routes: (0..entry.outputs.len()).map(|_| Vec::new()).collect(),
                exec_outputs: entry.ports.len(PortKind::ExecOut),
                exec_targets: vec![Vec::new(); entry.ports.len(PortKind::ExecOut)],
                flow_gated: entry.ports.is_flow_gated(),
                execution_node: entry.ports.is_execution_node(),
                predecessors: Vec::new(),
                successors: Vec::new(),
            })
            .collect();

        let mut predecessors = vec![BTreeSet::new(); nodes.len()];
        let mut successors = vec![BTreeSet::new(); nodes.len()];

        for (source, target, link) in graph.raw_links() {
            let (Some(&from), Some(&to)) = (positions.get(&source.id), positions.get(&target.id)) else {
                continue;
            };

            match link.kind {
                LinkKind::Data => {
                    let Some(slot) = target.inputs.get(link.to_port) else {
                        continue;
                    };
                    if let Some(routes) = nodes[from].routes.get_mut(link.from_port) {
                        routes.push(Route {
                            slot: slot.clone(),
                            conversion: link.conversion.clone(),
                        });
                    }
                    if from != to {
                        predecessors[to].insert(from);
                        successors[from].insert(to);
                    }
                }
                LinkKind::Exec => {
                    if let Some(targets) = nodes[from].exec_targets.get_mut(link.from_port) {
                        if !targets.contains(&to) {
                            targets.push(to);
                        }
                    }
                }
            }
        }

        for (node, (preds, succs)) in nodes.iter_mut().zip(predecessors.into_iter().zip(successors)) {
            node.predecessors = preds.into_iter().collect();
            node.successors = succs.into_iter().collect();
        }

        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

//! Deterministic edge ordering
//!
//! The interpreter, the planner and the validator all walk outgoing edges in
//! the same order: by the index of the source port in the node's resolved
//! output list, then by target id, then by edge id.

use crate::constants::{DEFAULT_INPUT_PORT, DEFAULT_OUTPUT_PORT};
use crate::registry::{input_ports, output_ports};
use crate::types::{find_port, Edge, Graph, Node, PortDefinition, PortKind};

/// An outgoing edge with the resolved source port it leaves from
#[derive(Debug, Clone)]
pub struct Route<'g> {
    pub edge: &'g Edge,
    /// Index into the node's resolved outputs; `None` when the port is unknown
    pub port_index: Option<usize>,
    pub port_id: Option<String>,
}

/// Outgoing edges of `node`, ordered for traversal
pub fn ordered_routes<'g>(graph: &'g Graph, node: &Node) -> Vec<Route<'g>> {
    let outputs = output_ports(node);
    let mut routes: Vec<Route<'g>> = graph
        .outgoing_edges(&node.id)
        .map(|edge| {
            let found = find_port(&outputs, edge.source_port.as_deref(), DEFAULT_OUTPUT_PORT);
            Route {
                edge,
                port_index: found.map(|(i, _)| i),
                port_id: found.map(|(_, p)| p.id.clone()),
            }
        })
        .collect();
    routes.sort_by(|a, b| {
        a.port_index
            .unwrap_or(usize::MAX)
            .cmp(&b.port_index.unwrap_or(usize::MAX))
            .then_with(|| a.edge.target.cmp(&b.edge.target))
            .then_with(|| a.edge.id.cmp(&b.edge.id))
    });
    routes
}

/// The input port an edge lands on, if it exists on `target`
pub fn target_port<'a>(target: &'a Node, edge: &Edge) -> Option<&'a PortDefinition> {
    find_port(input_ports(target), edge.target_port.as_deref(), DEFAULT_INPUT_PORT).map(|(_, p)| p)
}

/// Whether an edge continues the control-flow chain into `target`
pub fn is_flow_edge(target: &Node, edge: &Edge) -> bool {
    target_port(target, edge).is_some_and(|p| p.kind == PortKind::Flow)
}

//! Run preview
//!
//! Statically walks the graph from Start without executing anything and
//! lists the nodes a run may visit, together with the validator's issues.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::data::NodeKind;
use crate::registry::definition_of;
use crate::routing::ordered_routes;
use crate::types::{Graph, Node, NodeId, NodeType};
use crate::validation::{validate_graph, Issue};

/// One previewed step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStep {
    pub node_id: NodeId,
    pub node_type: NodeType,
    pub title: String,
    pub description: String,
}

/// Ordered preview plus structural issues
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunPlan {
    pub steps: Vec<PlanStep>,
    pub issues: Vec<Issue>,
}

/// Build a depth-first preview from the Start node.
///
/// Every outgoing edge is followed since no branch decision is made; each
/// node appears at most once.
pub fn create_run_plan(graph: &Graph) -> RunPlan {
    let issues = validate_graph(graph);
    let Some(start) = graph.find_start_node() else {
        return RunPlan {
            steps: Vec::new(),
            issues,
        };
    };

    let mut steps = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&Node> = vec![start];

    while let Some(node) = stack.pop() {
        if !seen.insert(node.id.as_str()) {
            continue;
        }
        steps.push(PlanStep {
            node_id: node.id.clone(),
            node_type: node.node_type,
            title: node.display_name().to_string(),
            description: describe(node),
        });

        let routes = ordered_routes(graph, node);
        for route in routes.iter().rev() {
            if let Some(target) = graph.find_node(&route.edge.target) {
                if !seen.contains(target.id.as_str()) {
                    stack.push(target);
                }
            }
        }
    }

    RunPlan { steps, issues }
}

fn describe(node: &Node) -> String {
    let detail = match &node.data.kind {
        NodeKind::IfElse(data) => Some(format!("if {}", data.condition.trim())),
        NodeKind::Switch(data) => Some(format!("{} cases on {}", data.case_count(), data.selector.trim())),
        NodeKind::SetVariable(data) => Some(format!("set vars.{}", data.path.trim())),
        NodeKind::GetVariable(data) => Some(format!("read vars.{}", data.path.trim())),
        NodeKind::Completion(data) if !data.model.is_empty() => Some(format!("model {}", data.model)),
        _ => None,
    };
    let base = definition_of(node.node_type).description;
    match detail {
        Some(detail) => format!("{} ({})", base, detail),
        None => base.to_string(),
    }
}

//! Graph validation
//!
//! Validates instance counts, node data, edge endpoints and ports, provider
//! wiring, reachability of an End node and cycles. Every check runs and all
//! issues are returned together; validation never fails.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_INPUT_PORT, DEFAULT_OUTPUT_PORT};
use crate::registry::{definition_of, input_ports, list_required, output_ports};
use crate::routing::ordered_routes;
use crate::tools::provider_edges;
use crate::types::{find_port, Edge, Graph, Node, NodeType, PortDefinition};

/// Severity of a validation issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueLevel {
    Error,
    Warning,
}

/// A structural problem found in a graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub level: IssueLevel,
    /// Stable machine-readable code, e.g. `missing_start_node`
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_id: Option<String>,
}

impl Issue {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Error,
            code: code.into(),
            message: message.into(),
            node_id: None,
            edge_id: None,
        }
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Warning,
            ..Self::error(code, message)
        }
    }

    pub fn on_node(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    pub fn on_edge(mut self, edge_id: impl Into<String>) -> Self {
        self.edge_id = Some(edge_id.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == IssueLevel::Error
    }
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.level {
            IssueLevel::Error => "error",
            IssueLevel::Warning => "warning",
        };
        write!(f, "{} [{}]: {}", level, self.code, self.message)
    }
}

/// Whether any issue is an error
pub fn has_errors(issues: &[Issue]) -> bool {
    issues.iter().any(Issue::is_error)
}

/// Validate a graph
///
/// Returns all issues found (not just the first), in check order.
pub fn validate_graph(graph: &Graph) -> Vec<Issue> {
    let mut issues = Vec::new();

    validate_instance_counts(graph, &mut issues);
    validate_nodes(graph, &mut issues);
    validate_edges(graph, &mut issues);
    validate_provider_wiring(graph, &mut issues);

    // Reachability needs a Start node; its absence is already reported above
    if let Some(start) = graph.find_start_node() {
        validate_traversal(graph, start, &mut issues);
    }

    issues
}

/// Check node types with minimum/maximum instance counts
fn validate_instance_counts(graph: &Graph, issues: &mut Vec<Issue>) {
    for def in list_required() {
        let Some(bounds) = def.instances else {
            continue;
        };
        let count = graph.nodes.iter().filter(|n| n.node_type == def.node_type).count();
        if count < bounds.min {
            issues.push(Issue::error(
                bounds.missing_code,
                format!("Graph needs at least {} {} node(s), found {}", bounds.min, def.label, count),
            ));
        }
        if let Some(max) = bounds.max {
            if count > max {
                for node in graph.nodes.iter().filter(|n| n.node_type == def.node_type).skip(max) {
                    issues.push(
                        Issue::error(
                            bounds.excess_code,
                            format!("Graph allows at most {} {} node(s), found {}", max, def.label, count),
                        )
                        .on_node(&node.id),
                    );
                }
            }
        }
    }
}

/// Check node id uniqueness and that data matches the node type
fn validate_nodes(graph: &Graph, issues: &mut Vec<Issue>) {
    let mut seen = HashSet::new();
    for node in &graph.nodes {
        if !seen.insert(node.id.as_str()) {
            issues.push(
                Issue::error("duplicate_node_id", format!("Node id '{}' is used more than once", node.id))
                    .on_node(&node.id),
            );
        }
        let data_type = node.data.kind.node_type();
        if data_type != node.node_type {
            issues.push(
                Issue::error(
                    "node_data_mismatch",
                    format!(
                        "Node '{}' is a {} node but carries {} data",
                        node.id, node.node_type, data_type
                    ),
                )
                .on_node(&node.id),
            );
        }
    }
}

/// Check edge endpoints, ports and port kinds
fn validate_edges(graph: &Graph, issues: &mut Vec<Issue>) {
    let nodes: HashMap<&str, &Node> = graph.nodes.iter().map(|n| (n.id.as_str(), n)).collect();

    for edge in &graph.edges {
        let source = nodes.get(edge.source.as_str());
        let target = nodes.get(edge.target.as_str());
        if source.is_none() {
            issues.push(
                Issue::error(
                    "dangling_edge_source",
                    format!("Edge '{}' starts at unknown node '{}'", edge.id, edge.source),
                )
                .on_edge(&edge.id),
            );
        }
        if target.is_none() {
            issues.push(
                Issue::error(
                    "dangling_edge_target",
                    format!("Edge '{}' ends at unknown node '{}'", edge.id, edge.target),
                )
                .on_edge(&edge.id),
            );
        }
        let (Some(source), Some(target)) = (source, target) else {
            continue;
        };

        let outputs = output_ports(source);
        let source_port = check_port(
            edge,
            source,
            &outputs,
            edge.source_port.as_deref(),
            DEFAULT_OUTPUT_PORT,
            "source",
            issues,
        );
        let target_port = check_port(
            edge,
            target,
            input_ports(target),
            edge.target_port.as_deref(),
            DEFAULT_INPUT_PORT,
            "target",
            issues,
        );

        if let (Some(out), Some(inp)) = (source_port, target_port) {
            if !out.kind.is_compatible_with(&inp.kind) {
                issues.push(
                    Issue::error(
                        "incompatible_ports",
                        format!(
                            "Edge '{}' connects {:?} port '{}' to {:?} port '{}'",
                            edge.id, out.kind, out.id, inp.kind, inp.id
                        ),
                    )
                    .on_edge(&edge.id),
                );
            }
        }
    }
}

fn check_port(
    edge: &Edge,
    node: &Node,
    ports: &[PortDefinition],
    explicit: Option<&str>,
    canonical: &str,
    side: &str,
    issues: &mut Vec<Issue>,
) -> Option<PortDefinition> {
    if let Some((_, port)) = find_port(ports, explicit, canonical) {
        return Some(port.clone());
    }
    match explicit {
        Some(id) => issues.push(
            Issue::error(
                format!("unknown_{}_port", side),
                format!("Edge '{}' uses {} port '{}' which node '{}' does not have", edge.id, side, id, node.id),
            )
            .on_edge(&edge.id)
            .on_node(&node.id),
        ),
        None if ports.is_empty() => issues.push(
            Issue::error(
                format!("unknown_{}_port", side),
                format!("Edge '{}' attaches to node '{}' which has no {} ports", edge.id, node.id, side),
            )
            .on_edge(&edge.id)
            .on_node(&node.id),
        ),
        None => issues.push(
            Issue::warning(
                format!("ambiguous_{}_port", side),
                format!(
                    "Edge '{}' does not name a {} port and node '{}' has several",
                    edge.id, side, node.id
                ),
            )
            .on_edge(&edge.id)
            .on_node(&node.id),
        ),
    }
    None
}

/// Check single-instance providers are wired at most once per consumer
fn validate_provider_wiring(graph: &Graph, issues: &mut Vec<Issue>) {
    for consumer in graph.nodes.iter().filter(|n| n.node_type == NodeType::Completion) {
        let mut counts: HashMap<NodeType, usize> = HashMap::new();
        for edge in provider_edges(graph, &consumer.id) {
            let Some(provider) = graph.find_node(&edge.source) else {
                continue;
            };
            if provider.data.muted || !definition_of(provider.node_type).single_per_consumer {
                continue;
            }
            let count = counts.entry(provider.node_type).or_default();
            *count += 1;
            if *count == 2 {
                issues.push(
                    Issue::error(
                        "duplicate_provider",
                        format!(
                            "Node '{}' has more than one {} provider",
                            consumer.id,
                            definition_of(provider.node_type).label
                        ),
                    )
                    .on_node(&consumer.id),
                );
            }
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    Gray,
    Black,
}

fn successors<'g>(graph: &'g Graph, nodes: &HashMap<&str, &Node>, node: &Node) -> Vec<&'g Edge> {
    ordered_routes(graph, node)
        .into_iter()
        .map(|r| r.edge)
        .filter(|e| nodes.contains_key(e.target.as_str()))
        .collect()
}

/// Reachability and cycle detection in one depth-first pass from Start
fn validate_traversal(graph: &Graph, start: &Node, issues: &mut Vec<Issue>) {
    let nodes: HashMap<&str, &Node> = graph.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    let mut colors: HashMap<&str, Color> = HashMap::new();
    let mut back_edges: Vec<&Edge> = Vec::new();

    colors.insert(start.id.as_str(), Color::Gray);
    let mut stack: Vec<(&Node, Vec<&Edge>, usize)> = vec![(start, successors(graph, &nodes, start), 0)];

    while let Some(frame) = stack.last_mut() {
        let node = frame.0;
        if frame.2 < frame.1.len() {
            let edge = frame.1[frame.2];
            frame.2 += 1;
            match colors.get(edge.target.as_str()) {
                None => {
                    if let Some(&target) = nodes.get(edge.target.as_str()) {
                        colors.insert(target.id.as_str(), Color::Gray);
                        stack.push((target, successors(graph, &nodes, target), 0));
                    }
                }
                Some(Color::Gray) => back_edges.push(edge),
                Some(Color::Black) => {}
            }
        } else {
            colors.insert(node.id.as_str(), Color::Black);
            stack.pop();
        }
    }

    let reaches_end = graph
        .nodes
        .iter()
        .any(|n| n.node_type == NodeType::End && colors.contains_key(n.id.as_str()));
    if !reaches_end {
        issues.push(
            Issue::error("missing_reachable_end", "No End node is reachable from Start").on_node(&start.id),
        );
    }

    for edge in back_edges {
        issues.push(
            Issue::error(
                "cycle_detected",
                format!("Edge '{}' from '{}' closes a cycle back to '{}'", edge.id, edge.source, edge.target),
            )
            .on_node(&edge.target)
            .on_edge(&edge.id),
        );
    }

    for node in &graph.nodes {
        let exempt = node.node_type.is_pure() || node.node_type.is_tool_provider();
        if !exempt && !colors.contains_key(node.id.as_str()) {
            issues.push(
                Issue::warning(
                    "unreachable_node",
                    format!("Node '{}' is not reachable from Start", node.id),
                )
                .on_node(&node.id),
            );
        }
    }
}

//! Fluent builder for graphs
//!
//! Provides a compact API for constructing graph snapshots
//! programmatically, mostly used by hosts and tests.

use crate::data::{IfElseData, NodeData, NodeKind, SwitchData};
use crate::types::{Edge, Graph, Node, NodeType};

/// Fluent builder for constructing graphs
///
/// # Example
///
/// ```ignore
/// let graph = GraphBuilder::new()
///     .start("start")
///     .if_else("check", "input.score > 0.5")
///     .end("yes")
///     .end("no")
///     .connect_default("start", "check")
///     .connect("check", "then", "yes", "in")
///     .connect("check", "else", "no", "in")
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    edge_counter: usize,
}

impl GraphBuilder {
    /// Create a new graph builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with the given type-specific data
    pub fn add(mut self, id: impl Into<String>, kind: NodeKind) -> Self {
        self.nodes.push(Node::with_data(id, NodeData::new(kind)));
        self
    }

    /// Add a node of `node_type` with default data
    pub fn add_node(mut self, id: impl Into<String>, node_type: NodeType) -> Self {
        self.nodes.push(Node::new(id, node_type));
        self
    }

    pub fn start(self, id: impl Into<String>) -> Self {
        self.add_node(id, NodeType::Start)
    }

    pub fn end(self, id: impl Into<String>) -> Self {
        self.add_node(id, NodeType::End)
    }

    pub fn if_else(self, id: impl Into<String>, condition: impl Into<String>) -> Self {
        self.add(
            id,
            NodeKind::IfElse(IfElseData {
                condition: condition.into(),
            }),
        )
    }

    pub fn switch(self, id: impl Into<String>, cases: u8, labels: &[&str], selector: impl Into<String>) -> Self {
        self.add(
            id,
            NodeKind::Switch(SwitchData {
                cases,
                labels: labels.iter().map(|l| l.to_string()).collect(),
                selector: selector.into(),
            }),
        )
    }

    /// Set the label of the most recently added node
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        if let Some(node) = self.nodes.last_mut() {
            node.data.label = label.into();
        }
        self
    }

    /// Mute the most recently added node
    pub fn muted(mut self) -> Self {
        if let Some(node) = self.nodes.last_mut() {
            node.data.muted = true;
        }
        self
    }

    /// Connect explicit ports (auto-generates the edge ID)
    pub fn connect(
        mut self,
        source: impl Into<String>,
        source_port: impl Into<String>,
        target: impl Into<String>,
        target_port: impl Into<String>,
    ) -> Self {
        self.edge_counter += 1;
        let id = format!("edge-{}", self.edge_counter);
        self.edges.push(Edge::new(id, source, source_port, target, target_port));
        self
    }

    /// Connect default ports (auto-generates the edge ID)
    pub fn connect_default(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.edge_counter += 1;
        let id = format!("edge-{}", self.edge_counter);
        self.edges.push(Edge::between(id, source, target));
        self
    }

    /// Add a fully specified edge
    pub fn edge(mut self, edge: Edge) -> Self {
        self.edges.push(edge);
        self
    }

    /// Build the graph
    pub fn build(self) -> Graph {
        Graph {
            nodes: self.nodes,
            edges: self.edges,
        }
    }
}

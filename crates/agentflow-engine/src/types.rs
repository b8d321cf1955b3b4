//! Core types for agent graphs
//!
//! These types define the structure of a graph snapshot: node types,
//! ports, node instances and the edges that connect them.

use serde::{Deserialize, Serialize};

use crate::data::NodeData;

/// Unique identifier for a node
pub type NodeId = String;

/// Unique identifier for an edge
pub type EdgeId = String;

/// Unique identifier for a port
pub type PortId = String;

/// The closed set of node types understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// Entry point of a run. Exactly one per graph.
    Start,
    /// Terminates a run successfully.
    End,
    /// Calls the completion collaborator with the assembled context.
    Completion,
    /// Two-way branch on a boolean expression.
    IfElse,
    /// Multi-way branch on a selector expression.
    Switch,
    /// Pure script over an upstream value.
    Transform,
    /// Pure read of a variable path.
    GetVariable,
    /// Writes a variable path.
    SetVariable,
    /// Adds an author-written context fragment.
    ContextMessage,
    /// Tool provider: picks one of a configured list of choices.
    Randomizer,
    /// Tool provider: searches a knowledge store.
    Retrieval,
    /// Tool provider: reads attached documents.
    DocumentReader,
    /// Tool provider: reads and writes run variables.
    GlobalState,
}

impl NodeType {
    /// Every node type, in declaration order.
    pub const ALL: [NodeType; 13] = [
        NodeType::Start,
        NodeType::End,
        NodeType::Completion,
        NodeType::IfElse,
        NodeType::Switch,
        NodeType::Transform,
        NodeType::GetVariable,
        NodeType::SetVariable,
        NodeType::ContextMessage,
        NodeType::Randomizer,
        NodeType::Retrieval,
        NodeType::DocumentReader,
        NodeType::GlobalState,
    ];

    /// Wire name of this type (matches the serde representation).
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Start => "start",
            NodeType::End => "end",
            NodeType::Completion => "completion",
            NodeType::IfElse => "if_else",
            NodeType::Switch => "switch",
            NodeType::Transform => "transform",
            NodeType::GetVariable => "get_variable",
            NodeType::SetVariable => "set_variable",
            NodeType::ContextMessage => "context_message",
            NodeType::Randomizer => "randomizer",
            NodeType::Retrieval => "retrieval",
            NodeType::DocumentReader => "document_reader",
            NodeType::GlobalState => "global_state",
        }
    }

    /// Whether outputs of this type are computed on demand by the dataflow resolver.
    pub fn is_pure(&self) -> bool {
        matches!(self, NodeType::GetVariable | NodeType::Transform)
    }

    /// Whether this type only ever supplies tools to a consumer.
    pub fn is_tool_provider(&self) -> bool {
        matches!(
            self,
            NodeType::Randomizer | NodeType::Retrieval | NodeType::DocumentReader | NodeType::GlobalState
        )
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What travels over a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortKind {
    /// Control-flow chain; an output also carries the node's produced value
    Flow,
    /// Value read on demand through the dataflow resolver
    Data,
    /// Tool provider wiring
    Tools,
}

impl PortKind {
    /// Check if an output of this kind can connect to an input of `input` kind
    pub fn is_compatible_with(&self, input: &PortKind) -> bool {
        match (self, input) {
            (PortKind::Tools, PortKind::Tools) => true,
            (PortKind::Tools, _) | (_, PortKind::Tools) => false,
            (PortKind::Flow, _) => true,
            (PortKind::Data, PortKind::Data) => true,
            (PortKind::Data, PortKind::Flow) => false,
        }
    }
}

/// Definition of a port (input or output)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortDefinition {
    /// Unique identifier for this port within its direction
    pub id: PortId,
    /// Human-readable label
    pub label: String,
    /// What the port carries
    pub kind: PortKind,
    /// Whether this port must be connected (for inputs)
    pub required: bool,
    /// Whether this port accepts multiple connections
    pub multiple: bool,
}

impl PortDefinition {
    /// Create a required port
    pub fn required(id: impl Into<String>, label: impl Into<String>, kind: PortKind) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
            required: true,
            multiple: false,
        }
    }

    /// Create an optional port
    pub fn optional(id: impl Into<String>, label: impl Into<String>, kind: PortKind) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
            required: false,
            multiple: false,
        }
    }

    /// Set this port to accept multiple connections
    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }
}

/// Find the port an edge end refers to.
///
/// An explicit id must exist in `ports`. An omitted id resolves to the sole
/// port, or to the canonical port when several exist.
pub fn find_port<'a>(
    ports: &'a [PortDefinition],
    explicit: Option<&str>,
    canonical: &str,
) -> Option<(usize, &'a PortDefinition)> {
    match explicit {
        Some(id) => ports.iter().enumerate().find(|(_, p)| p.id == id),
        None if ports.len() == 1 => Some((0, &ports[0])),
        None => ports.iter().enumerate().find(|(_, p)| p.id == canonical),
    }
}

/// Category of a node, used to group the palette
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    /// Start, End and branching nodes
    Control,
    /// Nodes that talk to a model or shape its context
    Ai,
    /// Pure value transforms
    Data,
    /// Variable store access
    Variables,
    /// Tool providers
    Tools,
}

/// An edge connecting two nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// Unique identifier for this edge
    pub id: EdgeId,
    /// Source node ID
    pub source: NodeId,
    /// Target node ID
    pub target: NodeId,
    /// Source port ID; `None` means the node's default output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_port: Option<PortId>,
    /// Target port ID; `None` means the node's default input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_port: Option<PortId>,
}

impl Edge {
    /// Create an edge between explicit ports
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        source_port: impl Into<String>,
        target: impl Into<String>,
        target_port: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_port: Some(source_port.into()),
            target_port: Some(target_port.into()),
        }
    }

    /// Create an edge between default ports
    pub fn between(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_port: None,
            target_port: None,
        }
    }
}

/// A node instance in a graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique identifier for this node instance
    pub id: NodeId,
    /// Node type; must match the tag of `data`
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Type-specific configuration
    pub data: NodeData,
}

impl Node {
    /// Create a node of `node_type` with its default data
    pub fn new(id: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            node_type,
            data: NodeData::default_for(node_type),
        }
    }

    /// Create a node whose type is taken from its data
    pub fn with_data(id: impl Into<String>, data: NodeData) -> Self {
        Self {
            id: id.into(),
            node_type: data.kind.node_type(),
            data,
        }
    }

    /// Display name: the user label when set, otherwise the title
    pub fn display_name(&self) -> &str {
        if self.data.label.trim().is_empty() {
            &self.data.title
        } else {
            &self.data.label
        }
    }
}

/// A graph snapshot handed to the engine for one validation, plan or run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Graph {
    /// Nodes in the graph
    pub nodes: Vec<Node>,
    /// Edges connecting nodes
    pub edges: Vec<Edge>,
}

impl Graph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a graph snapshot from JSON
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Find a node by ID
    pub fn find_node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Find the first Start node
    pub fn find_start_node(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.node_type == NodeType::Start)
    }

    /// Get edges coming into a node
    pub fn incoming_edges<'a>(&'a self, node_id: &str) -> impl Iterator<Item = &'a Edge> + 'a {
        let node_id = node_id.to_string();
        self.edges.iter().filter(move |e| e.target == node_id)
    }

    /// Get edges going out of a node
    pub fn outgoing_edges<'a>(&'a self, node_id: &str) -> impl Iterator<Item = &'a Edge> + 'a {
        let node_id = node_id.to_string();
        self.edges.iter().filter(move |e| e.source == node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_kind_compatibility() {
        assert!(PortKind::Flow.is_compatible_with(&PortKind::Flow));
        assert!(PortKind::Flow.is_compatible_with(&PortKind::Data));
        assert!(PortKind::Tools.is_compatible_with(&PortKind::Tools));
        assert!(!PortKind::Tools.is_compatible_with(&PortKind::Flow));
        assert!(!PortKind::Flow.is_compatible_with(&PortKind::Tools));
    }

    #[test]
    fn test_find_port_defaults() {
        let single = vec![PortDefinition::optional("out", "Out", PortKind::Flow)];
        assert_eq!(find_port(&single, None, "out").map(|(i, _)| i), Some(0));

        let branches = vec![
            PortDefinition::optional("then", "Then", PortKind::Flow),
            PortDefinition::optional("else", "Else", PortKind::Flow),
        ];
        assert!(find_port(&branches, None, "out").is_none());
        assert_eq!(find_port(&branches, Some("else"), "out").map(|(i, _)| i), Some(1));
        assert!(find_port(&branches, Some("maybe"), "out").is_none());
    }

    #[test]
    fn test_graph_edges() {
        let mut graph = Graph::new();
        graph.nodes.push(Node::new("start", NodeType::Start));
        graph.nodes.push(Node::new("end", NodeType::End));
        graph.edges.push(Edge::between("e1", "start", "end"));

        assert_eq!(graph.outgoing_edges("start").map(|e| e.target.as_str()).collect::<Vec<_>>(), vec!["end"]);
        assert_eq!(graph.incoming_edges("end").count(), 1);
        assert_eq!(graph.find_start_node().map(|n| n.id.as_str()), Some("start"));
    }

    #[test]
    fn test_serialization() {
        let node = Node::new("t1", NodeType::IfElse);
        let json = serde_json::to_string(&node).unwrap();
        assert!(json.contains("\"type\":\"if_else\""));

        let back: Node = serde_json::from_str(&json).unwrap();
        assert_eq!(back, node);
    }
}

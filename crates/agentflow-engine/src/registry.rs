//! Node registry
//!
//! The registry is the single source of truth for node type schemas. It is
//! built once, never mutated, and shared by the validator, resolver, planner
//! and interpreter.

use once_cell::sync::Lazy;

use crate::constants::{
    CASE_PORT_PREFIX, DEFAULT_INPUT_PORT, DEFAULT_OUTPUT_PORT, ELSE_PORT, ENABLE_PORT, THEN_PORT,
    TOOLS_PORT, VALUE_PORT,
};
use crate::data::NodeKind;
use crate::descriptor::{AttributeKind, AttributeSchema, InstanceBounds, NodeDefinition, OutputPorts};
use crate::types::{Node, NodeCategory, NodeType, PortDefinition, PortKind};

static DEFINITIONS: Lazy<Vec<NodeDefinition>> =
    Lazy::new(|| NodeType::ALL.iter().map(|t| build_definition(*t)).collect());

/// Look up the definition of a node type
pub fn definition_of(node_type: NodeType) -> &'static NodeDefinition {
    // ALL and DEFINITIONS share declaration order
    let index = NodeType::ALL
        .iter()
        .position(|t| *t == node_type)
        .unwrap_or_default();
    &DEFINITIONS[index]
}

/// All definitions, in declaration order
pub fn all_definitions() -> &'static [NodeDefinition] {
    &DEFINITIONS
}

/// Definitions users can add from the palette, ordered by label
pub fn list_by_creatable() -> Vec<&'static NodeDefinition> {
    let mut defs: Vec<_> = DEFINITIONS.iter().filter(|d| d.creatable).collect();
    defs.sort_by(|a, b| a.label.cmp(b.label));
    defs
}

/// Definitions with instance count bounds
pub fn list_required() -> Vec<&'static NodeDefinition> {
    DEFINITIONS.iter().filter(|d| d.instances.is_some()).collect()
}

/// Evaluate an output-port resolver against node data
pub fn resolve_ports(resolver: &OutputPorts, kind: &NodeKind) -> Vec<PortDefinition> {
    match resolver {
        OutputPorts::Static(ports) => ports.clone(),
        OutputPorts::Dynamic(resolve) => resolve(kind),
    }
}

/// Resolved output ports of a node instance
pub fn output_ports(node: &Node) -> Vec<PortDefinition> {
    resolve_ports(&definition_of(node.node_type).outputs, &node.data.kind)
}

/// Input ports of a node instance
pub fn input_ports(node: &Node) -> &'static [PortDefinition] {
    &definition_of(node.node_type).inputs
}

fn flow_in() -> PortDefinition {
    PortDefinition::required(DEFAULT_INPUT_PORT, "In", PortKind::Flow)
}

fn flow_out() -> PortDefinition {
    PortDefinition::optional(DEFAULT_OUTPUT_PORT, "Out", PortKind::Flow)
}

fn provider_ports() -> (Vec<PortDefinition>, OutputPorts) {
    (
        vec![PortDefinition::optional(ENABLE_PORT, "Enable", PortKind::Data)],
        OutputPorts::Static(vec![PortDefinition::optional(TOOLS_PORT, "Tool", PortKind::Tools)]),
    )
}

fn switch_ports(kind: &NodeKind) -> Vec<PortDefinition> {
    let NodeKind::Switch(data) = kind else {
        return Vec::new();
    };
    (0..data.case_count())
        .map(|i| {
            let label = data
                .labels
                .get(i)
                .filter(|l| !l.trim().is_empty())
                .cloned()
                .unwrap_or_else(|| format!("Case {}", i));
            PortDefinition::optional(format!("{}{}", CASE_PORT_PREFIX, i), label, PortKind::Flow)
        })
        .collect()
}

fn has_path(kind: &NodeKind) -> bool {
    matches!(kind, NodeKind::GetVariable(data) if !data.path.trim().is_empty())
}

fn number(min: Option<f64>, max: Option<f64>) -> AttributeKind {
    AttributeKind::Number { min, max }
}

fn build_definition(node_type: NodeType) -> NodeDefinition {
    let base = |label, category, description| NodeDefinition {
        node_type,
        label,
        category,
        description,
        attributes: Vec::new(),
        inputs: vec![flow_in()],
        outputs: OutputPorts::Static(vec![flow_out()]),
        creatable: true,
        instances: None,
        single_per_consumer: false,
    };

    match node_type {
        NodeType::Start => NodeDefinition {
            inputs: Vec::new(),
            creatable: false,
            instances: Some(InstanceBounds {
                min: 1,
                max: Some(1),
                missing_code: "missing_start_node",
                excess_code: "multiple_start_nodes",
            }),
            ..base("Start", NodeCategory::Control, "Entry point of the run")
        },
        NodeType::End => NodeDefinition {
            outputs: OutputPorts::Static(Vec::new()),
            ..base("End", NodeCategory::Control, "Finishes the run")
        },
        NodeType::Completion => NodeDefinition {
            attributes: vec![
                AttributeSchema::new("model", "Model", AttributeKind::Text),
                AttributeSchema::new("systemPrompt", "System prompt", AttributeKind::Multiline),
                AttributeSchema::new("temperature", "Temperature", number(Some(0.0), Some(2.0))),
                AttributeSchema::new("maxTokens", "Max tokens", number(Some(1.0), None)),
                AttributeSchema::new("stream", "Stream", AttributeKind::Boolean),
                AttributeSchema::new("maxToolRounds", "Max tool rounds", number(Some(0.0), None)),
            ],
            inputs: vec![
                flow_in(),
                PortDefinition::optional(TOOLS_PORT, "Tools", PortKind::Tools).multiple(),
            ],
            ..base("Completion", NodeCategory::Ai, "Asks the model for the next assistant turn")
        },
        NodeType::IfElse => NodeDefinition {
            attributes: vec![AttributeSchema::new("condition", "Condition", AttributeKind::Code)],
            outputs: OutputPorts::Static(vec![
                PortDefinition::optional(THEN_PORT, "Then", PortKind::Flow),
                PortDefinition::optional(ELSE_PORT, "Else", PortKind::Flow),
            ]),
            ..base("If / Else", NodeCategory::Control, "Branches on a boolean expression")
        },
        NodeType::Switch => NodeDefinition {
            attributes: vec![
                AttributeSchema::new("cases", "Cases", number(Some(2.0), Some(8.0))),
                AttributeSchema::new("labels", "Case labels", AttributeKind::StringList),
                AttributeSchema::new("selector", "Selector", AttributeKind::Code),
            ],
            outputs: OutputPorts::Dynamic(switch_ports),
            ..base("Switch", NodeCategory::Control, "Routes to one of several cases")
        },
        NodeType::Transform => NodeDefinition {
            attributes: vec![
                AttributeSchema::new(
                    "mode",
                    "Mode",
                    AttributeKind::Select {
                        options: vec!["expression".to_string(), "function".to_string()],
                    },
                ),
                AttributeSchema::new("source", "Script", AttributeKind::Code),
            ],
            ..base("Transform", NodeCategory::Data, "Computes a value from its input with a script")
        },
        NodeType::GetVariable => NodeDefinition {
            attributes: vec![
                AttributeSchema::new("path", "Path", AttributeKind::Text),
                AttributeSchema::new("defaultValue", "Default", AttributeKind::Json).visible_when(has_path),
            ],
            ..base("Get Variable", NodeCategory::Variables, "Reads a run variable")
        },
        NodeType::SetVariable => NodeDefinition {
            attributes: vec![
                AttributeSchema::new("path", "Path", AttributeKind::Text),
                AttributeSchema::new("expression", "Value", AttributeKind::Code),
            ],
            inputs: vec![
                flow_in(),
                PortDefinition::optional(VALUE_PORT, "Value", PortKind::Data),
            ],
            ..base("Set Variable", NodeCategory::Variables, "Writes a run variable")
        },
        NodeType::ContextMessage => NodeDefinition {
            attributes: vec![
                AttributeSchema::new(
                    "role",
                    "Role",
                    AttributeKind::Select {
                        options: vec!["system".to_string(), "user".to_string(), "assistant".to_string()],
                    },
                ),
                AttributeSchema::new("text", "Text", AttributeKind::Multiline),
                AttributeSchema::new("priority", "Priority", number(None, None)),
            ],
            ..base("Context Message", NodeCategory::Ai, "Adds a fragment to the model context")
        },
        NodeType::Randomizer => {
            let (inputs, outputs) = provider_ports();
            NodeDefinition {
                attributes: vec![
                    AttributeSchema::new("toolName", "Tool name", AttributeKind::Text),
                    AttributeSchema::new("description", "Description", AttributeKind::Multiline),
                    AttributeSchema::new("choices", "Choices", AttributeKind::StringList),
                ],
                inputs,
                outputs,
                ..base("Randomizer", NodeCategory::Tools, "Lets the model draw a random choice")
            }
        }
        NodeType::Retrieval => {
            let (inputs, outputs) = provider_ports();
            NodeDefinition {
                attributes: vec![
                    AttributeSchema::new("storeId", "Knowledge store", AttributeKind::Text),
                    AttributeSchema::new("topK", "Results per query", number(Some(1.0), None)),
                    AttributeSchema::new("maxQueries", "Max queries", number(Some(1.0), None)),
                    AttributeSchema::new("guidance", "Query guidance", AttributeKind::Multiline),
                ],
                inputs,
                outputs,
                single_per_consumer: true,
                ..base("Retrieval", NodeCategory::Tools, "Lets the model search a knowledge store")
            }
        }
        NodeType::DocumentReader => {
            let (inputs, outputs) = provider_ports();
            NodeDefinition {
                attributes: vec![
                    AttributeSchema::new("documents", "Documents", AttributeKind::Json),
                    AttributeSchema::new("maxChars", "Max characters", number(Some(1.0), None)),
                ],
                inputs,
                outputs,
                ..base("Document Reader", NodeCategory::Tools, "Lets the model read attached documents")
            }
        }
        NodeType::GlobalState => {
            let (inputs, outputs) = provider_ports();
            NodeDefinition {
                attributes: vec![
                    AttributeSchema::new("allowWrite", "Allow writes", AttributeKind::Boolean),
                    AttributeSchema::new("scope", "Path scope", AttributeKind::Text),
                ],
                inputs,
                outputs,
                ..base("Global State", NodeCategory::Tools, "Lets the model read and write run variables")
            }
        }
    }
}

//! Node definitions
//!
//! A `NodeDefinition` is the static schema for one node type: its label,
//! category, editable attributes, input ports and an output-port resolver.
//! Output ports are either a fixed list or computed from the node's data
//! (Switch exposes one port per configured case).

use serde::{Deserialize, Serialize};

use crate::data::{NodeData, NodeKind};
use crate::types::{NodeCategory, NodeType, PortDefinition};

/// Editor widget / value shape of an attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttributeKind {
    Text,
    Multiline,
    Code,
    Boolean,
    Number { min: Option<f64>, max: Option<f64> },
    Select { options: Vec<String> },
    StringList,
    Json,
}

/// Predicate over a node's own data deciding whether an attribute is shown
pub type VisibilityPredicate = fn(&NodeKind) -> bool;

/// Schema of one editable attribute
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    /// Serialized field name inside the node data
    pub key: &'static str,
    pub label: &'static str,
    pub kind: AttributeKind,
    pub visible_when: Option<VisibilityPredicate>,
}

impl AttributeSchema {
    pub fn new(key: &'static str, label: &'static str, kind: AttributeKind) -> Self {
        Self {
            key,
            label,
            kind,
            visible_when: None,
        }
    }

    /// Only show this attribute when `predicate` holds for the node's data
    pub fn visible_when(mut self, predicate: VisibilityPredicate) -> Self {
        self.visible_when = Some(predicate);
        self
    }

    /// Evaluate the visibility predicate against node data
    pub fn is_visible(&self, kind: &NodeKind) -> bool {
        self.visible_when.map_or(true, |predicate| predicate(kind))
    }
}

/// Output ports of a node type
#[derive(Debug, Clone)]
pub enum OutputPorts {
    /// Same ports for every instance
    Static(Vec<PortDefinition>),
    /// Ports computed from the instance's data
    Dynamic(fn(&NodeKind) -> Vec<PortDefinition>),
}

/// Allowed number of instances of a node type per graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceBounds {
    pub min: usize,
    pub max: Option<usize>,
    /// Issue code reported when fewer than `min` exist
    pub missing_code: &'static str,
    /// Issue code reported when more than `max` exist
    pub excess_code: &'static str,
}

/// Static schema for a node type
#[derive(Debug, Clone)]
pub struct NodeDefinition {
    pub node_type: NodeType,
    pub label: &'static str,
    pub category: NodeCategory,
    pub description: &'static str,
    pub attributes: Vec<AttributeSchema>,
    pub inputs: Vec<PortDefinition>,
    pub outputs: OutputPorts,
    /// Whether users may add instances from the palette
    pub creatable: bool,
    pub instances: Option<InstanceBounds>,
    /// A provider type that may only be wired once to each consumer
    pub single_per_consumer: bool,
}

impl NodeDefinition {
    /// Default data for a new instance of this type
    pub fn default_data(&self) -> NodeData {
        NodeData::default_for(self.node_type)
    }

    /// Attributes visible for the given data
    pub fn visible_attributes(&self, kind: &NodeKind) -> Vec<&AttributeSchema> {
        self.attributes.iter().filter(|a| a.is_visible(kind)).collect()
    }

    /// Serializable description of this type for a given instance's data
    pub fn describe(&self, kind: &NodeKind) -> NodeDescriptor {
        NodeDescriptor {
            node_type: self.node_type,
            label: self.label.to_string(),
            category: self.category,
            description: self.description.to_string(),
            attributes: self
                .visible_attributes(kind)
                .into_iter()
                .map(|a| AttributeDescriptor {
                    key: a.key.to_string(),
                    label: a.label.to_string(),
                    kind: a.kind.clone(),
                })
                .collect(),
            inputs: self.inputs.clone(),
            outputs: crate::registry::resolve_ports(&self.outputs, kind),
        }
    }
}

/// Serializable view of a node definition, resolved against one instance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDescriptor {
    pub node_type: NodeType,
    pub label: String,
    pub category: NodeCategory,
    pub description: String,
    pub attributes: Vec<AttributeDescriptor>,
    pub inputs: Vec<PortDefinition>,
    pub outputs: Vec<PortDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDescriptor {
    pub key: String,
    pub label: String,
    pub kind: AttributeKind,
}

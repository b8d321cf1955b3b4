//! Per-type node configuration
//!
//! `NodeData` is a closed, type-tagged union. Every variant shares the
//! `title`/`label`/`muted` envelope; the tag must equal the owning node's
//! [`NodeType`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{defaults, MAX_SWITCH_CASES, MIN_SWITCH_CASES};
use crate::types::NodeType;

/// Configuration carried by every node instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    /// Title shown on the node, defaults to the type label
    pub title: String,
    /// User-settable label
    #[serde(default)]
    pub label: String,
    /// Muted nodes are skipped (providers are disabled)
    #[serde(default)]
    pub muted: bool,
    /// Type-specific fields
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl NodeData {
    /// Wrap type-specific data with the default envelope for its type
    pub fn new(kind: NodeKind) -> Self {
        let title = crate::registry::definition_of(kind.node_type()).label.to_string();
        Self {
            title,
            label: String::new(),
            muted: false,
            kind,
        }
    }

    /// Default data for a node type
    pub fn default_for(node_type: NodeType) -> Self {
        Self::new(NodeKind::default_for(node_type))
    }

    /// Builder-style label setter
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Builder-style mute setter
    pub fn muted(mut self, muted: bool) -> Self {
        self.muted = muted;
        self
    }
}

/// Type-specific node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    Start(StartData),
    End(EndData),
    Completion(CompletionData),
    IfElse(IfElseData),
    Switch(SwitchData),
    Transform(TransformData),
    GetVariable(GetVariableData),
    SetVariable(SetVariableData),
    ContextMessage(ContextMessageData),
    Randomizer(RandomizerData),
    Retrieval(RetrievalData),
    DocumentReader(DocumentReaderData),
    GlobalState(GlobalStateData),
}

impl NodeKind {
    /// The node type this data belongs to
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Start(_) => NodeType::Start,
            NodeKind::End(_) => NodeType::End,
            NodeKind::Completion(_) => NodeType::Completion,
            NodeKind::IfElse(_) => NodeType::IfElse,
            NodeKind::Switch(_) => NodeType::Switch,
            NodeKind::Transform(_) => NodeType::Transform,
            NodeKind::GetVariable(_) => NodeType::GetVariable,
            NodeKind::SetVariable(_) => NodeType::SetVariable,
            NodeKind::ContextMessage(_) => NodeType::ContextMessage,
            NodeKind::Randomizer(_) => NodeType::Randomizer,
            NodeKind::Retrieval(_) => NodeType::Retrieval,
            NodeKind::DocumentReader(_) => NodeType::DocumentReader,
            NodeKind::GlobalState(_) => NodeType::GlobalState,
        }
    }

    /// Default data factory for a node type
    pub fn default_for(node_type: NodeType) -> Self {
        match node_type {
            NodeType::Start => NodeKind::Start(StartData::default()),
            NodeType::End => NodeKind::End(EndData::default()),
            NodeType::Completion => NodeKind::Completion(CompletionData::default()),
            NodeType::IfElse => NodeKind::IfElse(IfElseData::default()),
            NodeType::Switch => NodeKind::Switch(SwitchData::default()),
            NodeType::Transform => NodeKind::Transform(TransformData::default()),
            NodeType::GetVariable => NodeKind::GetVariable(GetVariableData::default()),
            NodeType::SetVariable => NodeKind::SetVariable(SetVariableData::default()),
            NodeType::ContextMessage => NodeKind::ContextMessage(ContextMessageData::default()),
            NodeType::Randomizer => NodeKind::Randomizer(RandomizerData::default()),
            NodeType::Retrieval => NodeKind::Retrieval(RetrievalData::default()),
            NodeType::DocumentReader => NodeKind::DocumentReader(DocumentReaderData::default()),
            NodeType::GlobalState => NodeKind::GlobalState(GlobalStateData::default()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StartData {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EndData {}

/// Configuration for a completion (agent) node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompletionData {
    /// Model identifier passed to the completion collaborator
    pub model: String,
    /// Optional system prompt placed ahead of context fragments
    pub system_prompt: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    /// Request a streamed response
    pub stream: bool,
    /// Overrides the configured tool round limit
    pub max_tool_rounds: Option<u32>,
}

impl Default for CompletionData {
    fn default() -> Self {
        Self {
            model: String::new(),
            system_prompt: String::new(),
            temperature: None,
            max_tokens: None,
            stream: true,
            max_tool_rounds: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IfElseData {
    /// Expression that must evaluate to a boolean
    pub condition: String,
}

impl Default for IfElseData {
    fn default() -> Self {
        Self {
            condition: "true".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SwitchData {
    /// Configured case count, clamped into the supported range when read
    pub cases: u8,
    /// Optional labels, matched case-insensitively against the selector result
    pub labels: Vec<String>,
    /// Selector expression
    pub selector: String,
}

impl SwitchData {
    /// Case count after clamping
    pub fn case_count(&self) -> usize {
        self.cases.clamp(MIN_SWITCH_CASES, MAX_SWITCH_CASES) as usize
    }
}

impl Default for SwitchData {
    fn default() -> Self {
        Self {
            cases: MIN_SWITCH_CASES,
            labels: Vec::new(),
            selector: "0".to_string(),
        }
    }
}

/// How a script source is interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptMode {
    /// A single expression
    #[default]
    Expression,
    /// A function body that must `return` a value
    Function,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransformData {
    pub mode: ScriptMode,
    pub source: String,
}

impl Default for TransformData {
    fn default() -> Self {
        Self {
            mode: ScriptMode::Expression,
            source: "input".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GetVariableData {
    /// Dot-separated path into `vars`
    pub path: String,
    /// Returned when the path does not exist
    pub default_value: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SetVariableData {
    /// Dot-separated path into `vars`
    pub path: String,
    /// Expression producing the value; used when the value port is unwired.
    /// Empty means "store the current payload".
    pub expression: String,
}

/// Role of a conversation turn or context fragment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    #[default]
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContextMessageData {
    pub role: MessageRole,
    pub text: String,
    /// Falls back to the configured default fragment priority
    pub priority: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RandomizerData {
    pub tool_name: String,
    pub description: String,
    pub choices: Vec<String>,
}

impl Default for RandomizerData {
    fn default() -> Self {
        Self {
            tool_name: "random_choice".to_string(),
            description: "Pick one option at random".to_string(),
            choices: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetrievalData {
    /// Knowledge store passed to the retrieval collaborator
    pub store_id: String,
    pub top_k: u32,
    /// Upper bound on queries per tool call, exposed in the tool schema
    pub max_queries: u32,
    /// Query-writing guidance added to the context; empty uses a built-in hint
    pub guidance: String,
}

impl Default for RetrievalData {
    fn default() -> Self {
        Self {
            store_id: String::new(),
            top_k: defaults::RETRIEVAL_TOP_K,
            max_queries: defaults::RETRIEVAL_MAX_QUERIES,
            guidance: String::new(),
        }
    }
}

/// A document attached to a document reader node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentEntry {
    pub id: String,
    pub title: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentReaderData {
    pub documents: Vec<DocumentEntry>,
    /// Longer documents are truncated to this many characters
    pub max_chars: usize,
}

impl Default for DocumentReaderData {
    fn default() -> Self {
        Self {
            documents: Vec::new(),
            max_chars: defaults::DOCUMENT_MAX_CHARS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GlobalStateData {
    /// Allow the model to write, not only read
    pub allow_write: bool,
    /// Restricts reads and writes to paths under this prefix
    pub scope: String,
}

impl Default for GlobalStateData {
    fn default() -> Self {
        Self {
            allow_write: true,
            scope: String::new(),
        }
    }
}

//! Mutable run state
//!
//! One `ExecutionState` is created per run and threaded through every node
//! executor. Variable writes go through [`ExecutionState::set_var`] so the
//! vars generation advances and memoized pure-node values are invalidated.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::data::MessageRole;
use crate::error::{EngineError, Result};
use crate::types::NodeId;

/// A role-tagged fragment contributed to the model context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextMessage {
    pub role: MessageRole,
    pub text: String,
    /// Higher priorities are placed first
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_node_id: Option<NodeId>,
    /// Produced by the engine (e.g. retrieval results) rather than authored
    #[serde(default)]
    pub synthesized: bool,
}

impl ContextMessage {
    /// An author-written system fragment
    pub fn system(text: impl Into<String>, priority: i32) -> Self {
        Self {
            role: MessageRole::System,
            text: text.into(),
            priority,
            source_node_id: None,
            synthesized: false,
        }
    }

    pub fn from_node(mut self, node_id: impl Into<String>) -> Self {
        self.source_node_id = Some(node_id.into());
        self
    }

    pub fn synthesized(mut self) -> Self {
        self.synthesized = true;
        self
    }
}

/// One turn of the conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationEntry {
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ConversationEntry {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
            tool_call_id: None,
        }
    }
}

/// State threaded through one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionState {
    /// The current value passed along the control-flow chain
    pub payload: Value,
    /// Priority-ordered context fragments
    context_messages: Vec<ContextMessage>,
    vars: Value,
    pub conversation: Vec<ConversationEntry>,
    /// Outputs recorded for executed control-flow nodes
    pub node_outputs: HashMap<NodeId, Value>,
    #[serde(skip)]
    vars_generation: u64,
}

impl Default for ExecutionState {
    fn default() -> Self {
        Self::new(Value::Null)
    }
}

impl ExecutionState {
    /// Create a state with an initial payload and empty vars
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            context_messages: Vec::new(),
            vars: Value::Object(Map::new()),
            conversation: Vec::new(),
            node_outputs: HashMap::new(),
            vars_generation: 0,
        }
    }

    /// Replace the variable tree (non-objects are wrapped as `{"value": ..}`)
    pub fn with_vars(mut self, vars: Value) -> Self {
        self.replace_vars(vars);
        self
    }

    pub fn with_conversation(mut self, conversation: Vec<ConversationEntry>) -> Self {
        self.conversation = conversation;
        self
    }

    pub fn vars(&self) -> &Value {
        &self.vars
    }

    /// Monotonic counter advanced on every vars mutation
    pub fn vars_generation(&self) -> u64 {
        self.vars_generation
    }

    pub fn replace_vars(&mut self, vars: Value) {
        self.vars = match vars {
            Value::Object(_) => vars,
            Value::Null => Value::Object(Map::new()),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                Value::Object(map)
            }
        };
        self.vars_generation += 1;
    }

    /// Read a dot-separated path from vars
    pub fn get_var(&self, path: &str) -> Option<&Value> {
        get_path(&self.vars, path)
    }

    /// Write a dot-separated path into vars, creating missing objects
    pub fn set_var(&mut self, path: &str, value: Value) -> Result<()> {
        set_path(&mut self.vars, path, value)?;
        self.vars_generation += 1;
        Ok(())
    }

    pub fn context_messages(&self) -> &[ContextMessage] {
        &self.context_messages
    }

    /// Insert a fragment, keeping descending priority order.
    ///
    /// Equal priorities keep insertion order.
    pub fn push_context(&mut self, message: ContextMessage) {
        let index = self
            .context_messages
            .iter()
            .position(|m| m.priority < message.priority)
            .unwrap_or(self.context_messages.len());
        self.context_messages.insert(index, message);
    }

    /// Record the output of an executed node
    pub fn record_output(&mut self, node_id: &str, value: Value) {
        self.node_outputs.insert(node_id.to_string(), value);
    }
}

fn split_path(path: &str) -> Result<Vec<&str>> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(EngineError::path(path, "path is empty"));
    }
    let segments: Vec<&str> = trimmed.split('.').map(str::trim).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(EngineError::path(path, "path contains an empty segment"));
    }
    Ok(segments)
}

/// Read a dot-separated path. Numeric segments index into arrays.
pub fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let segments = split_path(path).ok()?;
    segments.into_iter().try_fold(root, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Write a dot-separated path, replacing non-object intermediates with objects
pub fn set_path(root: &mut Value, path: &str, value: Value) -> Result<()> {
    let segments = split_path(path)?;
    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| EngineError::path(path, "path is empty"))?;

    let mut current = root;
    for segment in parents {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else {
            return Err(EngineError::path(path, "intermediate value is not an object"));
        };
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    match current {
        Value::Object(map) => {
            map.insert(last.to_string(), value);
            Ok(())
        }
        _ => Err(EngineError::path(path, "target is not an object")),
    }
}

//! Event types for streaming run progress
//!
//! Events are sent from the interpreter to whoever renders progress
//! (a UI, the CLI, a test) and carry traces, node transitions, streamed
//! assistant text and usage reports.

use serde::{Deserialize, Serialize};

use crate::services::Usage;
use crate::state::ExecutionState;
use crate::types::{NodeId, NodeType};

/// Trait for receiving run events
///
/// This abstracts over the transport (channel, callback, log) so the
/// interpreter can be hosted in different contexts. The interpreter ignores
/// send failures.
pub trait EventSink: Send + Sync {
    /// Send an event
    ///
    /// Returns an error if the event could not be delivered (e.g., channel closed)
    fn send(&self, event: RunEvent) -> Result<(), EventError>;
}

/// Error when sending events fails
#[derive(Debug, Clone, thiserror::Error)]
#[error("Event error: {message}")]
pub struct EventError {
    pub message: String,
}

/// Events emitted during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RunEvent {
    #[serde(rename_all = "camelCase")]
    RunStarted { execution_id: String, start_node_id: NodeId },

    /// Free-form progress line
    #[serde(rename_all = "camelCase")]
    Trace { execution_id: String, message: String },

    /// A node is about to execute
    #[serde(rename_all = "camelCase")]
    NodeStarted {
        execution_id: String,
        node_id: NodeId,
        node_type: NodeType,
        title: String,
    },

    /// A node finished executing
    #[serde(rename_all = "camelCase")]
    NodeFinished {
        execution_id: String,
        node_id: NodeId,
        node_type: NodeType,
        next_node_id: Option<NodeId>,
        stop: bool,
        state: Box<ExecutionState>,
    },

    /// Incremental assistant text from a completion node
    #[serde(rename_all = "camelCase")]
    AssistantDelta {
        execution_id: String,
        node_id: NodeId,
        delta: String,
    },

    /// Token usage reported by a completion node
    #[serde(rename_all = "camelCase")]
    Usage {
        execution_id: String,
        node_id: NodeId,
        model: String,
        usage: Usage,
    },

    #[serde(rename_all = "camelCase")]
    RunCompleted { execution_id: String, node_id: NodeId },

    #[serde(rename_all = "camelCase")]
    RunFailed {
        execution_id: String,
        node_id: NodeId,
        message: String,
    },

    #[serde(rename_all = "camelCase")]
    RunCancelled { execution_id: String },
}

impl RunEvent {
    pub fn trace(execution_id: &str, message: impl Into<String>) -> Self {
        Self::Trace {
            execution_id: execution_id.to_string(),
            message: message.into(),
        }
    }

    pub fn execution_id(&self) -> &str {
        match self {
            Self::RunStarted { execution_id, .. }
            | Self::Trace { execution_id, .. }
            | Self::NodeStarted { execution_id, .. }
            | Self::NodeFinished { execution_id, .. }
            | Self::AssistantDelta { execution_id, .. }
            | Self::Usage { execution_id, .. }
            | Self::RunCompleted { execution_id, .. }
            | Self::RunFailed { execution_id, .. }
            | Self::RunCancelled { execution_id } => execution_id,
        }
    }
}

/// A no-op event sink that discards all events
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: RunEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// A vector-based event sink that collects events
///
/// Useful for testing to verify events were emitted correctly.
#[derive(Default)]
pub struct VecEventSink {
    events: parking_lot::Mutex<Vec<RunEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all collected events
    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().clone()
    }

    /// Clear all collected events
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: RunEvent) -> Result<(), EventError> {
        self.events.lock().push(event);
        Ok(())
    }
}

/// Adapts a closure into an [`EventSink`]
pub struct FnEventSink<F>(pub F);

impl<F> EventSink for FnEventSink<F>
where
    F: Fn(RunEvent) + Send + Sync,
{
    fn send(&self, event: RunEvent) -> Result<(), EventError> {
        (self.0)(event);
        Ok(())
    }
}

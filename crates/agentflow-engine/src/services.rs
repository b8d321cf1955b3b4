//! Collaborator contracts
//!
//! The engine does not talk to model providers, vector stores or billing
//! directly. Hosts supply implementations of these traits; every call is
//! asynchronous and fallible, and errors fail the calling node.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::data::MessageRole;
use crate::error::Result;

/// Tool definition offered to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (function name)
    pub name: String,
    /// Description of what the tool does
    pub description: String,
    /// JSON Schema for the tool's parameters
    pub parameters: Value,
}

/// A tool call requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call id, echoed back with the result
    pub id: String,
    /// Name of the tool to call
    pub name: String,
    /// Arguments to pass to the tool
    pub arguments: Value,
}

/// One message of a completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMessage {
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl RequestMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

/// Request handed to the completion collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<RequestMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub stream: bool,
}

/// Token accounting reported by the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    /// Cost in the provider's currency, when known
    pub cost: Option<f64>,
}

impl Usage {
    /// Accumulate another usage report into this one
    pub fn add(&mut self, other: &Usage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
        self.cost = match (self.cost, other.cost) {
            (Some(a), Some(b)) => Some(a + b),
            (a, b) => a.or(b),
        };
    }
}

/// A complete (non-streamed) completion response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResponse {
    pub content: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// One item of a streamed completion
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionChunk {
    /// Incremental assistant text
    Text(String),
    /// A fully assembled tool call
    ToolCall(ToolCall),
    /// Usage for the whole response
    Usage(Usage),
}

/// What the completion collaborator hands back
pub enum CompletionReply {
    Complete(CompletionResponse),
    Stream(BoxStream<'static, Result<CompletionChunk>>),
}

impl std::fmt::Debug for CompletionReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Complete(response) => f.debug_tuple("Complete").field(response).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Calls a language model
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionReply>;
}

/// Where a retrieved passage came from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    pub source: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Page, section or chunk locator
    #[serde(default)]
    pub locator: Option<String>,
}

/// A ranked retrieval hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalResult {
    pub text: String,
    pub score: f64,
    pub citation: Citation,
}

/// Searches a knowledge store
#[async_trait]
pub trait RetrievalClient: Send + Sync {
    async fn retrieve(&self, queries: &[String], store_id: &str, top_k: usize) -> Result<Vec<RetrievalResult>>;
}

/// Usage line recorded after each completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub model: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub cost: Option<f64>,
}

impl UsageRecord {
    pub fn new(model: impl Into<String>, usage: &Usage) -> Self {
        Self {
            model: model.into(),
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
            cost: usage.cost,
        }
    }
}

/// Records token usage
#[async_trait]
pub trait UsageSink: Send + Sync {
    async fn record(&self, record: UsageRecord) -> Result<()>;
}

/// Collaborators available to a run
#[derive(Clone, Default)]
pub struct Collaborators {
    pub completion: Option<Arc<dyn CompletionClient>>,
    pub retrieval: Option<Arc<dyn RetrievalClient>>,
    pub usage: Option<Arc<dyn UsageSink>>,
}

impl Collaborators {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the completion client
    pub fn with_completion(mut self, client: Arc<dyn CompletionClient>) -> Self {
        self.completion = Some(client);
        self
    }

    /// Set the retrieval client
    pub fn with_retrieval(mut self, client: Arc<dyn RetrievalClient>) -> Self {
        self.retrieval = Some(client);
        self
    }

    /// Set the usage sink
    pub fn with_usage(mut self, sink: Arc<dyn UsageSink>) -> Self {
        self.usage = Some(sink);
        self
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("completion", &self.completion.is_some())
            .field("retrieval", &self.retrieval.is_some())
            .field("usage", &self.usage.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_accumulates() {
        let mut total = Usage::default();
        total.add(&Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
            cost: None,
        });
        total.add(&Usage {
            prompt_tokens: 1,
            completion_tokens: 1,
            total_tokens: 2,
            cost: Some(0.5),
        });
        assert_eq!(total.total_tokens, 17);
        assert_eq!(total.cost, Some(0.5));
    }

    #[test]
    fn test_request_serialization() {
        let request = CompletionRequest {
            model: "m".to_string(),
            messages: vec![RequestMessage::new(MessageRole::User, "hi")],
            tools: Vec::new(),
            temperature: None,
            max_tokens: Some(64),
            stream: false,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"maxTokens\":64"));
        assert!(!json.contains("tools"));
    }

    #[test]
    fn test_usage_sink_records() {
        let sink = crate::testing::CollectingUsage::default();
        let usage = Usage {
            prompt_tokens: 4,
            completion_tokens: 6,
            total_tokens: 10,
            cost: Some(0.002),
        };
        tokio_test::block_on(sink.record(UsageRecord::new("m", &usage))).unwrap();
        let records = sink.records.lock();
        assert_eq!(records[0].total_tokens, 10);
        assert_eq!(records[0].cost, Some(0.002));
    }
}

//! Test doubles for the collaborator traits

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use parking_lot::Mutex;

use crate::error::{EngineError, Result};
use crate::services::{
    Citation, CompletionChunk, CompletionClient, CompletionReply, CompletionRequest, CompletionResponse,
    RetrievalClient, RetrievalResult, ToolCall, Usage, UsageRecord, UsageSink,
};

/// One queued completion reply
#[derive(Debug, Clone)]
pub enum Scripted {
    Complete(CompletionResponse),
    Stream(Vec<CompletionChunk>),
    /// Streams the chunks, then never finishes
    Stall(Vec<CompletionChunk>),
    Fail(String),
}

/// Returns queued replies in order and records every request
#[derive(Default)]
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<CompletionRequest>>,
    calls: AtomicUsize,
}

impl ScriptedCompletion {
    pub fn new(replies: Vec<Scripted>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    pub fn text(content: &str) -> Scripted {
        Scripted::Complete(CompletionResponse {
            content: content.to_string(),
            tool_calls: Vec::new(),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 2,
                total_tokens: 12,
                cost: None,
            }),
        })
    }

    pub fn tool_call(id: &str, name: &str, arguments: serde_json::Value) -> Scripted {
        Scripted::Complete(CompletionResponse {
            content: String::new(),
            tool_calls: vec![ToolCall {
                id: id.to_string(),
                name: name.to_string(),
                arguments,
            }],
            usage: None,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request);
        let next = self.replies.lock().pop_front();
        match next {
            Some(Scripted::Complete(response)) => Ok(CompletionReply::Complete(response)),
            Some(Scripted::Stream(chunks)) => Ok(CompletionReply::Stream(Box::pin(stream::iter(
                chunks.into_iter().map(Ok),
            )))),
            Some(Scripted::Stall(chunks)) => Ok(CompletionReply::Stream(Box::pin(
                stream::iter(chunks.into_iter().map(Ok)).chain(stream::pending()),
            ))),
            Some(Scripted::Fail(message)) => Err(EngineError::Completion(message)),
            None => Err(EngineError::Completion("no scripted reply left".to_string())),
        }
    }
}

/// Answers every query with one passage per query
#[derive(Default)]
pub struct MemoryRetrieval {
    pub queries: Mutex<Vec<String>>,
}

#[async_trait]
impl RetrievalClient for MemoryRetrieval {
    async fn retrieve(&self, queries: &[String], store_id: &str, top_k: usize) -> Result<Vec<RetrievalResult>> {
        self.queries.lock().extend(queries.iter().cloned());
        Ok(queries
            .iter()
            .take(top_k)
            .map(|q| RetrievalResult {
                text: format!("passage about {}", q),
                score: 0.9,
                citation: Citation {
                    source: format!("{}/{}", store_id, q),
                    title: None,
                    locator: None,
                },
            })
            .collect())
    }
}

/// Accepts queries and never answers
#[derive(Default)]
pub struct StalledRetrieval {
    pub calls: AtomicUsize,
}

#[async_trait]
impl RetrievalClient for StalledRetrieval {
    async fn retrieve(&self, _queries: &[String], _store_id: &str, _top_k: usize) -> Result<Vec<RetrievalResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

/// Keeps every usage record
#[derive(Default)]
pub struct CollectingUsage {
    pub records: Mutex<Vec<UsageRecord>>,
}

#[async_trait]
impl UsageSink for CollectingUsage {
    async fn record(&self, record: UsageRecord) -> Result<()> {
        self.records.lock().push(record);
        Ok(())
    }
}

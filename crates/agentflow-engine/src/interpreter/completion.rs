//! Completion (agent) node executor
//!
//! Builds a request from the system prompt, the priority-ordered context
//! fragments, the conversation history and the payload as the user turn.
//! Tool calls returned by the model are executed against the node's
//! enabled providers and fed back for a bounded number of rounds.

use futures_util::StreamExt;
use serde_json::Value;

use crate::data::{CompletionData, MessageRole};
use crate::error::{EngineError, Result};
use crate::events::RunEvent;
use crate::services::{
    CompletionChunk, CompletionReply, CompletionRequest, CompletionResponse, RequestMessage, Usage, UsageRecord,
};
use crate::state::{ConversationEntry, ExecutionState};
use crate::tools::{collect_tools, invoke_tool, ToolRuntime};
use crate::types::Node;

use super::{NodeContext, Transition};

pub(super) async fn execute(node: &Node, data: &CompletionData, ctx: &mut NodeContext<'_, '_>) -> Result<Transition> {
    let client = ctx
        .collaborators
        .completion
        .clone()
        .ok_or(EngineError::MissingCollaborator("completion"))?;

    let tools = collect_tools(ctx.graph, &node.id, &mut *ctx.resolver, &*ctx.state, ctx.config)?;
    for fragment in &tools.context {
        if !ctx.state.context_messages().contains(fragment) {
            ctx.state.push_context(fragment.clone());
        }
    }
    let definitions = tools.definitions();
    if !definitions.is_empty() {
        ctx.trace(format!("'{}' offers {} tool(s)", node.id, definitions.len()));
    }

    let user_text = payload_text(&ctx.state.payload);
    let mut messages = build_messages(data, &*ctx.state, &user_text);
    let max_rounds = data.max_tool_rounds.unwrap_or(ctx.config.completion.max_tool_rounds);

    let mut usage: Option<Usage> = None;
    let mut round = 0;
    let reply_text = loop {
        if ctx.cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let offer_tools = round < max_rounds;
        let request = CompletionRequest {
            model: data.model.clone(),
            messages: messages.clone(),
            tools: if offer_tools { definitions.clone() } else { Vec::new() },
            temperature: data.temperature,
            max_tokens: data.max_tokens,
            stream: data.stream,
        };

        let reply = tokio::select! {
            result = client.complete(request) => result?,
            _ = ctx.cancel.cancelled() => return Err(EngineError::Cancelled),
        };
        let response = collect_reply(node, reply, ctx).await?;
        if let Some(reported) = &response.usage {
            usage.get_or_insert_with(Usage::default).add(reported);
        }

        if response.tool_calls.is_empty() || !offer_tools {
            if !response.tool_calls.is_empty() {
                log::warn!(
                    "'{}' ignored {} tool call(s) after {} round(s)",
                    node.id,
                    response.tool_calls.len(),
                    round
                );
            }
            break response.content;
        }
        round += 1;

        let mut assistant = RequestMessage::new(MessageRole::Assistant, response.content.clone());
        assistant.tool_calls = response.tool_calls.clone();
        messages.push(assistant);

        for call in &response.tool_calls {
            if ctx.cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            ctx.trace(format!("'{}' calls tool '{}'", node.id, call.name));
            let result = match tools.find(&call.name) {
                Some(binding) => {
                    let mut runtime = ToolRuntime {
                        graph: ctx.graph,
                        state: &mut *ctx.state,
                        resolver: &mut *ctx.resolver,
                        collaborators: ctx.collaborators,
                        config: ctx.config,
                        cancel: ctx.cancel,
                    };
                    invoke_tool(binding, call, &mut runtime).await?
                }
                None => serde_json::json!({"error": format!("unknown tool '{}'", call.name)}),
            };
            let mut message = RequestMessage::new(MessageRole::Tool, result.to_string());
            message.tool_call_id = Some(call.id.clone());
            messages.push(message);
        }
    };

    if !user_text.is_empty() {
        ctx.state
            .conversation
            .push(ConversationEntry::new(MessageRole::User, user_text));
    }
    ctx.state
        .conversation
        .push(ConversationEntry::new(MessageRole::Assistant, reply_text.clone()));
    ctx.state.payload = Value::String(reply_text);

    if let Some(usage) = usage {
        ctx.emit(RunEvent::Usage {
            execution_id: ctx.execution_id.to_string(),
            node_id: node.id.clone(),
            model: data.model.clone(),
            usage,
        });
        if let Some(sink) = &ctx.collaborators.usage {
            sink.record(UsageRecord::new(data.model.clone(), &usage)).await?;
        }
    }

    Ok(Transition::next())
}

/// Drain a reply, forwarding assistant text as it arrives
async fn collect_reply(node: &Node, reply: CompletionReply, ctx: &NodeContext<'_, '_>) -> Result<CompletionResponse> {
    let delta = |text: &str| {
        ctx.emit(RunEvent::AssistantDelta {
            execution_id: ctx.execution_id.to_string(),
            node_id: node.id.clone(),
            delta: text.to_string(),
        })
    };

    match reply {
        CompletionReply::Complete(response) => {
            if !response.content.is_empty() {
                delta(&response.content);
            }
            Ok(response)
        }
        CompletionReply::Stream(mut stream) => {
            let mut response = CompletionResponse::default();
            loop {
                let chunk = tokio::select! {
                    chunk = stream.next() => chunk,
                    _ = ctx.cancel.cancelled() => return Err(EngineError::Cancelled),
                };
                match chunk {
                    None => break,
                    Some(chunk) => match chunk? {
                        CompletionChunk::Text(text) => {
                            delta(&text);
                            response.content.push_str(&text);
                        }
                        CompletionChunk::ToolCall(call) => response.tool_calls.push(call),
                        CompletionChunk::Usage(usage) => response.usage = Some(usage),
                    },
                }
            }
            Ok(response)
        }
    }
}

fn payload_text(payload: &Value) -> String {
    match payload {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn build_messages(data: &CompletionData, state: &ExecutionState, user_text: &str) -> Vec<RequestMessage> {
    let mut messages = Vec::new();
    if !data.system_prompt.trim().is_empty() {
        messages.push(RequestMessage::new(MessageRole::System, data.system_prompt.clone()));
    }
    messages.extend(
        state
            .context_messages()
            .iter()
            .map(|m| RequestMessage::new(m.role, m.text.clone())),
    );
    messages.extend(state.conversation.iter().map(|entry| {
        let mut message = RequestMessage::new(entry.role, entry.content.clone());
        message.tool_call_id = entry.tool_call_id.clone();
        message
    }));
    if !user_text.is_empty() {
        messages.push(RequestMessage::new(MessageRole::User, user_text));
    }
    messages
}

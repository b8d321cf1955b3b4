//! Tool provider aggregation
//!
//! Provider nodes never sit on the control-flow chain. They are wired into a
//! consumer's reserved `tools` port and optionally gated through their own
//! `enable` data port. When a completion node runs it collects its enabled
//! providers, turns each into a tool definition for the model, and executes
//! the model's tool calls against them.

use std::collections::{HashMap, HashSet};

use rand::seq::SliceRandom;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::constants::{DISABLED_STRINGS, ENABLED_STRINGS, ENABLE_PORT, TOOLS_PORT};
use crate::data::{
    DocumentReaderData, GlobalStateData, NodeKind, RandomizerData, RetrievalData,
};
use crate::dataflow::DataflowResolver;
use crate::error::{EngineError, Result};
use crate::registry::definition_of;
use crate::services::{Collaborators, ToolCall, ToolDefinition};
use crate::state::{ContextMessage, ExecutionState};
use crate::types::{Edge, Graph, Node, NodeId, NodeType};

const RETRIEVAL_TOOL: &str = "search_knowledge";
const DOCUMENT_TOOL: &str = "read_document";
const GLOBAL_STATE_TOOL: &str = "global_state";
const DEFAULT_RANDOM_TOOL: &str = "random_choice";

const DEFAULT_RETRIEVAL_GUIDANCE: &str = "You can search the knowledge store with the search_knowledge tool. \
Write short, specific queries that name the entities and facts you need, \
use several queries for different aspects of the question, and cite the sources you rely on.";

/// A tool offered to the model together with the provider that serves it
#[derive(Debug, Clone, PartialEq)]
pub struct ToolBinding {
    pub provider_id: NodeId,
    pub provider_type: NodeType,
    pub definition: ToolDefinition,
}

/// Tools and context collected for one consumer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolSet {
    pub tools: Vec<ToolBinding>,
    /// Fragments contributed by providers (e.g. retrieval query guidance)
    pub context: Vec<ContextMessage>,
}

impl ToolSet {
    /// Tool definitions in discovery order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition.clone()).collect()
    }

    pub fn find(&self, name: &str) -> Option<&ToolBinding> {
        self.tools.iter().find(|t| t.definition.name == name)
    }
}

/// Edges into the consumer's `tools` port, ordered by (source id, edge id)
pub fn provider_edges<'g>(graph: &'g Graph, consumer_id: &str) -> Vec<&'g Edge> {
    let mut edges: Vec<&'g Edge> = graph
        .incoming_edges(consumer_id)
        .filter(|e| e.target_port.as_deref() == Some(TOOLS_PORT))
        .collect();
    edges.sort_by(|a, b| a.source.cmp(&b.source).then_with(|| a.id.cmp(&b.id)));
    edges
}

/// Interpret a resolved `enable` value
pub fn is_enabled(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => {
            let normalized = s.trim().to_ascii_lowercase();
            if ENABLED_STRINGS.contains(&normalized.as_str()) {
                true
            } else if DISABLED_STRINGS.contains(&normalized.as_str()) {
                false
            } else {
                !s.is_empty()
            }
        }
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Collect the enabled tool providers wired into `consumer_id`.
///
/// Fails when a single-instance provider type is enabled more than once.
pub fn collect_tools(
    graph: &Graph,
    consumer_id: &str,
    resolver: &mut DataflowResolver<'_>,
    state: &ExecutionState,
    config: &EngineConfig,
) -> Result<ToolSet> {
    let mut set = ToolSet::default();
    let mut names = HashSet::new();
    let mut singles: HashMap<NodeType, NodeId> = HashMap::new();

    for edge in provider_edges(graph, consumer_id) {
        let Some(provider) = graph.find_node(&edge.source) else {
            continue;
        };
        if !provider.node_type.is_tool_provider() {
            log::warn!(
                "Node '{}' is wired into the tools port of '{}' but provides no tool",
                provider.id,
                consumer_id
            );
            continue;
        }
        if provider.data.muted {
            log::debug!("Tool provider '{}' is muted", provider.id);
            continue;
        }
        let enabled = if resolver.is_connected(&provider.id, ENABLE_PORT) {
            resolver
                .resolve_input(&provider.id, ENABLE_PORT, state)
                .is_some_and(|v| is_enabled(&v))
        } else {
            true
        };
        if !enabled {
            log::debug!("Tool provider '{}' is disabled", provider.id);
            continue;
        }

        if definition_of(provider.node_type).single_per_consumer {
            if let Some(first) = singles.insert(provider.node_type, provider.id.clone()) {
                return Err(EngineError::config(format!(
                    "'{}' has more than one {} provider ('{}' and '{}')",
                    consumer_id,
                    definition_of(provider.node_type).label,
                    first,
                    provider.id
                )));
            }
        }

        let Some(definition) = tool_definition(provider) else {
            continue;
        };
        if !names.insert(definition.name.clone()) {
            log::debug!(
                "Skipping duplicate tool '{}' from provider '{}'",
                definition.name,
                provider.id
            );
            continue;
        }
        if let Some(guidance) = provider_guidance(provider, config) {
            set.context.push(guidance);
        }
        set.tools.push(ToolBinding {
            provider_id: provider.id.clone(),
            provider_type: provider.node_type,
            definition,
        });
    }

    Ok(set)
}

/// The tool a provider node exposes
pub fn tool_definition(node: &Node) -> Option<ToolDefinition> {
    match &node.data.kind {
        NodeKind::Randomizer(data) => Some(randomizer_tool(data)),
        NodeKind::Retrieval(data) => Some(retrieval_tool(data)),
        NodeKind::DocumentReader(data) => Some(document_tool(data)),
        NodeKind::GlobalState(data) => Some(global_state_tool(data)),
        _ => None,
    }
}

fn provider_guidance(node: &Node, config: &EngineConfig) -> Option<ContextMessage> {
    let NodeKind::Retrieval(data) = &node.data.kind else {
        return None;
    };
    let text = if data.guidance.trim().is_empty() {
        DEFAULT_RETRIEVAL_GUIDANCE.to_string()
    } else {
        data.guidance.clone()
    };
    Some(ContextMessage::system(text, config.context.retrieval_guidance_priority).from_node(&node.id))
}

fn randomizer_tool(data: &RandomizerData) -> ToolDefinition {
    let name = if data.tool_name.trim().is_empty() {
        DEFAULT_RANDOM_TOOL.to_string()
    } else {
        data.tool_name.trim().to_string()
    };
    ToolDefinition {
        name,
        description: data.description.clone(),
        parameters: json!({"type": "object", "properties": {}, "additionalProperties": false}),
    }
}

fn retrieval_tool(data: &RetrievalData) -> ToolDefinition {
    let max_queries = data.max_queries.max(1);
    ToolDefinition {
        name: RETRIEVAL_TOOL.to_string(),
        description: format!(
            "Search the knowledge store. Provide between 1 and {} queries.",
            max_queries
        ),
        parameters: json!({
            "type": "object",
            "properties": {
                "queries": {
                    "type": "array",
                    "items": {"type": "string"},
                    "minItems": 1,
                    "maxItems": max_queries
                }
            },
            "required": ["queries"]
        }),
    }
}

fn document_tool(data: &DocumentReaderData) -> ToolDefinition {
    let ids: Vec<&str> = data.documents.iter().map(|d| d.id.as_str()).collect();
    let listing = data
        .documents
        .iter()
        .map(|d| format!("{} ({})", d.id, d.title))
        .collect::<Vec<_>>()
        .join(", ");
    ToolDefinition {
        name: DOCUMENT_TOOL.to_string(),
        description: format!("Read an attached document. Available: {}", listing),
        parameters: json!({
            "type": "object",
            "properties": {"id": {"type": "string", "enum": ids}},
            "required": ["id"]
        }),
    }
}

fn global_state_tool(data: &GlobalStateData) -> ToolDefinition {
    let actions = if data.allow_write {
        vec!["get", "set"]
    } else {
        vec!["get"]
    };
    ToolDefinition {
        name: GLOBAL_STATE_TOOL.to_string(),
        description: "Read or write shared variables by dot-separated path.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "action": {"type": "string", "enum": actions},
                "path": {"type": "string"},
                "value": {}
            },
            "required": ["action", "path"]
        }),
    }
}

/// Mutable context a tool call may touch
pub struct ToolRuntime<'a, 'g> {
    pub graph: &'g Graph,
    pub state: &'a mut ExecutionState,
    pub resolver: &'a mut DataflowResolver<'g>,
    pub collaborators: &'a Collaborators,
    pub config: &'a EngineConfig,
    pub cancel: &'a CancellationToken,
}

fn tool_error(message: impl Into<String>) -> Value {
    json!({"error": message.into()})
}

/// Execute one tool call against its provider.
///
/// Bad arguments are reported back to the model as an `error` result;
/// collaborator failures and cancellation fail the call.
pub async fn invoke_tool(binding: &ToolBinding, call: &ToolCall, runtime: &mut ToolRuntime<'_, '_>) -> Result<Value> {
    let graph = runtime.graph;
    let Some(node) = graph.find_node(&binding.provider_id) else {
        return Ok(tool_error(format!("provider '{}' no longer exists", binding.provider_id)));
    };
    log::debug!("Invoking tool '{}' on provider '{}'", call.name, node.id);

    match &node.data.kind {
        NodeKind::Randomizer(data) => Ok(pick_random(data)),
        NodeKind::DocumentReader(data) => Ok(read_document(data, &call.arguments)),
        NodeKind::GlobalState(data) => Ok(global_state(data, &call.arguments, runtime)),
        NodeKind::Retrieval(data) => search(node, data, &call.arguments, runtime).await,
        _ => Ok(tool_error(format!("'{}' is not a tool provider", node.id))),
    }
}

fn pick_random(data: &RandomizerData) -> Value {
    match data.choices.choose(&mut rand::thread_rng()) {
        Some(choice) => json!({"choice": choice}),
        None => tool_error("no choices configured"),
    }
}

fn read_document(data: &DocumentReaderData, args: &Value) -> Value {
    let Some(id) = args.get("id").and_then(Value::as_str) else {
        return tool_error("missing 'id'");
    };
    let Some(doc) = data.documents.iter().find(|d| d.id == id) else {
        return tool_error(format!("unknown document '{}'", id));
    };
    let truncated = doc.text.chars().count() > data.max_chars;
    let text: String = doc.text.chars().take(data.max_chars).collect();
    json!({"id": doc.id, "title": doc.title, "text": text, "truncated": truncated})
}

fn scoped_path(data: &GlobalStateData, path: &str) -> String {
    let scope = data.scope.trim().trim_end_matches('.');
    if scope.is_empty() {
        path.to_string()
    } else {
        format!("{}.{}", scope, path)
    }
}

fn global_state(data: &GlobalStateData, args: &Value, runtime: &mut ToolRuntime<'_, '_>) -> Value {
    let Some(path) = args.get("path").and_then(Value::as_str) else {
        return tool_error("missing 'path'");
    };
    let path = scoped_path(data, path);
    match args.get("action").and_then(Value::as_str) {
        Some("get") => json!({"value": runtime.state.get_var(&path).cloned().unwrap_or(Value::Null)}),
        Some("set") if !data.allow_write => tool_error("writes are not allowed"),
        Some("set") => {
            let value = args.get("value").cloned().unwrap_or(Value::Null);
            match runtime.state.set_var(&path, value) {
                Ok(()) => {
                    runtime.resolver.invalidate();
                    json!({"ok": true})
                }
                Err(e) => tool_error(e.to_string()),
            }
        }
        _ => tool_error("'action' must be 'get' or 'set'"),
    }
}

async fn search(
    node: &Node,
    data: &RetrievalData,
    args: &Value,
    runtime: &mut ToolRuntime<'_, '_>,
) -> Result<Value> {
    let mut queries: Vec<String> = match args.get("queries") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(q)) if !q.trim().is_empty() => vec![q.trim().to_string()],
        _ => Vec::new(),
    };
    if queries.is_empty() {
        return Ok(tool_error("provide at least one query"));
    }
    queries.truncate(data.max_queries.max(1) as usize);

    let client = runtime
        .collaborators
        .retrieval
        .clone()
        .ok_or(EngineError::MissingCollaborator("retrieval"))?;
    if runtime.cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }

    let results = tokio::select! {
        r = client.retrieve(&queries, &data.store_id, data.top_k.max(1) as usize) => r?,
        _ = runtime.cancel.cancelled() => return Err(EngineError::Cancelled),
    };
    log::debug!(
        "Retrieval provider '{}' returned {} results for {} queries",
        node.id,
        results.len(),
        queries.len()
    );

    let priority = runtime.config.context.default_fragment_priority;
    for result in &results {
        let source = match &result.citation.title {
            Some(title) => format!("{} ({})", title, result.citation.source),
            None => result.citation.source.clone(),
        };
        runtime.state.push_context(
            ContextMessage::system(format!("[{}] {}", source, result.text), priority)
                .from_node(&node.id)
                .synthesized(),
        );
    }

    Ok(json!({
        "results": results
            .iter()
            .map(|r| json!({"text": r.text, "score": r.score, "citation": r.citation}))
            .collect::<Vec<_>>()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;
    use crate::data::{DocumentEntry, TransformData, ScriptMode};
    use crate::expression::BoaScriptEngine;
    use crate::services::{RetrievalClient, RetrievalResult, Citation};
    use crate::testing::StalledRetrieval;
    use async_trait::async_trait;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn resolver(graph: &Graph) -> DataflowResolver<'_> {
        DataflowResolver::new(graph, Arc::new(BoaScriptEngine::default()))
    }

    fn randomizer(name: &str) -> NodeKind {
        NodeKind::Randomizer(RandomizerData {
            tool_name: name.to_string(),
            description: "pick".to_string(),
            choices: vec!["heads".to_string(), "tails".to_string()],
        })
    }

    fn gate(source: &str) -> NodeKind {
        NodeKind::Transform(TransformData {
            mode: ScriptMode::Expression,
            source: source.to_string(),
        })
    }

    fn consumer() -> GraphBuilder {
        GraphBuilder::new().start("start").add_node("llm", NodeType::Completion).end("end")
    }

    #[test]
    fn test_is_enabled() {
        for v in [json!(true), json!(1), json!("yes"), json!("ON"), json!("1"), json!("anything")] {
            assert!(is_enabled(&v), "{} should be enabled", v);
        }
        for v in [json!(false), json!(0), json!("no"), json!("off"), json!("false"), json!("0"), Value::Null] {
            assert!(!is_enabled(&v), "{} should be disabled", v);
        }
    }

    #[test]
    fn test_duplicate_tool_names_deduplicated() {
        let graph = consumer()
            .add("rand-b", randomizer("coin"))
            .add("rand-a", randomizer("coin"))
            .connect("rand-b", "tools", "llm", "tools")
            .connect("rand-a", "tools", "llm", "tools")
            .build();
        let state = ExecutionState::default();
        let mut resolver = resolver(&graph);

        let first = collect_tools(&graph, "llm", &mut resolver, &state, &EngineConfig::default()).unwrap();
        assert_eq!(first.tools.len(), 1);
        assert_eq!(first.tools[0].provider_id, "rand-a");

        let second = collect_tools(&graph, "llm", &mut resolver, &state, &EngineConfig::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_enable_gate_and_mute() {
        let graph = consumer()
            .add("on", randomizer("on_tool"))
            .add("off", randomizer("off_tool"))
            .add("muted", randomizer("muted_tool"))
            .muted()
            .add("gate", gate("vars.allow"))
            .connect("on", "tools", "llm", "tools")
            .connect("off", "tools", "llm", "tools")
            .connect("muted", "tools", "llm", "tools")
            .connect("gate", "out", "off", "enable")
            .build();
        let state = ExecutionState::default().with_vars(json!({"allow": "no"}));
        let mut resolver = resolver(&graph);

        let set = collect_tools(&graph, "llm", &mut resolver, &state, &EngineConfig::default()).unwrap();
        let names: Vec<_> = set.tools.iter().map(|t| t.definition.name.as_str()).collect();
        assert_eq!(names, vec!["on_tool"]);

        let state = ExecutionState::default().with_vars(json!({"allow": "yes"}));
        resolver.invalidate();
        let set = collect_tools(&graph, "llm", &mut resolver, &state, &EngineConfig::default()).unwrap();
        let names: Vec<_> = set.tools.iter().map(|t| t.definition.name.as_str()).collect();
        assert_eq!(names, vec!["off_tool", "on_tool"]);
    }

    #[test]
    fn test_retrieval_schema_and_guidance() {
        let graph = consumer()
            .add(
                "kb",
                NodeKind::Retrieval(RetrievalData {
                    store_id: "docs".to_string(),
                    max_queries: 2,
                    ..RetrievalData::default()
                }),
            )
            .connect("kb", "tools", "llm", "tools")
            .build();
        let state = ExecutionState::default();
        let mut resolver = resolver(&graph);
        let config = EngineConfig::default();

        let set = collect_tools(&graph, "llm", &mut resolver, &state, &config).unwrap();
        assert_eq!(set.tools[0].definition.parameters["properties"]["queries"]["maxItems"], json!(2));
        assert_eq!(set.context.len(), 1);
        assert_eq!(set.context[0].priority, config.context.retrieval_guidance_priority);
        assert_eq!(set.context[0].source_node_id.as_deref(), Some("kb"));
    }

    #[test]
    fn test_duplicate_single_instance_provider_is_error() {
        let graph = consumer()
            .add("kb-1", NodeKind::Retrieval(RetrievalData::default()))
            .add("kb-2", NodeKind::Retrieval(RetrievalData::default()))
            .connect("kb-1", "tools", "llm", "tools")
            .connect("kb-2", "tools", "llm", "tools")
            .build();
        let mut resolver = resolver(&graph);
        let result = collect_tools(&graph, "llm", &mut resolver, &ExecutionState::default(), &EngineConfig::default());
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    }

    struct FixedRetrieval;

    #[async_trait]
    impl RetrievalClient for FixedRetrieval {
        async fn retrieve(&self, queries: &[String], store_id: &str, top_k: usize) -> Result<Vec<RetrievalResult>> {
            Ok((0..top_k.min(queries.len()))
                .map(|i| RetrievalResult {
                    text: format!("{} hit for {}", store_id, queries[i]),
                    score: 1.0 - i as f64 / 10.0,
                    citation: Citation {
                        source: format!("doc-{}", i),
                        title: None,
                        locator: None,
                    },
                })
                .collect())
        }
    }

    fn binding(provider_id: &str, provider_type: NodeType, graph: &Graph) -> ToolBinding {
        ToolBinding {
            provider_id: provider_id.to_string(),
            provider_type,
            definition: tool_definition(graph.find_node(provider_id).unwrap()).unwrap(),
        }
    }

    fn call(name: &str, arguments: Value) -> ToolCall {
        ToolCall {
            id: "call-1".to_string(),
            name: name.to_string(),
            arguments,
        }
    }

    #[tokio::test]
    async fn test_retrieval_tool_adds_synthesized_context() {
        let graph = consumer()
            .add(
                "kb",
                NodeKind::Retrieval(RetrievalData {
                    store_id: "docs".to_string(),
                    top_k: 5,
                    max_queries: 2,
                    guidance: String::new(),
                }),
            )
            .build();
        let mut state = ExecutionState::default();
        let mut resolver = resolver(&graph);
        let collaborators = Collaborators::new().with_retrieval(Arc::new(FixedRetrieval));
        let config = EngineConfig::default();
        let cancel = CancellationToken::new();
        let mut runtime = ToolRuntime {
            graph: &graph,
            state: &mut state,
            resolver: &mut resolver,
            collaborators: &collaborators,
            config: &config,
            cancel: &cancel,
        };

        let result = invoke_tool(
            &binding("kb", NodeType::Retrieval, &graph),
            &call(RETRIEVAL_TOOL, json!({"queries": ["a", "b", "c"]})),
            &mut runtime,
        )
        .await
        .unwrap();

        assert_eq!(result["results"].as_array().unwrap().len(), 2);
        assert_eq!(state.context_messages().len(), 2);
        assert!(state.context_messages().iter().all(|m| m.synthesized));
        assert!(state.context_messages()[0].text.contains("docs hit for a"));
    }

    #[tokio::test]
    async fn test_retrieval_without_client_fails() {
        let graph = consumer().add("kb", NodeKind::Retrieval(RetrievalData::default())).build();
        let mut state = ExecutionState::default();
        let mut resolver = resolver(&graph);
        let collaborators = Collaborators::new();
        let config = EngineConfig::default();
        let cancel = CancellationToken::new();
        let mut runtime = ToolRuntime {
            graph: &graph,
            state: &mut state,
            resolver: &mut resolver,
            collaborators: &collaborators,
            config: &config,
            cancel: &cancel,
        };
        let result = invoke_tool(
            &binding("kb", NodeType::Retrieval, &graph),
            &call(RETRIEVAL_TOOL, json!({"queries": ["a"]})),
            &mut runtime,
        )
        .await;
        assert!(matches!(result, Err(EngineError::MissingCollaborator("retrieval"))));
    }

    #[tokio::test]
    async fn test_cancel_while_retrieval_is_pending() {
        let graph = consumer().add("kb", NodeKind::Retrieval(RetrievalData::default())).build();
        let mut state = ExecutionState::default();
        let mut resolver = resolver(&graph);
        let stalled = Arc::new(StalledRetrieval::default());
        let collaborators = Collaborators::new().with_retrieval(stalled.clone());
        let config = EngineConfig::default();
        let cancel = CancellationToken::new();
        let mut runtime = ToolRuntime {
            graph: &graph,
            state: &mut state,
            resolver: &mut resolver,
            collaborators: &collaborators,
            config: &config,
            cancel: &cancel,
        };
        let b = binding("kb", NodeType::Retrieval, &graph);
        let c = call(RETRIEVAL_TOOL, json!({"queries": ["a"]}));

        let trigger = async {
            while stalled.calls.load(Ordering::SeqCst) == 0 {
                tokio::task::yield_now().await;
            }
            cancel.cancel();
        };
        let (result, ()) = tokio::join!(invoke_tool(&b, &c, &mut runtime), trigger);

        assert!(matches!(result, Err(EngineError::Cancelled)));
        assert_eq!(stalled.calls.load(Ordering::SeqCst), 1);
        assert!(state.context_messages().is_empty());
    }

    #[tokio::test]
    async fn test_global_state_tool_writes_vars() {
        let graph = consumer()
            .add(
                "state",
                NodeKind::GlobalState(GlobalStateData {
                    allow_write: true,
                    scope: "agent".to_string(),
                }),
            )
            .build();
        let mut state = ExecutionState::default();
        let before = state.vars_generation();
        let mut resolver = resolver(&graph);
        let collaborators = Collaborators::new();
        let config = EngineConfig::default();
        let cancel = CancellationToken::new();
        let mut runtime = ToolRuntime {
            graph: &graph,
            state: &mut state,
            resolver: &mut resolver,
            collaborators: &collaborators,
            config: &config,
            cancel: &cancel,
        };
        let b = binding("state", NodeType::GlobalState, &graph);

        let set = invoke_tool(&b, &call(GLOBAL_STATE_TOOL, json!({"action": "set", "path": "mood", "value": "happy"})), &mut runtime)
            .await
            .unwrap();
        assert_eq!(set, json!({"ok": true}));
        let get = invoke_tool(&b, &call(GLOBAL_STATE_TOOL, json!({"action": "get", "path": "mood"})), &mut runtime)
            .await
            .unwrap();
        assert_eq!(get, json!({"value": "happy"}));

        assert_eq!(state.get_var("agent.mood"), Some(&json!("happy")));
        assert!(state.vars_generation() > before);
    }

    #[test]
    fn test_document_reader_truncates() {
        let data = DocumentReaderData {
            documents: vec![DocumentEntry {
                id: "faq".to_string(),
                title: "FAQ".to_string(),
                text: "abcdef".to_string(),
            }],
            max_chars: 3,
        };
        assert_eq!(
            read_document(&data, &json!({"id": "faq"})),
            json!({"id": "faq", "title": "FAQ", "text": "abc", "truncated": true})
        );
        assert!(read_document(&data, &json!({"id": "nope"})).get("error").is_some());
    }

    #[test]
    fn test_randomizer_picks_configured_choice() {
        let data = RandomizerData {
            choices: vec!["only".to_string()],
            ..RandomizerData::default()
        };
        assert_eq!(pick_random(&data), json!({"choice": "only"}));
        assert!(pick_random(&RandomizerData::default()).get("error").is_some());
    }
}

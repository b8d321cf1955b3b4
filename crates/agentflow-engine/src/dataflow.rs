//! Demand-driven resolution of data ports
//!
//! Control-flow nodes publish their output into `ExecutionState::node_outputs`
//! when the interpreter runs them. Pure nodes (GetVariable, Transform) are
//! never scheduled; their value is pulled on demand whenever something reads
//! a data port wired to them, and memoized.
//!
//! # Cache keys
//!
//! A cached value is reused only when its key matches. The key covers:
//!
//! - the node id and a hash of its configuration
//! - a hash of its resolved upstream input
//! - the vars generation, which advances on every variable write
//!
//! so a SetVariable (or a global-state tool write) makes every memoized read
//! of `vars` stale without hashing the whole tree on each lookup.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::constants::DEFAULT_INPUT_PORT;
use crate::data::{NodeKind, ScriptMode};
use crate::expression::{LogSink, ScriptEngine, ScriptScope};
use crate::state::ExecutionState;
use crate::types::{Graph, Node, NodeId};

/// Cached value of a pure node
#[derive(Debug, Clone)]
pub struct CachedValue {
    pub key: String,
    pub value: Value,
}

/// Statistics about the resolver's cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of nodes with cached values
    pub cached_nodes: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Lazy, memoized resolver for one run
pub struct DataflowResolver<'g> {
    graph: &'g Graph,
    engine: Arc<dyn ScriptEngine>,
    cache: HashMap<NodeId, CachedValue>,
    log: Option<LogSink>,
    hits: u64,
    misses: u64,
}

impl<'g> DataflowResolver<'g> {
    pub fn new(graph: &'g Graph, engine: Arc<dyn ScriptEngine>) -> Self {
        Self {
            graph,
            engine,
            cache: HashMap::new(),
            log: None,
            hits: 0,
            misses: 0,
        }
    }

    /// Forward script `log(...)` lines of pure nodes to `sink`
    pub fn with_log(mut self, sink: LogSink) -> Self {
        self.log = Some(sink);
        self
    }

    /// Resolve the value a node currently provides, or `None` for null
    pub fn resolve(&mut self, node_id: &str, state: &ExecutionState) -> Option<Value> {
        let mut visited = HashSet::new();
        self.resolve_node(node_id, state, &mut visited)
    }

    /// Resolve the value flowing into `port` of `node_id`.
    ///
    /// `None` when nothing is wired to the port.
    pub fn resolve_input(&mut self, node_id: &str, port: &str, state: &ExecutionState) -> Option<Value> {
        let mut visited = HashSet::new();
        self.resolve_port(node_id, port, state, &mut visited)
    }

    /// Whether any edge is wired into `port` of `node_id`
    pub fn is_connected(&self, node_id: &str, port: &str) -> bool {
        self.edge_into(node_id, port).is_some()
    }

    /// Drop every cached value
    pub fn invalidate(&mut self) {
        if !self.cache.is_empty() {
            log::debug!("Invalidating {} cached pure-node values", self.cache.len());
        }
        self.cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            cached_nodes: self.cache.len(),
            hits: self.hits,
            misses: self.misses,
        }
    }

    fn edge_into(&self, node_id: &str, port: &str) -> Option<&'g crate::types::Edge> {
        let graph = self.graph;
        let mut candidates: Vec<&'g crate::types::Edge> = graph
            .incoming_edges(node_id)
            .filter(|e| match e.target_port.as_deref() {
                Some(p) => p == port,
                None => port == DEFAULT_INPUT_PORT,
            })
            .collect();
        candidates.sort_by(|a, b| a.id.cmp(&b.id));
        candidates.into_iter().next()
    }

    fn resolve_port(
        &mut self,
        node_id: &str,
        port: &str,
        state: &ExecutionState,
        visited: &mut HashSet<NodeId>,
    ) -> Option<Value> {
        let source = self.edge_into(node_id, port)?.source.clone();
        self.resolve_node(&source, state, visited)
    }

    fn resolve_node(
        &mut self,
        node_id: &str,
        state: &ExecutionState,
        visited: &mut HashSet<NodeId>,
    ) -> Option<Value> {
        if !visited.insert(node_id.to_string()) {
            log::warn!("Data dependency cycle through node '{}'", node_id);
            return None;
        }
        let graph = self.graph;
        let node = graph.find_node(node_id)?;

        if !node.node_type.is_pure() {
            return state.node_outputs.get(node_id).cloned();
        }

        // An unwired pure node reads the current payload; a wired one sees
        // its upstream value, null included
        let input = match self.edge_into(node_id, DEFAULT_INPUT_PORT) {
            Some(edge) => self
                .resolve_node(&edge.source, state, visited)
                .unwrap_or(Value::Null),
            None => state.payload.clone(),
        };
        let key = cache_key(node, &input, state.vars_generation());

        if let Some(cached) = self.cache.get(node_id) {
            if cached.key == key {
                self.hits += 1;
                return null_to_none(cached.value.clone());
            }
        }

        self.misses += 1;
        let value = self.compute(node, input, state);
        self.cache.insert(
            node_id.to_string(),
            CachedValue {
                key,
                value: value.clone(),
            },
        );
        null_to_none(value)
    }

    fn compute(&self, node: &Node, input: Value, state: &ExecutionState) -> Value {
        match &node.data.kind {
            NodeKind::GetVariable(data) => state
                .get_var(&data.path)
                .cloned()
                .or_else(|| data.default_value.clone())
                .unwrap_or(Value::Null),
            NodeKind::Transform(data) => {
                let scope = ScriptScope::from_state(state, input).with_log(self.log.clone());
                let outcome = match data.mode {
                    ScriptMode::Expression => self.engine.evaluate(&data.source, &scope),
                    ScriptMode::Function => {
                        self.engine
                            .evaluate_function_body(&data.source, &scope, &Map::new())
                    }
                };
                match outcome.error {
                    Some(error) => {
                        log::warn!("Transform '{}' failed: {}", node.id, error);
                        Value::Null
                    }
                    None => outcome.value,
                }
            }
            _ => Value::Null,
        }
    }
}

fn null_to_none(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        other => Some(other),
    }
}

fn hash_json(value: &impl serde::Serialize) -> String {
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    blake3::hash(&bytes).to_hex().as_str()[..16].to_string()
}

fn cache_key(node: &Node, input: &Value, vars_generation: u64) -> String {
    format!(
        "{}:{}:{}:{}",
        node.id,
        hash_json(&node.data.kind),
        hash_json(input),
        vars_generation
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;
    use crate::data::{GetVariableData, TransformData};
    use crate::expression::BoaScriptEngine;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn engine() -> Arc<dyn ScriptEngine> {
        Arc::new(BoaScriptEngine::default())
    }

    fn transform(source: &str) -> NodeKind {
        NodeKind::Transform(TransformData {
            mode: ScriptMode::Expression,
            source: source.to_string(),
        })
    }

    fn get_var(path: &str) -> NodeKind {
        NodeKind::GetVariable(GetVariableData {
            path: path.to_string(),
            default_value: None,
        })
    }

    #[test]
    fn test_get_variable_reads_vars() {
        let graph = GraphBuilder::new().add("name", get_var("user.name")).build();
        let state = ExecutionState::default().with_vars(json!({"user": {"name": "Ada"}}));
        let mut resolver = DataflowResolver::new(&graph, engine());
        assert_eq!(resolver.resolve("name", &state), Some(json!("Ada")));
    }

    #[test]
    fn test_get_variable_default() {
        let graph = GraphBuilder::new()
            .add(
                "name",
                NodeKind::GetVariable(GetVariableData {
                    path: "user.name".to_string(),
                    default_value: Some(json!("anonymous")),
                }),
            )
            .build();
        let mut resolver = DataflowResolver::new(&graph, engine());
        assert_eq!(resolver.resolve("name", &ExecutionState::default()), Some(json!("anonymous")));
    }

    #[test]
    fn test_transform_chain_uses_upstream_input() {
        let graph = GraphBuilder::new()
            .add("count", get_var("count"))
            .add("double", transform("input * 2"))
            .connect("count", "out", "double", "in")
            .build();
        let state = ExecutionState::default().with_vars(json!({"count": 21}));
        let mut resolver = DataflowResolver::new(&graph, engine());
        assert_eq!(resolver.resolve("double", &state), Some(json!(42)));
    }

    #[test]
    fn test_second_resolution_served_from_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let sink: LogSink = Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let graph = GraphBuilder::new()
            .add(
                "t",
                NodeKind::Transform(TransformData {
                    mode: ScriptMode::Function,
                    source: "log('computing'); return vars.count + 1;".to_string(),
                }),
            )
            .build();
        let state = ExecutionState::default().with_vars(json!({"count": 1}));
        let mut resolver = DataflowResolver::new(&graph, engine()).with_log(sink);

        let first = resolver.resolve("t", &state);
        let second = resolver.resolve("t", &state);
        assert_eq!(first, Some(json!(2)));
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = resolver.cache_stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
    }

    #[test]
    fn test_vars_write_invalidates_transitively() {
        let graph = GraphBuilder::new()
            .add("count", get_var("count"))
            .add("label", transform("'count=' + input"))
            .connect("count", "out", "label", "in")
            .build();
        let mut state = ExecutionState::default().with_vars(json!({"count": 1}));
        let mut resolver = DataflowResolver::new(&graph, engine());
        assert_eq!(resolver.resolve("label", &state), Some(json!("count=1")));

        state.set_var("count", json!(2)).unwrap();
        assert_eq!(resolver.resolve("label", &state), Some(json!("count=2")));
    }

    #[test]
    fn test_data_cycle_resolves_to_null() {
        let graph = GraphBuilder::new()
            .add("a", transform("input"))
            .add("b", transform("input === null ? 'none' : input"))
            .connect("a", "out", "b", "in")
            .connect("b", "out", "a", "in")
            .build();
        let mut resolver = DataflowResolver::new(&graph, engine());
        // a -> b -> a: the revisit yields null, so b sees null rather than the payload
        let state = ExecutionState::new(json!("payload"));
        assert_eq!(resolver.resolve("a", &state), Some(json!("none")));
    }

    #[test]
    fn test_wired_null_input_is_not_replaced_by_payload() {
        let graph = GraphBuilder::new()
            .add("missing", get_var("nope"))
            .add("t", transform("input === null ? 'none' : 'got ' + input"))
            .connect("missing", "out", "t", "in")
            .build();
        let mut resolver = DataflowResolver::new(&graph, engine());
        let state = ExecutionState::new(json!("PAYLOAD"));
        assert_eq!(resolver.resolve("t", &state), Some(json!("none")));
    }

    #[test]
    fn test_unrun_control_upstream_is_null() {
        let graph = GraphBuilder::new()
            .start("start")
            .add("t", transform("input === null ? 'none' : input"))
            .connect("start", "out", "t", "in")
            .build();
        let mut resolver = DataflowResolver::new(&graph, engine());
        let state = ExecutionState::new(json!("PAYLOAD"));
        assert_eq!(resolver.resolve("t", &state), Some(json!("none")));
    }

    #[test]
    fn test_unwired_pure_node_reads_payload() {
        let graph = GraphBuilder::new().add("t", transform("input + '!'")).build();
        let mut resolver = DataflowResolver::new(&graph, engine());
        assert_eq!(resolver.resolve("t", &ExecutionState::new(json!("hi"))), Some(json!("hi!")));
    }

    #[test]
    fn test_failed_transform_is_null() {
        let graph = GraphBuilder::new().add("bad", transform("input.missing.field")).build();
        let mut resolver = DataflowResolver::new(&graph, engine());
        assert_eq!(resolver.resolve("bad", &ExecutionState::default()), None);
    }

    #[test]
    fn test_control_node_returns_recorded_output() {
        let graph = GraphBuilder::new()
            .start("start")
            .add("t", transform("input + 1"))
            .connect("start", "out", "t", "in")
            .build();
        let mut state = ExecutionState::default();
        let mut resolver = DataflowResolver::new(&graph, engine());
        assert_eq!(resolver.resolve("start", &state), None);

        state.record_output("start", json!(41));
        assert_eq!(resolver.resolve("t", &state), Some(json!(42)));
    }

    #[test]
    fn test_resolve_input_unwired_is_none() {
        let graph = GraphBuilder::new().start("start").build();
        let mut resolver = DataflowResolver::new(&graph, engine());
        assert!(!resolver.is_connected("start", "enable"));
        assert_eq!(resolver.resolve_input("start", "enable", &ExecutionState::default()), None);
    }
}

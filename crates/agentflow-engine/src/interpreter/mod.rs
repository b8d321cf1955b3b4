//! Graph interpreter
//!
//! Walks the control-flow chain from the Start node, one node at a time.
//! Each node executor returns a [`Transition`] naming the output port to
//! leave through (or `stop`); the interpreter follows the first flow edge
//! leaving that port in routing order and loops until a node stops, no edge
//! matches, a node fails, or the run is cancelled.
//!
//! Only flow edges advance the chain. Data and tools edges are read on
//! demand through the [`DataflowResolver`] and the tool aggregation.

mod completion;
mod nodes;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::dataflow::DataflowResolver;
use crate::error::{EngineError, Result};
use crate::events::{EventSink, NullEventSink, RunEvent};
use crate::expression::{BoaScriptEngine, LogSink, ScriptEngine};
use crate::registry::output_ports;
use crate::routing::{is_flow_edge, ordered_routes};
use crate::services::Collaborators;
use crate::state::ExecutionState;
use crate::types::{Graph, Node, NodeId};

pub use nodes::switch_port;

/// What a node executor asks the interpreter to do next
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transition {
    /// Output port to leave through; `None` uses the node's only output
    pub next_port: Option<String>,
    /// End the run successfully at this node
    pub stop: bool,
}

impl Transition {
    pub fn next() -> Self {
        Self::default()
    }

    pub fn port(port: impl Into<String>) -> Self {
        Self {
            next_port: Some(port.into()),
            stop: false,
        }
    }

    pub fn stop() -> Self {
        Self {
            next_port: None,
            stop: true,
        }
    }
}

/// How a completed run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Termination {
    /// A node signalled `stop`
    #[serde(rename_all = "camelCase")]
    EndReached { node_id: NodeId },
    /// The chosen port had no outgoing flow edge
    #[serde(rename_all = "camelCase")]
    NoOutgoingEdge { node_id: NodeId, port: Option<String> },
}

/// Terminal state of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RunOutcome {
    Completed { termination: Termination },
    #[serde(rename_all = "camelCase")]
    Failed { node_id: NodeId, message: String },
    Cancelled,
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Result of [`run_graph`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub execution_id: String,
    pub outcome: RunOutcome,
    /// Control-flow nodes executed, in order
    pub visited: Vec<NodeId>,
    pub state: ExecutionState,
}

/// Everything a run needs
pub struct RunOptions<'g> {
    pub graph: &'g Graph,
    pub state: ExecutionState,
    pub cancel: CancellationToken,
    pub events: Arc<dyn EventSink>,
    pub collaborators: Collaborators,
    pub engine: Arc<dyn ScriptEngine>,
    pub config: EngineConfig,
}

impl<'g> RunOptions<'g> {
    /// Options with an empty state, no collaborators and default limits
    pub fn new(graph: &'g Graph) -> Self {
        let config = EngineConfig::default();
        Self {
            graph,
            state: ExecutionState::default(),
            cancel: CancellationToken::new(),
            events: Arc::new(NullEventSink),
            collaborators: Collaborators::default(),
            engine: Arc::new(BoaScriptEngine::new(config.script.clone())),
            config,
        }
    }

    pub fn with_state(mut self, state: ExecutionState) -> Self {
        self.state = state;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_collaborators(mut self, collaborators: Collaborators) -> Self {
        self.collaborators = collaborators;
        self
    }

    pub fn with_engine(mut self, engine: Arc<dyn ScriptEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Replace the config; the default boa engine picks up the new script limits
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.engine = Arc::new(BoaScriptEngine::new(config.script.clone()));
        self.config = config;
        self
    }
}

/// Everything a node executor may touch
pub(crate) struct NodeContext<'a, 'g> {
    pub graph: &'g Graph,
    pub execution_id: &'a str,
    pub state: &'a mut ExecutionState,
    pub resolver: &'a mut DataflowResolver<'g>,
    pub engine: &'a dyn ScriptEngine,
    pub collaborators: &'a Collaborators,
    pub config: &'a EngineConfig,
    pub events: &'a dyn EventSink,
    pub cancel: &'a CancellationToken,
    pub log: LogSink,
}

impl NodeContext<'_, '_> {
    pub fn emit(&self, event: RunEvent) {
        if let Err(e) = self.events.send(event) {
            log::debug!("Dropping run event: {}", e);
        }
    }

    pub fn trace(&self, message: impl Into<String>) {
        self.emit(RunEvent::trace(self.execution_id, message));
    }
}

fn emit(events: &dyn EventSink, event: RunEvent) {
    if let Err(e) = events.send(event) {
        log::debug!("Dropping run event: {}", e);
    }
}

/// Execute a graph from its Start node.
///
/// Node failures and cancellation are reported through [`RunOutcome`];
/// `Err` means the run could not start.
pub async fn run_graph(options: RunOptions<'_>) -> Result<RunResult> {
    let RunOptions {
        graph,
        mut state,
        cancel,
        events,
        collaborators,
        engine,
        config,
    } = options;

    let start = graph
        .find_start_node()
        .ok_or_else(|| EngineError::config("graph has no start node"))?;
    let execution_id = Uuid::new_v4().to_string();
    log::info!("Starting run {} at '{}'", execution_id, start.id);

    let script_log: LogSink = {
        let events = events.clone();
        let execution_id = execution_id.clone();
        Arc::new(move |line: &str| {
            emit(events.as_ref(), RunEvent::trace(&execution_id, format!("log: {}", line)));
        })
    };
    let mut resolver = DataflowResolver::new(graph, engine.clone()).with_log(script_log.clone());

    emit(
        events.as_ref(),
        RunEvent::RunStarted {
            execution_id: execution_id.clone(),
            start_node_id: start.id.clone(),
        },
    );

    let mut visited = Vec::new();
    let mut current: &Node = start;

    let outcome = loop {
        if cancel.is_cancelled() {
            break RunOutcome::Cancelled;
        }
        if visited.len() as u64 >= u64::from(config.max_steps) {
            break RunOutcome::Failed {
                node_id: current.id.clone(),
                message: "execution limit reached".to_string(),
            };
        }
        visited.push(current.id.clone());

        emit(
            events.as_ref(),
            RunEvent::NodeStarted {
                execution_id: execution_id.clone(),
                node_id: current.id.clone(),
                node_type: current.node_type,
                title: current.display_name().to_string(),
            },
        );

        let result = {
            let mut ctx = NodeContext {
                graph,
                execution_id: &execution_id,
                state: &mut state,
                resolver: &mut resolver,
                engine: engine.as_ref(),
                collaborators: &collaborators,
                config: &config,
                events: events.as_ref(),
                cancel: &cancel,
                log: script_log.clone(),
            };
            nodes::execute(current, &mut ctx).await
        };

        let transition = match result {
            Ok(transition) => transition,
            Err(e) if e.is_cancelled() => break RunOutcome::Cancelled,
            Err(e) => {
                log::warn!("Node '{}' failed: {}", current.id, e);
                break RunOutcome::Failed {
                    node_id: current.id.clone(),
                    message: e.to_string(),
                };
            }
        };
        state.record_output(&current.id, state.payload.clone());

        let (next, port) = if transition.stop {
            (None, None)
        } else {
            next_node(graph, current, transition.next_port.as_deref())
        };

        emit(
            events.as_ref(),
            RunEvent::NodeFinished {
                execution_id: execution_id.clone(),
                node_id: current.id.clone(),
                node_type: current.node_type,
                next_node_id: next.map(|n| n.id.clone()),
                stop: transition.stop,
                state: Box::new(state.clone()),
            },
        );

        if cancel.is_cancelled() {
            break RunOutcome::Cancelled;
        }
        if transition.stop {
            break RunOutcome::Completed {
                termination: Termination::EndReached {
                    node_id: current.id.clone(),
                },
            };
        }
        match next {
            Some(node) => current = node,
            None => {
                break RunOutcome::Completed {
                    termination: Termination::NoOutgoingEdge {
                        node_id: current.id.clone(),
                        port,
                    },
                }
            }
        }
    };

    let terminal = match &outcome {
        RunOutcome::Completed { termination } => {
            let node_id = match termination {
                Termination::EndReached { node_id } | Termination::NoOutgoingEdge { node_id, .. } => node_id,
            };
            log::info!("Run {} completed at '{}'", execution_id, node_id);
            RunEvent::RunCompleted {
                execution_id: execution_id.clone(),
                node_id: node_id.clone(),
            }
        }
        RunOutcome::Failed { node_id, message } => RunEvent::RunFailed {
            execution_id: execution_id.clone(),
            node_id: node_id.clone(),
            message: message.clone(),
        },
        RunOutcome::Cancelled => {
            log::info!("Run {} cancelled", execution_id);
            RunEvent::RunCancelled {
                execution_id: execution_id.clone(),
            }
        }
    };
    emit(events.as_ref(), terminal);

    let stats = resolver.cache_stats();
    log::debug!(
        "Run {} dataflow cache: {} entries, {} hits, {} misses",
        execution_id,
        stats.cached_nodes,
        stats.hits,
        stats.misses
    );

    Ok(RunResult {
        execution_id,
        outcome,
        visited,
        state,
    })
}

/// Pick the node reached through `port` (or the node's only output).
///
/// Returns the resolved port alongside, for reporting dead ends.
fn next_node<'g>(graph: &'g Graph, node: &Node, port: Option<&str>) -> (Option<&'g Node>, Option<String>) {
    let port = match port {
        Some(p) => Some(p.to_string()),
        None => {
            let outputs = output_ports(node);
            match outputs.as_slice() {
                [only] => Some(only.id.clone()),
                _ => None,
            }
        }
    };
    let Some(port_id) = port.as_deref() else {
        return (None, None);
    };

    let next = ordered_routes(graph, node)
        .into_iter()
        .filter(|route| route.port_id.as_deref() == Some(port_id))
        .find_map(|route| {
            graph
                .find_node(&route.edge.target)
                .filter(|target| is_flow_edge(target, route.edge))
        });
    (next, port)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;
    use crate::data::{NodeKind, SetVariableData, GetVariableData, TransformData, ScriptMode};
    use crate::events::{FnEventSink, VecEventSink};
    use crate::testing::ScriptedCompletion;
    use crate::types::NodeType;
    use serde_json::json;

    fn branch_graph(condition: &str) -> Graph {
        GraphBuilder::new()
            .start("start")
            .if_else("check", condition)
            .end("yes")
            .end("no")
            .connect_default("start", "check")
            .connect("check", "then", "yes", "in")
            .connect("check", "else", "no", "in")
            .build()
    }

    async fn run(graph: &Graph, payload: serde_json::Value) -> RunResult {
        run_graph(RunOptions::new(graph).with_state(ExecutionState::new(payload)))
            .await
            .unwrap()
    }

    fn end_node(result: &RunResult) -> &str {
        match &result.outcome {
            RunOutcome::Completed {
                termination: Termination::EndReached { node_id },
            } => node_id,
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_if_else_branches_on_payload() {
        let graph = branch_graph("input.score > 0.5");

        let high = run(&graph, json!({"score": 0.7})).await;
        assert_eq!(end_node(&high), "yes");
        assert_eq!(high.visited, vec!["start", "check", "yes"]);

        let low = run(&graph, json!({"score": 0.2})).await;
        assert_eq!(end_node(&low), "no");
    }

    #[tokio::test]
    async fn test_if_else_on_scalar_payload() {
        let graph = branch_graph("input > 0.5");
        assert_eq!(end_node(&run(&graph, json!(0.7)).await), "yes");
        assert_eq!(end_node(&run(&graph, json!(0.2)).await), "no");
    }

    #[tokio::test]
    async fn test_non_boolean_condition_fails() {
        let graph = branch_graph("'true'");
        let result = run(&graph, json!(null)).await;
        match result.outcome {
            RunOutcome::Failed { node_id, message } => {
                assert_eq!(node_id, "check");
                assert!(message.contains("boolean"), "{}", message);
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_edge_is_distinct_from_end() {
        let graph = GraphBuilder::new()
            .start("start")
            .if_else("check", "false")
            .end("yes")
            .connect_default("start", "check")
            .connect("check", "then", "yes", "in")
            .build();
        let result = run(&graph, json!(null)).await;
        assert_eq!(
            result.outcome,
            RunOutcome::Completed {
                termination: Termination::NoOutgoingEdge {
                    node_id: "check".to_string(),
                    port: Some("else".to_string()),
                }
            }
        );
    }

    #[tokio::test]
    async fn test_switch_routes_by_label_and_clamps() {
        let graph = GraphBuilder::new()
            .start("start")
            .switch("pick", 3, &["A", "B", "C"], "input")
            .end("a")
            .end("b")
            .end("c")
            .connect_default("start", "pick")
            .connect("pick", "case-0", "a", "in")
            .connect("pick", "case-1", "b", "in")
            .connect("pick", "case-2", "c", "in")
            .build();

        assert_eq!(end_node(&run(&graph, json!("b")).await), "b");
        assert_eq!(end_node(&run(&graph, json!(5)).await), "c");
        assert_eq!(end_node(&run(&graph, json!(-1)).await), "a");

        let bad = run(&graph, json!("nope")).await;
        assert!(matches!(bad.outcome, RunOutcome::Failed { ref node_id, .. } if node_id == "pick"));
    }

    #[tokio::test]
    async fn test_set_variable_invalidates_pure_reads() {
        let graph = GraphBuilder::new()
            .start("start")
            .add(
                "read",
                NodeKind::GetVariable(GetVariableData {
                    path: "count".to_string(),
                    default_value: Some(json!(0)),
                }),
            )
            .add(
                "bump",
                NodeKind::Transform(TransformData {
                    mode: ScriptMode::Expression,
                    source: "input + 1".to_string(),
                }),
            )
            .add(
                "write",
                NodeKind::SetVariable(SetVariableData {
                    path: "count".to_string(),
                    expression: String::new(),
                }),
            )
            .add(
                "write-again",
                NodeKind::SetVariable(SetVariableData {
                    path: "count".to_string(),
                    expression: String::new(),
                }),
            )
            .end("end")
            .connect("read", "out", "bump", "in")
            .connect("bump", "out", "write", "value")
            .connect("bump", "out", "write-again", "value")
            .connect_default("start", "write")
            .connect_default("write", "write-again")
            .connect_default("write-again", "end")
            .build();

        let result = run(&graph, json!(null)).await;
        assert!(result.outcome.is_completed());
        assert_eq!(result.state.get_var("count"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_muted_node_is_skipped() {
        let graph = GraphBuilder::new()
            .start("start")
            .add(
                "write",
                NodeKind::SetVariable(SetVariableData {
                    path: "touched".to_string(),
                    expression: "true".to_string(),
                }),
            )
            .muted()
            .end("end")
            .connect_default("start", "write")
            .connect_default("write", "end")
            .build();

        let result = run(&graph, json!(null)).await;
        assert_eq!(end_node(&result), "end");
        assert_eq!(result.state.get_var("touched"), None);
    }

    #[tokio::test]
    async fn test_step_limit() {
        let graph = GraphBuilder::new()
            .start("start")
            .if_else("loop", "true")
            .connect_default("start", "loop")
            .connect("loop", "then", "loop", "in")
            .build();
        let mut config = EngineConfig::default();
        config.max_steps = 10;

        let result = run_graph(RunOptions::new(&graph).with_config(config)).await.unwrap();
        assert_eq!(
            result.outcome,
            RunOutcome::Failed {
                node_id: "loop".to_string(),
                message: "execution limit reached".to_string(),
            }
        );
        assert_eq!(result.visited.len(), 10);
    }

    #[tokio::test]
    async fn test_no_start_node_is_error() {
        let graph = GraphBuilder::new().end("end").build();
        assert!(run_graph(RunOptions::new(&graph)).await.is_err());
    }

    #[tokio::test]
    async fn test_events_emitted_in_order() {
        let graph = branch_graph("true");
        let sink = Arc::new(VecEventSink::new());
        let result = run_graph(RunOptions::new(&graph).with_events(sink.clone()))
            .await
            .unwrap();

        let events = sink.events();
        assert!(matches!(events.first(), Some(RunEvent::RunStarted { .. })));
        assert!(matches!(events.last(), Some(RunEvent::RunCompleted { node_id, .. }) if node_id == "yes"));
        assert!(events.iter().all(|e| e.execution_id() == result.execution_id));

        let finished: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                RunEvent::NodeFinished {
                    node_id,
                    next_node_id,
                    stop,
                    ..
                } => Some((node_id.as_str(), next_node_id.as_deref(), *stop)),
                _ => None,
            })
            .collect();
        assert_eq!(
            finished,
            vec![
                ("start", Some("check"), false),
                ("check", Some("yes"), false),
                ("yes", None, true),
            ]
        );
    }

    #[tokio::test]
    async fn test_cancel_before_external_call() {
        let graph = GraphBuilder::new()
            .start("start")
            .add_node("llm", NodeType::Completion)
            .end("end")
            .connect_default("start", "llm")
            .connect_default("llm", "end")
            .build();
        let client = Arc::new(ScriptedCompletion::new(vec![ScriptedCompletion::text("hi")]));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let events = Arc::new(FnEventSink(move |event: RunEvent| {
            if let RunEvent::NodeStarted { node_id, .. } = event {
                if node_id == "llm" {
                    trigger.cancel();
                }
            }
        }));

        let result = run_graph(
            RunOptions::new(&graph)
                .with_cancel(cancel)
                .with_events(events)
                .with_collaborators(Collaborators::new().with_completion(client.clone())),
        )
        .await
        .unwrap();

        assert_eq!(result.outcome, RunOutcome::Cancelled);
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let graph = branch_graph("true");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = run_graph(RunOptions::new(&graph).with_cancel(cancel)).await.unwrap();
        assert_eq!(result.outcome, RunOutcome::Cancelled);
        assert!(result.visited.is_empty());
    }
}

//! Agentflow Engine - graph interpretation for agent workflows
//!
//! This crate interprets node graphs authored in a visual editor: a typed
//! node/port model, structural validation, a sandboxed script evaluator,
//! a lazy memoized dataflow resolver for pure nodes, a run previewer and
//! the control-flow interpreter that drives node executors.
//!
//! # Architecture
//!
//! - `registry`: static per-type definitions (ports, attributes, bounds)
//! - `validation`: structural checks returning [`Issue`] values
//! - `expression`: pluggable [`ScriptEngine`], boa-backed by default
//! - `dataflow`: on-demand resolution of data ports with a generation-keyed cache
//! - `planner`: depth-first run preview
//! - `interpreter`: the sequential state machine with cooperative cancellation
//! - `tools`: provider aggregation for completion nodes
//! - `services`: collaborator traits the host implements
//!
//! # Example
//!
//! ```ignore
//! use agentflow_engine::{run_graph, ExecutionState, GraphBuilder, RunOptions};
//!
//! let graph = GraphBuilder::new()
//!     .start("start")
//!     .if_else("check", "input.score > 0.5")
//!     .end("yes")
//!     .end("no")
//!     .connect_default("start", "check")
//!     .connect("check", "then", "yes", "in")
//!     .connect("check", "else", "no", "in")
//!     .build();
//!
//! let result = run_graph(
//!     RunOptions::new(&graph).with_state(ExecutionState::new(serde_json::json!({"score": 0.7}))),
//! )
//! .await?;
//! ```

pub mod builder;
pub mod config;
pub mod constants;
pub mod data;
pub mod dataflow;
pub mod descriptor;
pub mod error;
pub mod events;
pub mod expression;
pub mod interpreter;
pub mod planner;
pub mod registry;
pub mod routing;
pub mod services;
pub mod state;
pub mod tools;
pub mod types;
pub mod validation;

#[cfg(test)]
mod testing;

// Re-export key types
pub use builder::GraphBuilder;
pub use config::EngineConfig;
pub use data::{NodeData, NodeKind};
pub use dataflow::DataflowResolver;
pub use error::{EngineError, Result};
pub use events::{EventSink, FnEventSink, NullEventSink, RunEvent, VecEventSink};
pub use expression::{BoaScriptEngine, EvalOutcome, ScriptEngine, ScriptScope};
pub use interpreter::{run_graph, RunOptions, RunOutcome, RunResult, Termination};
pub use planner::{create_run_plan, PlanStep, RunPlan};
pub use services::{Collaborators, CompletionClient, RetrievalClient, UsageSink};
pub use state::ExecutionState;
pub use types::{Edge, Graph, Node, NodeType, PortKind};
pub use validation::{validate_graph, Issue, IssueLevel};

// Cancellation signal accepted by `RunOptions`
pub use tokio_util::sync::CancellationToken;

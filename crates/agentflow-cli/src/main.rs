//! agentflow CLI - validate, preview and run agent graphs from JSON files.
//!
//! No completion or retrieval client is wired in, so completion nodes fail
//! with a "No completion client configured" node failure.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use agentflow_engine::registry::{all_definitions, list_by_creatable};
use agentflow_engine::validation::has_errors;
use agentflow_engine::{
    create_run_plan, run_graph, validate_graph, CancellationToken, EngineConfig, EngineError, ExecutionState,
    FnEventSink, Graph, RunEvent, RunOptions, RunOutcome,
};
use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "agentflow", version = env!("CARGO_PKG_VERSION"), about = "Validate, preview and run agent workflow graphs")]
struct Cli {
    /// Engine configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check a graph for structural problems
    Validate {
        graph: PathBuf,
    },
    /// Preview the nodes a run may visit
    Plan {
        graph: PathBuf,
    },
    /// Execute a graph
    Run {
        graph: PathBuf,
        /// Initial payload (JSON)
        #[arg(long)]
        payload: Option<String>,
        /// Initial variables (JSON object)
        #[arg(long)]
        vars: Option<String>,
        /// Print run events to stderr as JSON lines
        #[arg(long)]
        events: bool,
    },
    /// List node types
    Nodes {
        /// Include types that cannot be created from the palette
        #[arg(long)]
        all: bool,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON for {what}: {source}")]
    Json {
        what: String,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

fn load_graph(path: &Path) -> Result<Graph, CliError> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CliError::Json {
        what: path.display().to_string(),
        source,
    })
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, CliError> {
    match path {
        Some(path) => Ok(EngineConfig::from_file(path)?),
        None => Ok(EngineConfig::default()),
    }
}

fn parse_json_arg(what: &str, raw: Option<&str>) -> Result<Value, CliError> {
    match raw {
        Some(raw) => serde_json::from_str(raw).map_err(|source| CliError::Json {
            what: what.to_string(),
            source,
        }),
        None => Ok(Value::Null),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value).map_err(EngineError::from)?;
    println!("{}", text);
    Ok(())
}

/// How a command finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Ok,
    Failed,
    Cancelled,
}

impl From<Status> for ExitCode {
    fn from(status: Status) -> Self {
        match status {
            Status::Ok => ExitCode::SUCCESS,
            Status::Failed => ExitCode::FAILURE,
            Status::Cancelled => ExitCode::from(130),
        }
    }
}

async fn run(cli: Cli) -> Result<Status, CliError> {
    match cli.command {
        Command::Validate { graph } => {
            let issues = validate_graph(&load_graph(&graph)?);
            print_json(&issues)?;
            Ok(if has_errors(&issues) { Status::Failed } else { Status::Ok })
        }
        Command::Plan { graph } => {
            let plan = create_run_plan(&load_graph(&graph)?);
            print_json(&plan)?;
            Ok(Status::Ok)
        }
        Command::Run {
            graph,
            payload,
            vars,
            events,
        } => {
            let graph = load_graph(&graph)?;
            let config = load_config(cli.config.as_deref())?;
            let state = ExecutionState::new(parse_json_arg("--payload", payload.as_deref())?)
                .with_vars(parse_json_arg("--vars", vars.as_deref())?);

            let cancel = CancellationToken::new();
            let on_ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::info!("Interrupted, cancelling run");
                    on_ctrl_c.cancel();
                }
            });

            let mut options = RunOptions::new(&graph)
                .with_config(config)
                .with_state(state)
                .with_cancel(cancel);
            if events {
                options = options.with_events(Arc::new(FnEventSink(|event: RunEvent| {
                    if let Ok(line) = serde_json::to_string(&event) {
                        eprintln!("{}", line);
                    }
                })));
            }

            let result = run_graph(options).await?;
            print_json(&result)?;
            Ok(match result.outcome {
                RunOutcome::Completed { .. } => Status::Ok,
                RunOutcome::Failed { .. } => Status::Failed,
                RunOutcome::Cancelled => Status::Cancelled,
            })
        }
        Command::Nodes { all } => {
            let definitions: Vec<_> = if all {
                all_definitions().iter().collect()
            } else {
                list_by_creatable()
            };
            let descriptors: Vec<_> = definitions
                .into_iter()
                .map(|def| def.describe(&def.default_data().kind))
                .collect();
            print_json(&descriptors)?;
            Ok(Status::Ok)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(status) => status.into(),
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

//! Script evaluation
//!
//! Conditions, selectors and transforms are small JavaScript snippets run
//! in an embedded boa context. Each call gets a fresh context, so nothing
//! persists between evaluations. The scope is passed in as JSON text, so
//! scripts only ever see copies of run state; their single way of affecting
//! the run is the returned value.
//!
//! Evaluation never fails to the caller. Syntax errors, thrown exceptions
//! and exceeded runtime limits are reported in [`EvalOutcome::error`].

use std::sync::Arc;

use boa_engine::{Context, Source};
use serde_json::{Map, Value};

use crate::config::ScriptLimits;
use crate::error::{EngineError, Result};
use crate::state::ExecutionState;

/// Receives `log(...)` output from scripts
pub type LogSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Values visible to a script
#[derive(Clone, Default)]
pub struct ScriptScope {
    /// Current payload
    pub input: Value,
    /// Copy of the run's variable tree
    pub vars: Value,
    /// Conversation history
    pub messages: Value,
    /// Context fragments
    pub context_messages: Value,
    /// Destination for script log lines
    pub log: Option<LogSink>,
}

impl ScriptScope {
    /// Snapshot the parts of run state a script may read
    pub fn from_state(state: &ExecutionState, input: Value) -> Self {
        Self {
            input,
            vars: state.vars().clone(),
            messages: serde_json::to_value(&state.conversation).unwrap_or(Value::Null),
            context_messages: serde_json::to_value(state.context_messages()).unwrap_or(Value::Null),
            log: None,
        }
    }

    pub fn with_log(mut self, log: Option<LogSink>) -> Self {
        self.log = log;
        self
    }
}

impl std::fmt::Debug for ScriptScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptScope")
            .field("input", &self.input)
            .field("vars", &self.vars)
            .field("log", &self.log.is_some())
            .finish()
    }
}

/// Result of one evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct EvalOutcome {
    /// Produced value; `Null` when `error` is set
    pub value: Value,
    pub error: Option<String>,
    /// Lines logged by the script, already forwarded to the scope's sink
    pub logs: Vec<String>,
}

impl EvalOutcome {
    pub fn ok(value: Value) -> Self {
        Self {
            value,
            error: None,
            logs: Vec::new(),
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            value: Value::Null,
            error: Some(error.into()),
            logs: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Convert into a `Result`, failing with the script error
    pub fn into_result(self) -> Result<Value> {
        match self.error {
            Some(error) => Err(EngineError::Expression(error)),
            None => Ok(self.value),
        }
    }
}

/// Pluggable evaluation backend
pub trait ScriptEngine: Send + Sync {
    /// Evaluate a single expression
    fn evaluate(&self, source: &str, scope: &ScriptScope) -> EvalOutcome;

    /// Evaluate a function body that `return`s a value.
    ///
    /// `extras` are exposed as additional top-level bindings.
    fn evaluate_function_body(
        &self,
        source: &str,
        scope: &ScriptScope,
        extras: &Map<String, Value>,
    ) -> EvalOutcome;
}

/// boa-backed script engine with bounded loops and recursion
#[derive(Debug, Clone, Default)]
pub struct BoaScriptEngine {
    limits: ScriptLimits,
}

enum Body<'a> {
    Expression(&'a str),
    Function(&'a str),
}

impl BoaScriptEngine {
    pub fn new(limits: ScriptLimits) -> Self {
        Self { limits }
    }

    fn run(&self, body: Body<'_>, scope: &ScriptScope, extras: &Map<String, Value>) -> EvalOutcome {
        let source = match body {
            Body::Expression(s) | Body::Function(s) => s,
        };
        if source.trim().is_empty() {
            return EvalOutcome::err("script is empty");
        }
        if source.len() > self.limits.max_source_bytes {
            return EvalOutcome::err(format!(
                "script is {} bytes, limit is {}",
                source.len(),
                self.limits.max_source_bytes
            ));
        }

        let script = match build_script(&body, scope, extras) {
            Ok(script) => script,
            Err(e) => return EvalOutcome::err(e),
        };

        let mut context = Context::default();
        context
            .runtime_limits_mut()
            .set_loop_iteration_limit(self.limits.loop_iteration_limit);
        context
            .runtime_limits_mut()
            .set_recursion_limit(self.limits.recursion_limit);

        let raw = match context.eval(Source::from_bytes(&script)) {
            Ok(value) => value
                .to_string(&mut context)
                .map(|s| s.to_std_string_escaped())
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        let outcome = match raw {
            Ok(text) => parse_envelope(&text),
            Err(e) => EvalOutcome::err(e),
        };

        if let Some(sink) = &scope.log {
            for line in &outcome.logs {
                sink(line);
            }
        }
        outcome
    }
}

impl ScriptEngine for BoaScriptEngine {
    fn evaluate(&self, source: &str, scope: &ScriptScope) -> EvalOutcome {
        self.run(Body::Expression(source), scope, &Map::new())
    }

    fn evaluate_function_body(
        &self,
        source: &str,
        scope: &ScriptScope,
        extras: &Map<String, Value>,
    ) -> EvalOutcome {
        self.run(Body::Function(source), scope, extras)
    }
}

const PRELUDE: &str = r#"
var __logs = [];
var log = function() {
    var parts = [];
    for (var i = 0; i < arguments.length; i++) {
        var a = arguments[i];
        parts.push(typeof a === 'object' ? JSON.stringify(a) : String(a));
    }
    __logs.push(parts.join(' '));
};
var console = { log: log, info: log, warn: log, error: log };
"#;

fn js_json(value: &Value) -> std::result::Result<String, String> {
    let json = serde_json::to_string(value).map_err(|e| e.to_string())?;
    Ok(format!(
        "JSON.parse('{}')",
        json.replace('\\', "\\\\").replace('\'', "\\'")
    ))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        && !name.starts_with("__")
}

fn build_script(
    body: &Body<'_>,
    scope: &ScriptScope,
    extras: &Map<String, Value>,
) -> std::result::Result<String, String> {
    let mut bindings = format!(
        "var input = {};\nvar vars = {};\nvar messages = {};\nvar contextMessages = {};\n",
        js_json(&scope.input)?,
        js_json(&scope.vars)?,
        js_json(&scope.messages)?,
        js_json(&scope.context_messages)?,
    );
    for (name, value) in extras {
        if !is_identifier(name) {
            return Err(format!("'{}' is not a valid binding name", name));
        }
        bindings.push_str(&format!("var {} = {};\n", name, js_json(value)?));
    }

    let call = match body {
        Body::Expression(source) => format!("(function() {{ return (\n{}\n); }})()", source),
        Body::Function(source) => format!("(function() {{\n{}\n}})()", source),
    };

    Ok(format!(
        r#"(function() {{
{PRELUDE}
{bindings}
try {{
    var __value = {call};
    return JSON.stringify({{ ok: true, value: __value === undefined ? null : __value, logs: __logs }});
}} catch (e) {{
    var __message = (e && e.message !== undefined) ? (e.name ? e.name + ': ' : '') + e.message : String(e);
    return JSON.stringify({{ ok: false, error: __message, logs: __logs }});
}}
}})()"#
    ))
}

fn parse_envelope(text: &str) -> EvalOutcome {
    let envelope: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => return EvalOutcome::err(format!("script produced unreadable output: {}", e)),
    };
    let logs = envelope
        .get("logs")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                .collect()
        })
        .unwrap_or_default();

    let mut outcome = if envelope.get("ok").and_then(Value::as_bool) == Some(true) {
        EvalOutcome::ok(envelope.get("value").cloned().unwrap_or(Value::Null))
    } else {
        let error = envelope
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("script failed")
            .to_string();
        EvalOutcome::err(error)
    };
    outcome.logs = logs;
    outcome
}

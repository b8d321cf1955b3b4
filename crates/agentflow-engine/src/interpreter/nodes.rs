//! Per-type node executors
//!
//! One closed `match` over [`NodeKind`] dispatches each node to its
//! executor. Executors read and mutate the run state through the
//! [`NodeContext`] and answer with a [`Transition`].

use serde_json::{Map, Value};

use crate::constants::{CASE_PORT_PREFIX, ELSE_PORT, THEN_PORT, VALUE_PORT};
use crate::data::{
    ContextMessageData, GetVariableData, IfElseData, NodeKind, ScriptMode, SetVariableData, SwitchData,
    TransformData,
};
use crate::error::{EngineError, Result};
use crate::expression::ScriptScope;
use crate::registry::output_ports;
use crate::state::ContextMessage;
use crate::types::Node;

use super::{completion, NodeContext, Transition};

pub(crate) async fn execute(node: &Node, ctx: &mut NodeContext<'_, '_>) -> Result<Transition> {
    ctx.trace(format!("{} ({})", node.display_name(), node.node_type));

    if node.data.muted {
        let port = output_ports(node).into_iter().next().map(|p| p.id);
        ctx.trace(format!("Skipping muted node '{}'", node.id));
        return Ok(Transition {
            next_port: port,
            stop: false,
        });
    }

    match &node.data.kind {
        NodeKind::Start(_) => Ok(Transition::next()),
        NodeKind::End(_) => Ok(Transition::stop()),
        NodeKind::IfElse(data) => if_else(node, data, ctx),
        NodeKind::Switch(data) => switch(node, data, ctx),
        NodeKind::Transform(data) => transform(data, ctx),
        NodeKind::GetVariable(data) => get_variable(data, ctx),
        NodeKind::SetVariable(data) => set_variable(node, data, ctx),
        NodeKind::ContextMessage(data) => context_message(node, data, ctx),
        NodeKind::Completion(data) => completion::execute(node, data, ctx).await,
        NodeKind::Randomizer(_) | NodeKind::Retrieval(_) | NodeKind::DocumentReader(_) | NodeKind::GlobalState(_) => {
            Err(EngineError::failed(format!(
                "'{}' is a tool provider and cannot run on the control chain",
                node.id
            )))
        }
    }
}

fn scope(ctx: &NodeContext<'_, '_>) -> ScriptScope {
    ScriptScope::from_state(&*ctx.state, ctx.state.payload.clone()).with_log(Some(ctx.log.clone()))
}

fn require<'a>(source: &'a str, what: &str) -> Result<&'a str> {
    let trimmed = source.trim();
    if trimmed.is_empty() {
        return Err(EngineError::config(format!("{} is empty", what)));
    }
    Ok(trimmed)
}

fn if_else(node: &Node, data: &IfElseData, ctx: &mut NodeContext<'_, '_>) -> Result<Transition> {
    let condition = require(&data.condition, "condition")?;
    let value = ctx.engine.evaluate(condition, &scope(ctx)).into_result()?;
    match value {
        Value::Bool(true) => Ok(Transition::port(THEN_PORT)),
        Value::Bool(false) => Ok(Transition::port(ELSE_PORT)),
        other => Err(EngineError::failed(format!(
            "condition of '{}' must evaluate to a boolean, got {}",
            node.id, other
        ))),
    }
}

fn switch(node: &Node, data: &SwitchData, ctx: &mut NodeContext<'_, '_>) -> Result<Transition> {
    let selector = require(&data.selector, "selector")?;
    let value = ctx.engine.evaluate(selector, &scope(ctx)).into_result()?;
    let port = switch_port(data, &value)
        .map_err(|reason| EngineError::failed(format!("switch '{}': {}", node.id, reason)))?;
    Ok(Transition::port(port))
}

fn case_port(index: usize) -> String {
    format!("{}{}", CASE_PORT_PREFIX, index)
}

/// Map a selector result onto a Switch output port.
///
/// Integers and numeric strings clamp into `[0, cases - 1]`; labels match
/// case-insensitively; `case-<N>` must name an existing port.
pub fn switch_port(data: &SwitchData, value: &Value) -> std::result::Result<String, String> {
    let cases = data.case_count();
    let clamp = |i: i64| i.clamp(0, cases as i64 - 1) as usize;

    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(case_port(clamp(i)))
            } else if n.as_u64().is_some() {
                Ok(case_port(cases - 1))
            } else {
                match n.as_f64() {
                    Some(f) if f.is_finite() && f.fract() == 0.0 => Ok(case_port(clamp(f as i64))),
                    _ => Err(format!("selector returned non-integral number {}", n)),
                }
            }
        }
        Value::String(s) => {
            let text = s.trim();
            if let Some(index) = data
                .labels
                .iter()
                .take(cases)
                .position(|label| !label.trim().is_empty() && label.trim().eq_ignore_ascii_case(text))
            {
                return Ok(case_port(index));
            }
            let lowered = text.to_ascii_lowercase();
            if let Some(suffix) = lowered.strip_prefix(CASE_PORT_PREFIX) {
                return match suffix.parse::<usize>() {
                    Ok(index) if index < cases => Ok(case_port(index)),
                    _ => Err(format!("'{}' does not name one of {} cases", text, cases)),
                };
            }
            match text.parse::<i64>() {
                Ok(i) => Ok(case_port(clamp(i))),
                Err(_) => Err(format!("'{}' matches no case label", text)),
            }
        }
        other => Err(format!("selector must return a string or an integer, got {}", other)),
    }
}

fn transform(data: &TransformData, ctx: &mut NodeContext<'_, '_>) -> Result<Transition> {
    let source = require(&data.source, "transform source")?;
    let scope = scope(ctx);
    let outcome = match data.mode {
        ScriptMode::Expression => ctx.engine.evaluate(source, &scope),
        ScriptMode::Function => ctx.engine.evaluate_function_body(source, &scope, &Map::new()),
    };
    ctx.state.payload = outcome.into_result()?;
    Ok(Transition::next())
}

fn get_variable(data: &GetVariableData, ctx: &mut NodeContext<'_, '_>) -> Result<Transition> {
    let path = require(&data.path, "variable path")?;
    ctx.state.payload = ctx
        .state
        .get_var(path)
        .cloned()
        .or_else(|| data.default_value.clone())
        .unwrap_or(Value::Null);
    Ok(Transition::next())
}

fn set_variable(node: &Node, data: &SetVariableData, ctx: &mut NodeContext<'_, '_>) -> Result<Transition> {
    let value = if ctx.resolver.is_connected(&node.id, VALUE_PORT) {
        ctx.resolver
            .resolve_input(&node.id, VALUE_PORT, &*ctx.state)
            .unwrap_or(Value::Null)
    } else if !data.expression.trim().is_empty() {
        ctx.engine
            .evaluate(data.expression.trim(), &scope(ctx))
            .into_result()?
    } else {
        ctx.state.payload.clone()
    };

    ctx.state.set_var(&data.path, value)?;
    ctx.resolver.invalidate();
    log::debug!("'{}' wrote vars.{}", node.id, data.path.trim());
    Ok(Transition::next())
}

fn context_message(node: &Node, data: &ContextMessageData, ctx: &mut NodeContext<'_, '_>) -> Result<Transition> {
    if data.text.trim().is_empty() {
        ctx.trace(format!("'{}' has no text; nothing added", node.id));
        return Ok(Transition::next());
    }
    let mut message = ContextMessage::system(
        data.text.clone(),
        data.priority.unwrap_or(ctx.config.context.default_fragment_priority),
    )
    .from_node(&node.id);
    message.role = data.role;
    ctx.state.push_context(message);
    Ok(Transition::next())
}

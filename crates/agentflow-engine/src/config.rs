//! Engine configuration
//!
//! Every field has a default so a partial JSON document (or none at all)
//! yields a usable configuration.

use serde::{Deserialize, Serialize};

use crate::constants::defaults;

/// Top-level configuration for graph runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Maximum number of node executions per run before it is failed.
    pub max_steps: u32,
    /// Resource limits for the script sandbox.
    pub script: ScriptLimits,
    /// Completion node behaviour.
    pub completion: CompletionSettings,
    /// Context fragment priorities.
    pub context: ContextSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: defaults::MAX_STEPS,
            script: ScriptLimits::default(),
            completion: CompletionSettings::default(),
            context: ContextSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON, filling unspecified fields with defaults.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON configuration file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

/// Bounds applied to every script evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScriptLimits {
    pub loop_iteration_limit: u64,
    pub recursion_limit: usize,
    pub max_source_bytes: usize,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            loop_iteration_limit: defaults::LOOP_ITERATION_LIMIT,
            recursion_limit: defaults::RECURSION_LIMIT,
            max_source_bytes: defaults::MAX_SOURCE_BYTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompletionSettings {
    /// Upper bound on tool-call round trips when a node does not set its own.
    pub max_tool_rounds: u32,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            max_tool_rounds: defaults::MAX_TOOL_ROUNDS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContextSettings {
    /// Priority given to provider guidance such as retrieval query hints.
    pub retrieval_guidance_priority: i32,
    /// Priority of author-written fragments that do not set one.
    pub default_fragment_priority: i32,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            retrieval_guidance_priority: defaults::RETRIEVAL_GUIDANCE_PRIORITY,
            default_fragment_priority: defaults::FRAGMENT_PRIORITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = EngineConfig::from_json(r#"{"maxSteps": 12, "script": {"recursionLimit": 32}}"#)
            .unwrap();
        assert_eq!(config.max_steps, 12);
        assert_eq!(config.script.recursion_limit, 32);
        assert_eq!(config.script.loop_iteration_limit, defaults::LOOP_ITERATION_LIMIT);
        assert_eq!(config.completion.max_tool_rounds, defaults::MAX_TOOL_ROUNDS);
    }

    #[test]
    fn test_empty_config_is_default() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{"completion": {"maxToolRounds": 1}}"#).unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.completion.max_tool_rounds, 1);
        assert!(matches!(
            EngineConfig::from_file(dir.path().join("missing.json")),
            Err(crate::EngineError::Io(_))
        ));
    }
}

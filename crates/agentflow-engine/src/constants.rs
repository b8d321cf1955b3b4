//! Shared identifiers and default values

/// Canonical input port used when an edge omits its target port.
pub const DEFAULT_INPUT_PORT: &str = "in";

/// Canonical output port used when an edge omits its source port.
pub const DEFAULT_OUTPUT_PORT: &str = "out";

/// Reserved input port on consumers that receives tool provider edges.
pub const TOOLS_PORT: &str = "tools";

/// Reserved input port on providers that gates them on or off.
pub const ENABLE_PORT: &str = "enable";

/// Data input port of SetVariable nodes.
pub const VALUE_PORT: &str = "value";

/// IfElse branch ports.
pub const THEN_PORT: &str = "then";
pub const ELSE_PORT: &str = "else";

/// Prefix of Switch case ports (`case-0`, `case-1`, ...).
pub const CASE_PORT_PREFIX: &str = "case-";

/// Bounds for the Switch case count.
pub const MIN_SWITCH_CASES: u8 = 2;
pub const MAX_SWITCH_CASES: u8 = 8;

/// String values treated as an enabled provider gate.
pub const ENABLED_STRINGS: &[&str] = &["true", "1", "yes", "on"];

/// String values treated as a disabled provider gate.
pub const DISABLED_STRINGS: &[&str] = &["false", "0", "no", "off", ""];

pub mod defaults {
    //! Default values for [`crate::config::EngineConfig`]

    pub const MAX_STEPS: u32 = 1000;
    pub const LOOP_ITERATION_LIMIT: u64 = 100_000;
    pub const RECURSION_LIMIT: usize = 256;
    pub const MAX_SOURCE_BYTES: usize = 64 * 1024;
    pub const MAX_TOOL_ROUNDS: u32 = 4;
    pub const RETRIEVAL_GUIDANCE_PRIORITY: i32 = -100;
    pub const FRAGMENT_PRIORITY: i32 = 0;
    pub const RETRIEVAL_TOP_K: u32 = 5;
    pub const RETRIEVAL_MAX_QUERIES: u32 = 3;
    pub const DOCUMENT_MAX_CHARS: usize = 8000;
}

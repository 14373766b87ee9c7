//! Prompt logging as JSONL
//!
//! Every prompt sent to the wrapped tool is echoed as one JSON line on the
//! process-wide stdout stream, so an active session captures it in
//! `stdout.log` alongside the tool's own output. Keys that hold their
//! default value are omitted to keep the lines lean. Prompt logging is
//! observational: it is skipped entirely when no session is registered and
//! never fails the caller.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::logging::{output, registry, timestamp};

/// Longest prompt recorded verbatim; longer prompts are truncated
pub const MAX_PROMPT_LENGTH: usize = 10_000;

/// Default turn budget for one wrapped-tool invocation
pub const MAX_TURNS_PER_ITERATION: u32 = 300;

/// One prompt as recorded in the JSONL stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptRecord {
    #[serde(rename = "type")]
    pub kind: String,

    pub timestamp: String,

    pub message: String,

    /// Only recorded when true
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continue_conversation: Option<bool>,

    /// Only recorded when differing from [`MAX_TURNS_PER_ITERATION`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<u32>,

    /// Only recorded when non-empty
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub allowed_tools: Vec<String>,
}

/// Format a prompt as exactly one newline-terminated JSON line.
pub fn format_prompt_as_jsonl(
    prompt: &str,
    max_turns: u32,
    allowed_tools: &[String],
    continue_conversation: bool,
) -> serde_json::Result<String> {
    let message: String = prompt.chars().take(MAX_PROMPT_LENGTH).collect();

    let record = PromptRecord {
        kind: "user_input".to_string(),
        timestamp: timestamp::iso_now(),
        message,
        continue_conversation: continue_conversation.then_some(true),
        max_turns: (max_turns != MAX_TURNS_PER_ITERATION).then_some(max_turns),
        allowed_tools: allowed_tools.to_vec(),
    };

    let mut line = serde_json::to_string(&record)?;
    line.push('\n');
    Ok(line)
}

/// Log a prompt to the process-wide stdout stream.
///
/// Skipped when no session is active. A formatting failure becomes a
/// warning on the stderr stream; nothing propagates to the caller.
pub fn log_prompt(prompt: &str, max_turns: u32, allowed_tools: &[String], continue_conversation: bool) {
    if registry::get().is_none() {
        debug!("log_prompt: no active session, skipping");
        return;
    }

    match format_prompt_as_jsonl(prompt, max_turns, allowed_tools, continue_conversation) {
        Ok(line) => {
            output::stdout().write_str(&line);
        }
        Err(e) => {
            output::stderr().write_line(&format!("Warning: Failed to log prompt: {e}"));
        }
    }
}

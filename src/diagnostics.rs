//! Debug-only side channels. Nothing here writes to stdout except the
//! explicit `--debug-env` and `--test` modes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use crate::display::format_tokens_compact;
use crate::models::HookJson;
use crate::usage::estimate_context_usage;
use crate::utils::context_limit_for_model_display;

pub const DEBUG_SNAPSHOT_FILE: &str = "claude-statusline-debug.json";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugSnapshot<'a> {
    pub timestamp: DateTime<Utc>,
    pub input_data: &'a HookJson,
    pub transcript_exists: bool,
    pub transcript_path: Option<&'a str>,
}

impl<'a> DebugSnapshot<'a> {
    pub fn capture(hook: &'a HookJson, now: DateTime<Utc>) -> Self {
        let transcript_path = hook.transcript_path.as_deref().filter(|p| !p.is_empty());
        Self {
            timestamp: now,
            input_data: hook,
            transcript_exists: transcript_path.is_some_and(|p| Path::new(p).is_file()),
            transcript_path,
        }
    }
}

/// Write the snapshot next to the cache files; failures are logged and dropped
pub fn write_debug_snapshot(dir: &Path, snapshot: &DebugSnapshot<'_>) -> Option<PathBuf> {
    let path = dir.join(DEBUG_SNAPSHOT_FILE);
    let encoded = serde_json::to_string_pretty(snapshot).ok()?;
    match std::fs::write(&path, encoded) {
        Ok(()) => Some(path),
        Err(err) => {
            tracing::debug!(path = %path.display(), "debug snapshot not written: {}", err);
            None
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TerminalEnv {
    #[serde(rename = "TERM")]
    pub term: Option<String>,
    #[serde(rename = "COLORTERM")]
    pub colorterm: Option<String>,
    #[serde(rename = "TERM_PROGRAM")]
    pub term_program: Option<String>,
    #[serde(rename = "CLAUDE_CODE_WINDOWS")]
    pub claude_code_windows: Option<String>,
    #[serde(rename = "PATH_HAS_NODE")]
    pub path_has_node: bool,
    pub cwd: String,
    #[serde(rename = "stdin_isTTY")]
    pub stdin_is_tty: bool,
    #[serde(rename = "stdout_isTTY")]
    pub stdout_is_tty: bool,
}

impl TerminalEnv {
    pub fn capture() -> Self {
        let var = |name: &str| std::env::var(name).ok();
        Self {
            term: var("TERM"),
            colorterm: var("COLORTERM"),
            term_program: var("TERM_PROGRAM"),
            claude_code_windows: var("CLAUDE_CODE_WINDOWS"),
            path_has_node: var("PATH").is_some_and(|p| p.contains("nodejs")),
            cwd: crate::utils::process_cwd().display().to_string(),
            stdin_is_tty: std::io::stdin().is_terminal(),
            stdout_is_tty: std::io::stdout().is_terminal(),
        }
    }
}

/// Text of the `--test` self check: the estimate for a fixed mock session
pub fn token_self_check() -> String {
    let model_id = "claude-3-5-sonnet-20241022";
    let limit = context_limit_for_model_display(model_id, "Claude 3.5 Sonnet");
    let usage = estimate_context_usage("test-session-123", limit);
    format!(
        "Token calculation test result:\n  Used: {} tokens\n  Limit: {} tokens\n  Percentage: {:.2}%\n  Is actual: {}\n  Formatted: {}/{}",
        usage.used,
        usage.limit,
        usage.percentage,
        usage.is_actual,
        format_tokens_compact(usage.used),
        format_tokens_compact(usage.limit)
    )
}

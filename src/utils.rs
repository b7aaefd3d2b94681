use std::env;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Ceiling used when no model family matches
pub const DEFAULT_CONTEXT_LIMIT: u64 = 200_000;

/// Known model families and their context ceilings, matched in order by
/// case-insensitive substring
const CONTEXT_LIMITS: &[(&str, u64)] = &[
    ("opus", 200_000),
    ("claude-3-opus", 200_000),
    ("claude-3-sonnet", 200_000),
    ("claude-3-haiku", 200_000),
    ("claude-2.1", 200_000),
    ("claude-2", 100_000),
    ("claude-instant", 100_000),
];

pub fn read_stdin() -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    std::io::stdin().read_to_end(&mut buf)?;
    Ok(buf)
}

pub(crate) fn static_context_limit_lookup(model_id: &str) -> Option<u64> {
    let m = model_id.to_lowercase();
    CONTEXT_LIMITS
        .iter()
        .find(|(family, _)| m.contains(family))
        .map(|(_, limit)| *limit)
}

// Context ceiling resolution:
// - CLAUDE_CONTEXT_LIMIT, if set, always wins
// - a "[1m]" display tag means the 1M-token variant
// - otherwise the family table, defaulting to 200k
pub fn context_limit_for_model_display(model_id: &str, display_name: &str) -> u64 {
    if let Some(override_limit) = parse_u64_env("CLAUDE_CONTEXT_LIMIT").filter(|v| *v > 0) {
        return override_limit;
    }
    let dn_l = display_name.to_lowercase();
    let mid_l = model_id.to_lowercase();
    if dn_l.contains("[1m]") || mid_l.ends_with("[1m]") || mid_l.ends_with("-1m") {
        return 1_000_000;
    }
    static_context_limit_lookup(model_id).unwrap_or(DEFAULT_CONTEXT_LIMIT)
}

pub fn parse_u64_env(var: &str) -> Option<u64> {
    env::var(var)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
}

pub fn parse_f64_env(var: &str) -> Option<f64> {
    env::var(var)
        .ok()
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Last path component, or the path itself for roots like `/`
pub fn dir_basename(p: &str) -> String {
    Path::new(p)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| p.to_string())
}

pub fn process_cwd() -> PathBuf {
    env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// `~/.claude`, used for the default helper location
pub fn claude_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".claude"))
}

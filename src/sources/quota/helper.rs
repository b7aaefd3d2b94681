//! Local helper executable transport.
//!
//! The helper prints one line of six pipe-delimited positional fields:
//!
//! ```text
//! <5h util>|<5h reset>|<weekly util>|<weekly reset>|<model util>|<model reset>
//! ```
//!
//! Reset fields are RFC 3339 instants, unix seconds, or empty/`null`. A field
//! starting with `ERROR` means the helper could not obtain data.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;

use super::QuotaError;
use crate::models::{QuotaSummary, UsageSnapshot};

pub const ERROR_MARKER: &str = "ERROR";
pub const FIELD_COUNT: usize = 6;
/// File name looked up under `~/.claude/bin` on platforms that ship the helper
pub const DEFAULT_HELPER_NAME: &str = "claude-usage-helper";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HelperParseError {
    #[error("expected 6 fields, found {0}")]
    FieldCount(usize),

    #[error("helper reported: {0}")]
    ErrorMarker(String),

    #[error("field {field}: invalid utilization {value:?}")]
    Utilization { field: usize, value: String },

    #[error("field {field}: invalid reset time {value:?}")]
    ResetTime { field: usize, value: String },
}

/// Parse the helper's single-line output into a normalized summary
pub fn parse_helper_output(text: &str) -> Result<QuotaSummary, HelperParseError> {
    let line = text.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    let fields: Vec<&str> = line.split('|').map(str::trim).collect();

    if let Some(marked) = fields.iter().find(|f| f.starts_with(ERROR_MARKER)) {
        return Err(HelperParseError::ErrorMarker((*marked).to_string()));
    }
    if fields.len() != FIELD_COUNT {
        return Err(HelperParseError::FieldCount(fields.len()));
    }

    let five_hour = parse_window(&fields, 0)?;
    let weekly = parse_window(&fields, 2)?;
    let model_specific = if fields[4].is_empty() && fields[5].is_empty() {
        None
    } else {
        Some(parse_window(&fields, 4)?)
    };

    Ok(QuotaSummary {
        five_hour,
        weekly,
        model_specific,
    })
}

fn parse_window(fields: &[&str], index: usize) -> Result<UsageSnapshot, HelperParseError> {
    let raw_util = fields[index];
    let utilization = raw_util
        .trim_end_matches('%')
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| HelperParseError::Utilization {
            field: index,
            value: raw_util.to_string(),
        })?;
    let resets_at = parse_reset(fields[index + 1]).map_err(|_| HelperParseError::ResetTime {
        field: index + 1,
        value: fields[index + 1].to_string(),
    })?;
    Ok(UsageSnapshot::from_raw(utilization, resets_at))
}

fn parse_reset(raw: &str) -> Result<Option<DateTime<Utc>>, ()> {
    if raw.is_empty() || raw.eq_ignore_ascii_case("null") {
        return Ok(None);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(Some)
        .ok_or(())
}

/// A trusted helper binary invoked with a bounded timeout
#[derive(Debug, Clone)]
pub struct HelperTransport {
    path: PathBuf,
    timeout: Duration,
}

impl HelperTransport {
    pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            timeout,
        }
    }

    /// An explicit path wins; otherwise only macOS has a default location
    pub fn discover(explicit: Option<&Path>, timeout: Duration) -> Option<Self> {
        if let Some(path) = explicit {
            return Some(Self::new(path, timeout));
        }
        if cfg!(target_os = "macos") {
            let path = crate::utils::claude_home()?.join("bin").join(DEFAULT_HELPER_NAME);
            return Some(Self::new(path, timeout));
        }
        None
    }

    pub fn is_available(&self) -> bool {
        self.path.is_file()
    }

    pub async fn run(&self) -> Result<QuotaSummary, QuotaError> {
        let child = tokio::process::Command::new(&self.path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| QuotaError::Helper(format!("spawn {}: {e}", self.path.display())))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(QuotaError::Helper(e.to_string())),
            // Dropping the wait future drops the child, which kills it
            Err(_) => return Err(QuotaError::Helper(format!("timed out after {:?}", self.timeout))),
        };

        if !output.status.success() {
            return Err(QuotaError::Helper(format!("exited with {}", output.status)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_helper_output(&stdout)?)
    }
}

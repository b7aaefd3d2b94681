//! Assistant CLI version discovery.
//!
//! Order: the version carried by the input descriptor, then
//! `claude --version`, then the global npm package listing. Nothing is
//! cached; a probe that outlives its deadline is dropped.

use once_cell::sync::Lazy;
use regex::Regex;
use std::process::Stdio;
use std::time::Duration;

use crate::sources::Acquisition;

pub const UNKNOWN_VERSION: &str = "?.?.?";
const NPM_PACKAGE: &str = "@anthropic-ai/claude-code";

static VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:claude/)?v?(\d+\.\d+\.\d+)").unwrap());
static NPM_PACKAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@anthropic-ai/claude-code@(\d+\.\d+\.\d+)").unwrap());

/// First `x.y.z` in `claude --version` style output
pub fn extract_version(text: &str) -> Option<String> {
    VERSION_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Version of the globally installed package in `npm list -g --depth=0` output
pub fn extract_npm_version(listing: &str) -> Option<String> {
    if let Some(caps) = NPM_PACKAGE_RE.captures(listing) {
        return caps.get(1).map(|m| m.as_str().to_string());
    }
    listing
        .lines()
        .find(|line| line.contains(NPM_PACKAGE))
        .and_then(extract_version)
}

async fn run_probe(program: &str, args: &[&str], timeout: Duration) -> Option<String> {
    let child = tokio::process::Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();
    let child = match child {
        Ok(child) => child,
        Err(err) => {
            tracing::debug!(program, "version probe not runnable: {}", err);
            return None;
        }
    };
    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => {
            // Some builds print the banner on stderr
            let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
            text.push_str(&String::from_utf8_lossy(&output.stderr));
            Some(text)
        }
        Ok(Err(err)) => {
            tracing::debug!(program, "version probe failed: {}", err);
            None
        }
        Err(_) => {
            tracing::debug!(program, ?timeout, "version probe timed out");
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct VersionSource {
    reported: Option<String>,
    cli_program: String,
    npm_program: String,
    cli_timeout: Duration,
    npm_timeout: Duration,
}

impl VersionSource {
    pub fn new(reported: Option<&str>) -> Self {
        Self {
            reported: reported
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
            cli_program: "claude".to_string(),
            npm_program: if cfg!(windows) { "npm.cmd" } else { "npm" }.to_string(),
            cli_timeout: Duration::from_secs(2),
            npm_timeout: Duration::from_secs(3),
        }
    }

    pub fn with_programs(mut self, cli: impl Into<String>, npm: impl Into<String>) -> Self {
        self.cli_program = cli.into();
        self.npm_program = npm.into();
        self
    }

    /// Same probe settings, answering with `reported` when it is present
    pub fn reporting(&self, reported: Option<&str>) -> Self {
        Self {
            reported: Self::new(reported).reported,
            ..self.clone()
        }
    }

    pub async fn probe(&self) -> Option<String> {
        if let Some(out) = run_probe(&self.cli_program, &["--version"], self.cli_timeout).await {
            if let Some(v) = extract_version(&out) {
                return Some(v);
            }
        }
        let listing = run_probe(&self.npm_program, &["list", "-g", "--depth=0"], self.npm_timeout).await?;
        extract_npm_version(&listing)
    }
}

impl Acquisition for VersionSource {
    type Value = String;

    fn name(&self) -> &'static str {
        "version"
    }

    fn cached_only(&self) -> Option<String> {
        self.reported.clone()
    }

    fn display_value(&self) -> impl Future<Output = String> + Send {
        async move {
            if let Some(reported) = self.cached_only() {
                return reported;
            }
            self.probe().await.unwrap_or_else(|| UNKNOWN_VERSION.to_string())
        }
    }

    fn placeholder(&self) -> String {
        UNKNOWN_VERSION.to_string()
    }

    fn refreshes_cache(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_version() {
        assert_eq!(extract_version("1.0.88 (Claude Code)").as_deref(), Some("1.0.88"));
        assert_eq!(extract_version("claude/v2.0.14 linux-x64").as_deref(), Some("2.0.14"));
        assert_eq!(extract_version("v0.2.9\n").as_deref(), Some("0.2.9"));
        assert_eq!(extract_version("command not found"), None);
    }

    #[test]
    fn test_extract_npm_version() {
        let listing = "/usr/local/lib\n├── @anthropic-ai/claude-code@1.0.88\n└── npm@10.8.2\n";
        assert_eq!(extract_npm_version(listing).as_deref(), Some("1.0.88"));
        assert_eq!(extract_npm_version("└── npm@10.8.2\n"), None);
    }

    #[tokio::test]
    async fn test_reported_version_short_circuits() {
        let source = VersionSource::new(Some(" 1.2.3 ")).with_programs("/nonexistent/claude", "/nonexistent/npm");
        assert_eq!(source.cached_only().as_deref(), Some("1.2.3"));
        assert_eq!(source.display_value().await, "1.2.3");
    }

    #[tokio::test]
    async fn test_missing_programs_yield_unknown() {
        let source = VersionSource::new(None).with_programs("/nonexistent/claude", "/nonexistent/npm");
        assert_eq!(source.cached_only(), None);
        assert_eq!(source.display_value().await, UNKNOWN_VERSION);
    }
}

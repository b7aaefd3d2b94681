//! # Enhanced Statusline
//!
//! A single-shot, two-line status summary for Claude Code sessions: model,
//! directory, git branch, clock, weather, bitcoin price and tool version on
//! the first line; context-window utilization and quota metering on the
//! second.
//!
//! ## Overview
//!
//! A JSON session descriptor arrives on stdin. Local data is computed
//! directly; remote data goes through a time-bounded acquisition layer:
//! - a TTL + version aware disk cache shared between invocations
//! - a retrying fetcher whose attempts are raced against timers
//! - per-source fallback chains that degrade to placeholders, never errors
//!
//! ## Features
//!
//! - `git` (default): Enables repository inspection via gix
//! - `colors` (default): Enables terminal color output via owo-colors

/// Timestamped JSON cache files shared across invocations
pub mod cache;

/// Command-line flags and resolved configuration
pub mod cli;

/// Injectable time source
pub mod clock;

/// Debug snapshot and terminal environment reporting
pub mod diagnostics;

/// Line rendering, progress bars and countdowns
pub mod display;

/// Bounded remote fetcher with retry
pub mod fetch;

/// Git repository inspection (feature-gated)
#[cfg(feature = "git")]
pub mod git;

/// Data models for the session descriptor, transcripts, quota and weather
pub mod models;

/// Weather, price and quota acquisition strategies
pub mod sources;

/// Two-line assembly with per-source deadlines
pub mod statusline;

/// Context-window usage from transcripts, with a deterministic estimate
pub mod usage;

/// Utility functions for paths, env parsing and model limits
pub mod utils;

/// Assistant CLI version discovery
pub mod version;

/// Model label shown when the descriptor names none
pub const DEFAULT_MODEL_LABEL: &str = "Opus 4.1";

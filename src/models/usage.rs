use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Quota state for one metering window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Integer percentage in `0..=100`
    pub utilization: u8,
    pub resets_at: Option<DateTime<Utc>>,
}

impl UsageSnapshot {
    /// Round and clamp a raw utilization reading
    pub fn from_raw(utilization: f64, resets_at: Option<DateTime<Utc>>) -> Self {
        let pct = if utilization.is_finite() {
            utilization.round().clamp(0.0, 100.0) as u8
        } else {
            0
        };
        Self {
            utilization: pct,
            resets_at,
        }
    }

    /// A reset instant at or before `now` reads as "resetting soon"
    pub fn resets_soon(&self, now: DateTime<Utc>) -> bool {
        self.resets_at.is_some_and(|r| r <= now)
    }
}

/// Normalized output of every quota transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaSummary {
    pub five_hour: UsageSnapshot,
    pub weekly: UsageSnapshot,
    pub model_specific: Option<UsageSnapshot>,
}

/// Derived token-budget state for the current session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextUsage {
    pub used: u64,
    pub limit: u64,
    pub percentage: f64,
    /// `true` only when measured from a transcript; `false` for the estimate
    pub is_actual: bool,
}

use chrono::{DateTime, Utc};

#[cfg(feature = "colors")]
use owo_colors::OwoColorize;

// Provide a no-op color shim when "colors" feature is disabled
#[cfg(not(feature = "colors"))]
pub mod color_shim {
    use std::fmt::{self, Display, Formatter};

    #[derive(Clone)]
    pub struct Plain(pub String);

    impl Display for Plain {
        fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
            f.write_str(&self.0)
        }
    }

    pub trait ColorizeShim {
        fn as_str(&self) -> &str;

        fn blue(&self) -> Plain {
            Plain(self.as_str().to_string())
        }
        fn cyan(&self) -> Plain {
            Plain(self.as_str().to_string())
        }
        fn green(&self) -> Plain {
            Plain(self.as_str().to_string())
        }
        fn magenta(&self) -> Plain {
            Plain(self.as_str().to_string())
        }
        fn red(&self) -> Plain {
            Plain(self.as_str().to_string())
        }
        fn yellow(&self) -> Plain {
            Plain(self.as_str().to_string())
        }
        fn bold(&self) -> Plain {
            Plain(self.as_str().to_string())
        }
        fn dimmed(&self) -> Plain {
            Plain(self.as_str().to_string())
        }
    }

    impl ColorizeShim for &str {
        fn as_str(&self) -> &str {
            self
        }
    }
    impl ColorizeShim for Plain {
        fn as_str(&self) -> &str {
            &self.0
        }
    }
}

#[cfg(not(feature = "colors"))]
use color_shim::ColorizeShim as OwoColorize;

use crate::models::{ContextUsage, QuotaSummary, UsageSnapshot};

pub const SEPARATOR: &str = " │ ";
pub const CONTEXT_BAR_WIDTH: usize = 20;
pub const QUOTA_BAR_WIDTH: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Blue,
    Cyan,
    Green,
    Magenta,
    Red,
    Yellow,
    BoldCyan,
    BoldGreen,
    BoldYellow,
    Dim,
    DimYellow,
}

/// Applies tones when color output is enabled, passes text through otherwise
#[derive(Debug, Clone, Copy)]
pub struct Painter {
    enabled: bool,
}

impl Painter {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: enabled && cfg!(feature = "colors"),
        }
    }

    pub fn plain() -> Self {
        Self { enabled: false }
    }

    pub fn paint(&self, text: &str, tone: Tone) -> String {
        if !self.enabled {
            return text.to_string();
        }
        match tone {
            Tone::Blue => text.blue().to_string(),
            Tone::Cyan => text.cyan().to_string(),
            Tone::Green => text.green().to_string(),
            Tone::Magenta => text.magenta().to_string(),
            Tone::Red => text.red().to_string(),
            Tone::Yellow => text.yellow().to_string(),
            Tone::BoldCyan => text.cyan().bold().to_string(),
            Tone::BoldGreen => text.green().bold().to_string(),
            Tone::BoldYellow => text.yellow().bold().to_string(),
            Tone::Dim => text.dimmed().to_string(),
            Tone::DimYellow => text.yellow().dimmed().to_string(),
        }
    }
}

/// Green up to 70%, yellow above, red above 85%
pub fn bar_tone(pct: f64) -> Tone {
    if pct > 85.0 {
        Tone::Red
    } else if pct > 70.0 {
        Tone::Yellow
    } else {
        Tone::Green
    }
}

/// `width` cells of `█`/`░`; the filled count is rounded and clamped to the width
pub fn progress_bar(pct: f64, width: usize) -> String {
    let ratio = if pct.is_finite() { (pct / 100.0).clamp(0.0, 1.0) } else { 0.0 };
    let filled = ((ratio * width as f64).round() as usize).min(width);
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

/// `23_456` → `23K`; values under a thousand print as-is
pub fn format_tokens_compact(n: u64) -> String {
    if n >= 1000 {
        format!("{}K", (n as f64 / 1000.0).round() as u64)
    } else {
        n.to_string()
    }
}

/// Time until `resets_at`: `2d 4h`, `3h12m`, `45m`, or `soon` once it has passed
pub fn format_countdown(resets_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let remaining = resets_at - now;
    if remaining.num_seconds() <= 0 {
        return "soon".to_string();
    }
    let days = remaining.num_days();
    let hours = remaining.num_hours() % 24;
    let minutes = remaining.num_minutes() % 60;
    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h{minutes}m")
    } else {
        format!("{}m", minutes.max(1))
    }
}

/// Line-1 values, already resolved
#[derive(Debug, Clone, Default)]
pub struct HeaderSegments {
    pub model: String,
    pub dir: String,
    pub git: Option<String>,
    pub date: String,
    pub time: String,
    pub weekday: String,
    pub weather: String,
    pub price: String,
    pub version: String,
}

pub fn render_header(segments: &HeaderSegments, painter: &Painter) -> String {
    let mut parts = vec![
        painter.paint(&format!("🤖 {}", segments.model), Tone::BoldCyan),
        painter.paint("⚡", Tone::BoldYellow),
        painter.paint(&format!("📁 {}", segments.dir), Tone::Blue),
    ];
    if let Some(git) = segments.git.as_deref() {
        parts.push(painter.paint(&format!("🌿 {git}"), Tone::Green));
    }
    parts.push(painter.paint(&format!("📅 {}", segments.date), Tone::Magenta));
    parts.push(painter.paint(&format!("⏰ {}", segments.time), Tone::Yellow));
    parts.push(painter.paint(&format!("📆 {}", segments.weekday), Tone::Cyan));
    parts.push(painter.paint(&segments.weather, Tone::Green));
    parts.push(painter.paint(&segments.price, Tone::Yellow));
    parts.push(painter.paint(&format!("🔧 {}", segments.version), Tone::Magenta));
    parts.join(SEPARATOR)
}

pub fn render_context(usage: &ContextUsage, painter: &Painter) -> String {
    let indicator = if usage.is_actual {
        painter.paint("●", Tone::BoldGreen)
    } else {
        painter.paint("~", Tone::DimYellow)
    };
    let bar = painter.paint(
        &progress_bar(usage.percentage, CONTEXT_BAR_WIDTH),
        bar_tone(usage.percentage),
    );
    let tokens = painter.paint(
        &format!(
            "[{}/{}]",
            format_tokens_compact(usage.used),
            format_tokens_compact(usage.limit)
        ),
        Tone::Dim,
    );
    format!(
        "{} {} {} {:.1}% {}",
        painter.paint("Context:", Tone::Dim),
        indicator,
        bar,
        usage.percentage,
        tokens
    )
}

fn render_window(label: &str, snapshot: &UsageSnapshot, now: DateTime<Utc>, painter: &Painter) -> String {
    let pct = f64::from(snapshot.utilization);
    let mut out = format!(
        "{} {} {}%",
        painter.paint(label, Tone::Dim),
        painter.paint(&progress_bar(pct, QUOTA_BAR_WIDTH), bar_tone(pct)),
        snapshot.utilization
    );
    if let Some(resets_at) = snapshot.resets_at {
        let countdown = if snapshot.resets_soon(now) {
            "soon".to_string()
        } else {
            format_countdown(resets_at, now)
        };
        out.push(' ');
        out.push_str(&painter.paint(&format!("↻{countdown}"), Tone::Dim));
    }
    out
}

/// Line 2: context bar, then quota windows when metering data is present
pub fn render_usage_line(
    usage: &ContextUsage,
    quota: Option<&QuotaSummary>,
    now: DateTime<Utc>,
    painter: &Painter,
) -> String {
    let mut parts = vec![render_context(usage, painter)];
    if let Some(q) = quota {
        parts.push(render_window("5h:", &q.five_hour, now, painter));
        parts.push(render_window("7d:", &q.weekly, now, painter));
        if let Some(model) = q.model_specific.as_ref() {
            parts.push(render_window("opus:", model, now, painter));
        }
    }
    parts.join(SEPARATOR)
}

/// Fixed line 2 used when the input descriptor could not be parsed
pub fn render_fallback_usage_line(painter: &Painter) -> String {
    format!(
        "{} {} {} 10.0% {}",
        painter.paint("Context:", Tone::Dim),
        painter.paint("~", Tone::DimYellow),
        painter.paint(&progress_bar(10.0, CONTEXT_BAR_WIDTH), bar_tone(10.0)),
        painter.paint("[20K/200K]", Tone::Dim)
    )
}

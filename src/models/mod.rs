pub mod git;
pub mod hook;
pub mod message;
pub mod usage;
pub mod weather;

pub use git::GitInfo;
pub use hook::HookJson;
pub use message::{MessageUsage, TranscriptLine};
pub use usage::{ContextUsage, QuotaSummary, UsageSnapshot};
pub use weather::WeatherReport;

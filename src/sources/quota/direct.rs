//! Direct HTTPS transport using a stored claude.ai session key.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::QuotaError;
use crate::fetch::{FetchError, Fetcher, HttpRequest, RetryPolicy};
use crate::models::{QuotaSummary, UsageSnapshot};

pub const DEFAULT_BASE_URL: &str = "https://claude.ai";

/// Session key + organization id, read from the per-user credentials file
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    #[serde(rename = "sessionKey", alias = "session_key")]
    pub session_key: String,
    #[serde(rename = "organizationId", alias = "organization_id")]
    pub organization_id: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("session_key", &"<redacted>")
            .field("organization_id", &self.organization_id)
            .finish()
    }
}

impl Credentials {
    /// `Ok(None)` when the file does not exist; the feature is opt-in
    pub fn load(path: &Path) -> Result<Option<Self>, QuotaError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(QuotaError::InvalidCredentials(e.to_string())),
        };
        let creds: Credentials = serde_json::from_str(&raw)
            .map_err(|e| QuotaError::InvalidCredentials(format!("{}: {e}", path.display())))?;
        creds.validate().map(Some)
    }

    /// Reject values that could escape the URL path or header they are spliced into
    pub fn validate(self) -> Result<Self, QuotaError> {
        let session_key = self.session_key.trim().to_string();
        let organization_id = self.organization_id.trim().to_string();
        for (name, value) in [("sessionKey", &session_key), ("organizationId", &organization_id)] {
            if !is_safe_credential(value) {
                return Err(QuotaError::InvalidCredentials(format!(
                    "{name} contains forbidden characters"
                )));
            }
        }
        Ok(Self {
            session_key,
            organization_id,
        })
    }
}

fn is_safe_credential(value: &str) -> bool {
    !value.is_empty()
        && !value.contains("..")
        && !value
            .chars()
            .any(|c| matches!(c, '/' | '\\' | ';' | '?' | '#' | '%') || c.is_control() || c.is_whitespace())
}

#[derive(Debug, Deserialize)]
struct UsageLimitDto {
    utilization: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_optional_datetime")]
    resets_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct UsageResponseDto {
    #[serde(default)]
    five_hour: Option<UsageLimitDto>,
    #[serde(default)]
    seven_day: Option<UsageLimitDto>,
    #[serde(default)]
    seven_day_opus: Option<UsageLimitDto>,
    #[serde(default)]
    seven_day_sonnet: Option<UsageLimitDto>,
}

impl From<UsageLimitDto> for UsageSnapshot {
    fn from(value: UsageLimitDto) -> Self {
        UsageSnapshot::from_raw(value.utilization.unwrap_or(0.0), value.resets_at)
    }
}

/// Normalize the organization usage endpoint's body
pub fn parse_usage_response(body: &str) -> Result<QuotaSummary, FetchError> {
    let dto: UsageResponseDto =
        serde_json::from_str(body).map_err(|e| FetchError::InvalidResponse(e.to_string()))?;
    if dto.five_hour.is_none() && dto.seven_day.is_none() {
        return Err(FetchError::InvalidResponse(
            "usage response has no metering windows".into(),
        ));
    }
    let empty = || UsageSnapshot::from_raw(0.0, None);
    Ok(QuotaSummary {
        five_hour: dto.five_hour.map(UsageSnapshot::from).unwrap_or_else(empty),
        weekly: dto.seven_day.map(UsageSnapshot::from).unwrap_or_else(empty),
        model_specific: dto
            .seven_day_opus
            .or(dto.seven_day_sonnet)
            .filter(|w| w.utilization.is_some())
            .map(UsageSnapshot::from),
    })
}

#[derive(Clone)]
pub struct DirectTransport {
    credentials_path: PathBuf,
    fetcher: Fetcher,
    policy: RetryPolicy,
    base_url: String,
}

impl DirectTransport {
    pub const POLICY: RetryPolicy = RetryPolicy::new(2, Duration::from_secs(5));

    pub fn new(credentials_path: impl Into<PathBuf>, fetcher: Fetcher) -> Self {
        Self {
            credentials_path: credentials_path.into(),
            fetcher,
            policy: Self::POLICY,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn credentials_path(&self) -> &Path {
        &self.credentials_path
    }

    pub fn request_for(&self, creds: &Credentials) -> HttpRequest {
        let url = format!(
            "{}/api/organizations/{}/usage",
            self.base_url.trim_end_matches('/'),
            creds.organization_id
        );
        HttpRequest::get(url)
            .header("Cookie", format!("sessionKey={}", creds.session_key))
            .header("Accept", "application/json")
            .header("anthropic-client-platform", "web_claude_ai")
    }

    pub async fn run(&self, creds: &Credentials) -> Result<QuotaSummary, QuotaError> {
        let body = self.fetcher.fetch(&self.request_for(creds), self.policy).await?;
        Ok(parse_usage_response(&body)?)
    }
}

fn deserialize_optional_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    if let Some(s) = opt {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom)
    } else {
        Ok(None)
    }
}

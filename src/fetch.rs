//! # Fetch Module
//!
//! Time-bounded outbound requests with exponential-backoff retry.
//!
//! The transport itself is blocking (`ureq`), so every attempt runs on
//! tokio's blocking pool and is raced against a timer. A timed-out attempt is
//! abandoned rather than joined; ureq's own global timeout tears the socket
//! down shortly after.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_USER_AGENT: &str = concat!("enhanced-statusline/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("request task failed: {0}")]
    TaskFailed(String),

    #[error("gave up after {attempts} attempts")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// Innermost cause, looking through `RetriesExhausted`
    pub fn root(&self) -> &FetchError {
        match self {
            FetchError::RetriesExhausted { last, .. } => last.root(),
            other => other,
        }
    }
}

/// A GET request description; cheap to clone into a blocking task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Performs one blocking request and returns the body on a 2xx response
pub trait HttpTransport: Send + Sync {
    fn get(&self, request: &HttpRequest, timeout: Duration) -> Result<String, FetchError>;
}

/// Production transport backed by a shared keep-alive `ureq` agent
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .max_idle_connections_per_host(5)
            .max_idle_age(Duration::from_secs(30))
            .build();
        Self {
            agent: config.into(),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport for UreqTransport {
    fn get(&self, request: &HttpRequest, timeout: Duration) -> Result<String, FetchError> {
        let mut builder = self
            .agent
            .get(request.url.as_str())
            .config()
            .timeout_global(Some(timeout))
            .build();
        if request.header_value("user-agent").is_none() {
            builder = builder.header("User-Agent", DEFAULT_USER_AGENT);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let mut response = builder.call().map_err(|err| match err {
            ureq::Error::Timeout(_) => FetchError::Timeout(timeout),
            other => FetchError::Transport(other.to_string()),
        })?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(FetchError::Status(status));
        }

        response
            .body_mut()
            .read_to_string()
            .map_err(|err| FetchError::Transport(err.to_string()))
    }
}

/// Attempt budget for one logical lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    /// Delay before the second attempt; doubles for each one after
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, attempt_timeout: Duration) -> Self {
        Self {
            max_attempts,
            attempt_timeout,
            initial_backoff: Duration::from_millis(100),
        }
    }

    /// Sum of all backoff sleeps when every attempt fails
    pub fn total_backoff(&self) -> Duration {
        (1..self.max_attempts.max(1))
            .map(|k| self.initial_backoff * 2u32.saturating_pow(k - 1))
            .sum()
    }

    /// Upper bound on wall time for a fully failing lookup
    pub fn worst_case(&self) -> Duration {
        self.total_backoff() + self.attempt_timeout * self.max_attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(3))
    }
}

/// Cloneable handle that applies a [`RetryPolicy`] to a shared transport
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn HttpTransport>,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    pub async fn fetch(&self, request: &HttpRequest, policy: RetryPolicy) -> Result<String, FetchError> {
        let attempts = policy.max_attempts.max(1);
        let mut delay = policy.initial_backoff;
        let mut last_error = None;

        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            match self.attempt(request, policy.attempt_timeout).await {
                Ok(body) => return Ok(body),
                Err(err) => {
                    tracing::debug!(url = %request.url, attempt, "fetch attempt failed: {}", err);
                    last_error = Some(err);
                }
            }
        }

        let last = last_error.unwrap_or(FetchError::TaskFailed("no attempt was made".into()));
        Err(FetchError::RetriesExhausted {
            attempts,
            last: Box::new(last),
        })
    }

    async fn attempt(&self, request: &HttpRequest, timeout: Duration) -> Result<String, FetchError> {
        let transport = Arc::clone(&self.transport);
        let owned = request.clone();
        let task = tokio::task::spawn_blocking(move || transport.get(&owned, timeout));

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(FetchError::TaskFailed(join_err.to_string())),
            Err(_) => Err(FetchError::Timeout(timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::new(3, Duration::from_secs(3));
        assert_eq!(policy.total_backoff(), Duration::from_millis(300));
        assert_eq!(policy.worst_case(), Duration::from_millis(9_300));

        let single = RetryPolicy::new(1, Duration::from_secs(1));
        assert_eq!(single.total_backoff(), Duration::ZERO);

        let four = RetryPolicy::new(4, Duration::from_secs(1));
        assert_eq!(four.total_backoff(), Duration::from_millis(700));
    }

    #[test]
    fn test_root_cause_survives_wrapping() {
        let err = FetchError::RetriesExhausted {
            attempts: 2,
            last: Box::new(FetchError::Status(503)),
        };
        assert!(matches!(err.root(), FetchError::Status(503)));
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("unexpected HTTP status 503"));
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let req = HttpRequest::get("https://example.invalid").header("Cookie", "sessionKey=abc");
        assert_eq!(req.header_value("cookie"), Some("sessionKey=abc"));
        assert_eq!(req.header_value("accept"), None);
    }
}

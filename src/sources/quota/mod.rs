//! # Quota Source
//!
//! Usage-quota metering through an ordered list of transports. Each
//! transport either declines (`NotApplicable`) or completes with a result;
//! the first one that applies decides the outcome. When none applies the
//! feature is simply not configured and no quota segment is rendered.

pub mod direct;
pub mod helper;

use thiserror::Error;

pub use direct::{Credentials, DirectTransport};
pub use helper::{HelperParseError, HelperTransport, parse_helper_output};

use super::Acquisition;
use crate::cache::{self, CacheStore};
use crate::fetch::FetchError;
use crate::models::QuotaSummary;

#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("quota metering is not configured")]
    NotConfigured,

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("usage helper failed: {0}")]
    Helper(String),

    #[error("malformed helper output: {0}")]
    Parse(#[from] HelperParseError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

pub enum TransportOutcome {
    NotApplicable,
    Completed(Result<QuotaSummary, QuotaError>),
}

/// One way of obtaining quota data, tried in list order
#[derive(Clone)]
pub enum TransportStrategy {
    Helper(HelperTransport),
    Direct(DirectTransport),
}

impl TransportStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            TransportStrategy::Helper(_) => "helper",
            TransportStrategy::Direct(_) => "direct",
        }
    }

    pub async fn attempt(&self) -> TransportOutcome {
        match self {
            TransportStrategy::Helper(helper) => {
                if !helper.is_available() {
                    return TransportOutcome::NotApplicable;
                }
                TransportOutcome::Completed(helper.run().await)
            }
            TransportStrategy::Direct(direct) => match Credentials::load(direct.credentials_path()) {
                Ok(None) => TransportOutcome::NotApplicable,
                Ok(Some(creds)) => TransportOutcome::Completed(direct.run(&creds).await),
                Err(err) => TransportOutcome::Completed(Err(err)),
            },
        }
    }
}

pub struct QuotaSource {
    strategies: Vec<TransportStrategy>,
    cache: CacheStore,
}

impl QuotaSource {
    pub fn new(strategies: Vec<TransportStrategy>, cache: CacheStore) -> Self {
        Self { strategies, cache }
    }

    /// A source with no transports; always reports `NotConfigured`
    pub fn disabled(cache: CacheStore) -> Self {
        Self::new(Vec::new(), cache)
    }

    pub async fn fetch_summary(&self) -> Result<QuotaSummary, QuotaError> {
        for strategy in &self.strategies {
            match strategy.attempt().await {
                TransportOutcome::NotApplicable => {
                    tracing::debug!(transport = strategy.name(), "quota transport not applicable");
                }
                TransportOutcome::Completed(result) => {
                    tracing::debug!(
                        transport = strategy.name(),
                        ok = result.is_ok(),
                        "quota transport selected"
                    );
                    let summary = result?;
                    self.cache.write(&cache::USAGE, &summary);
                    return Ok(summary);
                }
            }
        }
        Err(QuotaError::NotConfigured)
    }
}

impl Acquisition for QuotaSource {
    type Value = Option<QuotaSummary>;

    fn name(&self) -> &'static str {
        "quota"
    }

    fn cached_only(&self) -> Option<Option<QuotaSummary>> {
        self.cache.read::<QuotaSummary>(&cache::USAGE).map(Some)
    }

    fn display_value(&self) -> impl Future<Output = Option<QuotaSummary>> + Send {
        async move {
            if let Some(cached) = self.cached_only() {
                return cached;
            }
            match self.fetch_summary().await {
                Ok(summary) => Some(summary),
                Err(QuotaError::NotConfigured) => {
                    tracing::debug!("quota metering not configured");
                    None
                }
                Err(err) => {
                    tracing::warn!("quota unavailable: {}", err);
                    None
                }
            }
        }
    }

    fn placeholder(&self) -> Option<QuotaSummary> {
        None
    }
}

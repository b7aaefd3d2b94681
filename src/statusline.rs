//! # Status Assembler
//!
//! Resolves every segment of the two output lines. Local data (model,
//! directory, git, clock, context usage) is computed inline; each remote
//! source is answered from cache when possible and otherwise raced against
//! its deadline. A source that loses the race is shown as its placeholder
//! and its task is kept as a background refresh that may still populate
//! the cache for the next invocation.

use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::cache::{CacheStore, FileBackend};
use crate::cli::{Deadlines, StatuslineConfig};
use crate::clock::{Clock, SystemClock};
use crate::diagnostics::{DebugSnapshot, write_debug_snapshot};
use crate::display::{
    HeaderSegments, Painter, render_fallback_usage_line, render_header, render_usage_line,
};
use crate::fetch::{Fetcher, UreqTransport};
use crate::models::{ContextUsage, GitInfo, HookJson};
use crate::sources::quota::{DirectTransport, HelperTransport, TransportStrategy};
use crate::sources::{Acquisition, PriceSource, QuotaSource, WeatherSource};
use crate::usage::compute_usage;
use crate::utils::{dir_basename, process_cwd};
use crate::version::VersionSource;

const HELPER_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Full,
    /// The input descriptor did not parse; only local and cached data is shown
    Fallback,
}

/// The two output lines plus fetches still running in the background
#[derive(Debug)]
pub struct RenderedStatus {
    pub lines: [String; 2],
    pub context: Option<ContextUsage>,
    pub mode: RenderMode,
    pending: Vec<JoinHandle<()>>,
}

impl RenderedStatus {
    pub fn pending_jobs(&self) -> usize {
        self.pending.len()
    }

    /// Give abandoned fetches up to `grace` to finish and write their cache entries
    pub async fn finish_background(self, grace: Duration) {
        if self.pending.is_empty() {
            return;
        }
        let jobs = self.pending.len();
        let joined = tokio::time::timeout(grace, async move {
            for handle in self.pending {
                let _ = handle.await;
            }
        })
        .await;
        if joined.is_err() {
            tracing::debug!(jobs, ?grace, "background refresh cut short");
        }
    }
}

/// Drive `future` on a current-thread runtime, then return without waiting
/// for blocking-pool requests that are still in flight
pub fn run_detached<F: Future>(future: F) -> std::io::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let output = runtime.block_on(future);
    runtime.shutdown_background();
    Ok(output)
}

/// Answer from cache, or race the acquisition against `deadline`
async fn acquire<S: Acquisition>(source: Arc<S>, deadline: Duration) -> (S::Value, Option<JoinHandle<()>>) {
    if let Some(cached) = source.cached_only() {
        return (cached, None);
    }

    let (tx, rx) = tokio::sync::oneshot::channel();
    let task_source = Arc::clone(&source);
    let handle = tokio::spawn(async move {
        let value = task_source.display_value().await;
        let _ = tx.send(value);
    });

    match tokio::time::timeout(deadline, rx).await {
        Ok(Ok(value)) => (value, None),
        Ok(Err(_)) => {
            tracing::warn!(source = source.name(), "acquisition task ended without a value");
            (source.placeholder(), None)
        }
        Err(_) => {
            tracing::debug!(source = source.name(), ?deadline, "deadline expired, using placeholder");
            if source.refreshes_cache() {
                (source.placeholder(), Some(handle))
            } else {
                handle.abort();
                (source.placeholder(), None)
            }
        }
    }
}

fn read_git(dir: &Path) -> Option<GitInfo> {
    #[cfg(feature = "git")]
    {
        crate::git::read_git_info(dir)
    }
    #[cfg(not(feature = "git"))]
    {
        let _ = dir;
        None
    }
}

pub struct StatusAssembler {
    clock: Arc<dyn Clock>,
    weather: Arc<WeatherSource>,
    price: Arc<PriceSource>,
    quota: Arc<QuotaSource>,
    version: VersionSource,
    deadlines: Deadlines,
    painter: Painter,
    cwd: PathBuf,
    snapshot_dir: Option<PathBuf>,
}

impl StatusAssembler {
    pub fn new(clock: Arc<dyn Clock>, weather: WeatherSource, price: PriceSource, quota: QuotaSource) -> Self {
        Self {
            clock,
            weather: Arc::new(weather),
            price: Arc::new(price),
            quota: Arc::new(quota),
            version: VersionSource::new(None),
            deadlines: Deadlines::default(),
            painter: Painter::plain(),
            cwd: process_cwd(),
            snapshot_dir: None,
        }
    }

    /// Production wiring: file cache, ureq transport, system clock
    pub fn from_config(config: &StatuslineConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let cache = CacheStore::new(Arc::new(FileBackend::new(&config.cache_dir)), Arc::clone(&clock));
        let fetcher = Fetcher::new(Arc::new(UreqTransport::new()));

        let weather = WeatherSource::new(config.location.clone(), fetcher.clone(), cache.clone());
        let price = PriceSource::new(fetcher.clone(), cache.clone());
        let quota = if config.usage_enabled {
            QuotaSource::new(quota_strategies(config, &fetcher), cache)
        } else {
            QuotaSource::disabled(cache)
        };

        let mut assembler = Self::new(clock, weather, price, quota)
            .with_deadlines(config.deadlines)
            .with_painter(Painter::new(config.color));
        if config.debug {
            assembler = assembler.with_snapshot_dir(config.cache_dir.clone());
        }
        assembler
    }

    pub fn with_version(mut self, version: VersionSource) -> Self {
        self.version = version;
        self
    }

    pub fn with_deadlines(mut self, deadlines: Deadlines) -> Self {
        self.deadlines = deadlines;
        self
    }

    pub fn with_painter(mut self, painter: Painter) -> Self {
        self.painter = painter;
        self
    }

    /// Directory used when the descriptor names none, and in fallback mode
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = Some(dir.into());
        self
    }

    /// Render from raw stdin bytes; never fails
    pub async fn render(&self, raw: &[u8]) -> RenderedStatus {
        match HookJson::parse(raw) {
            Ok(hook) => self.render_hook(&hook).await,
            Err(err) => {
                tracing::warn!("input descriptor unreadable, using fallback mode: {}", err);
                self.render_fallback().await
            }
        }
    }

    pub async fn render_hook(&self, hook: &HookJson) -> RenderedStatus {
        let now = self.clock.now();
        if let Some(dir) = self.snapshot_dir.as_deref() {
            write_debug_snapshot(dir, &DebugSnapshot::capture(hook, now));
        }

        let current_dir = hook
            .current_dir()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.cwd.clone());
        let context = compute_usage(hook);
        let git = read_git(&current_dir).and_then(|g| g.label());

        let version = Arc::new(self.version.reporting(hook.version()));
        let ((weather, weather_job), (price, price_job), (quota, quota_job), (version, version_job)) = tokio::join!(
            acquire(Arc::clone(&self.weather), self.deadlines.weather),
            acquire(Arc::clone(&self.price), self.deadlines.price),
            acquire(Arc::clone(&self.quota), self.deadlines.quota),
            acquire(version, self.deadlines.version),
        );

        let local = now.with_timezone(&Local);
        let segments = HeaderSegments {
            model: hook.model_display_name().to_string(),
            dir: dir_basename(&current_dir.to_string_lossy()),
            git,
            date: local.format("%m/%d/%y").to_string(),
            time: local.format("%H:%M:%S").to_string(),
            weekday: local.format("%a").to_string(),
            weather: weather.display,
            price,
            version,
        };

        RenderedStatus {
            lines: [
                render_header(&segments, &self.painter),
                render_usage_line(&context, quota.as_ref(), now, &self.painter),
            ],
            context: Some(context),
            mode: RenderMode::Full,
            pending: [weather_job, price_job, quota_job, version_job]
                .into_iter()
                .flatten()
                .collect(),
        }
    }

    /// Reduced output from local data, cached values and the default model label
    pub async fn render_fallback(&self) -> RenderedStatus {
        let now = self.clock.now();
        let git = read_git(&self.cwd).and_then(|g| g.label());

        // Zero deadline: show what is cached, refresh the rest in the background
        let ((weather, weather_job), (price, price_job), (version, version_job)) = tokio::join!(
            acquire(Arc::clone(&self.weather), Duration::ZERO),
            acquire(Arc::clone(&self.price), Duration::ZERO),
            acquire(Arc::new(self.version.reporting(None)), self.deadlines.version),
        );

        let local = now.with_timezone(&Local);
        let segments = HeaderSegments {
            model: crate::DEFAULT_MODEL_LABEL.to_string(),
            dir: dir_basename(&self.cwd.to_string_lossy()),
            git,
            date: local.format("%m/%d/%y").to_string(),
            time: local.format("%H:%M:%S").to_string(),
            weekday: local.format("%a").to_string(),
            weather: weather.display,
            price,
            version,
        };

        RenderedStatus {
            lines: [
                render_header(&segments, &self.painter),
                render_fallback_usage_line(&self.painter),
            ],
            context: None,
            mode: RenderMode::Fallback,
            pending: [weather_job, price_job, version_job]
                .into_iter()
                .flatten()
                .collect(),
        }
    }
}

fn quota_strategies(config: &StatuslineConfig, fetcher: &Fetcher) -> Vec<TransportStrategy> {
    let mut strategies = Vec::new();
    if let Some(helper) = HelperTransport::discover(config.usage_helper.as_deref(), HELPER_TIMEOUT) {
        strategies.push(TransportStrategy::Helper(helper));
    }
    if let Some(path) = config.credentials_path.as_ref() {
        strategies.push(TransportStrategy::Direct(DirectTransport::new(path, fetcher.clone())));
    }
    strategies
}

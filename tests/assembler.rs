use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;

use enhanced_statusline::cache::{self, CacheStore, MemoryBackend};
use enhanced_statusline::cli::Deadlines;
use enhanced_statusline::clock::ManualClock;
use enhanced_statusline::fetch::{FetchError, Fetcher, HttpRequest, HttpTransport, RetryPolicy};
use enhanced_statusline::models::WeatherReport;
use enhanced_statusline::sources::price::UNAVAILABLE_DISPLAY as PRICE_UNAVAILABLE;
use enhanced_statusline::sources::weather::WeatherLocation;
use enhanced_statusline::sources::{PriceSource, QuotaSource, WeatherSource};
use enhanced_statusline::statusline::{RenderMode, StatusAssembler};
use enhanced_statusline::version::VersionSource;

/// Network disabled
struct OfflineTransport;

impl HttpTransport for OfflineTransport {
    fn get(&self, _request: &HttpRequest, _timeout: Duration) -> Result<String, FetchError> {
        Err(FetchError::Transport("network unreachable".into()))
    }
}

/// Never answers within any deadline used here
struct HangingTransport;

impl HttpTransport for HangingTransport {
    fn get(&self, _request: &HttpRequest, _timeout: Duration) -> Result<String, FetchError> {
        std::thread::sleep(Duration::from_millis(400));
        Err(FetchError::Transport("gave up".into()))
    }
}

/// Answers correctly, but only after every deadline used here has passed
struct SlowTransport;

impl HttpTransport for SlowTransport {
    fn get(&self, request: &HttpRequest, _timeout: Duration) -> Result<String, FetchError> {
        std::thread::sleep(Duration::from_millis(250));
        if request.url.contains("wttr.in") {
            Ok("+72°F|Sunny|New York, United States".into())
        } else {
            Ok(r#"{"data":{"currency":"BTC","rates":{"USD":"97432.18"}}}"#.into())
        }
    }
}

fn assembler(transport: Arc<dyn HttpTransport>, backend: Arc<MemoryBackend>) -> StatusAssembler {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
    ));
    let store = CacheStore::new(backend, clock.clone());
    let fetcher = Fetcher::new(transport);
    let quick = RetryPolicy::new(1, Duration::from_millis(300));

    let weather = WeatherSource::new(WeatherLocation::default(), fetcher.clone(), store.clone())
        .with_policy(quick);
    let price = PriceSource::new(fetcher, store.clone()).with_policy(quick);
    let quota = QuotaSource::disabled(store);

    StatusAssembler::new(clock, weather, price, quota)
        .with_version(VersionSource::new(None).with_programs("/nonexistent/claude", "/nonexistent/npm"))
        .with_deadlines(Deadlines {
            weather: Duration::from_millis(100),
            price: Duration::from_millis(100),
            quota: Duration::from_millis(100),
            version: Duration::from_millis(500),
            background_grace: Duration::from_secs(1),
        })
        .with_cwd("/tmp/fallback-dir")
}

#[tokio::test]
async fn test_end_to_end_example_without_transcript() {
    let backend = Arc::new(MemoryBackend::new());
    let status = assembler(Arc::new(OfflineTransport), backend)
        .render(br#"{"model":{"display_name":"Sonnet"},"session_id":"abc","workspace":{"current_dir":"/tmp/proj"}}"#)
        .await;

    assert_eq!(status.mode, RenderMode::Full);
    let context = status.context.unwrap();
    assert!(!context.is_actual);
    assert!((0.5..=25.0).contains(&context.percentage));
    assert!(status.lines[0].contains("📁 proj"));
    assert!(status.lines[0].contains("🤖 Sonnet"));
    assert!(status.lines[1].starts_with("Context: ~ "));
}

#[tokio::test]
async fn test_all_sources_failing_still_yields_two_lines() {
    let backend = Arc::new(MemoryBackend::new());
    let status = assembler(Arc::new(OfflineTransport), backend.clone())
        .render(br#"{"session_id":"offline","version":"1.0.88"}"#)
        .await;

    assert_eq!(status.lines.len(), 2);
    assert!(status.lines.iter().all(|l| !l.trim().is_empty() && !l.contains('\n')));
    assert!(status.lines[0].contains("--°"));
    assert!(status.lines[0].contains(PRICE_UNAVAILABLE));
    assert!(status.lines[0].contains("🔧 1.0.88"));
    assert!(status.lines[0].contains("🤖 Opus 4.1"));
    assert!(!status.context.unwrap().is_actual);
    assert!(!status.lines[1].contains("5h:"));
    assert!(backend.raw("weather").is_none());
}

#[tokio::test]
async fn test_deadline_expiry_shows_placeholders_and_keeps_refreshing() {
    let backend = Arc::new(MemoryBackend::new());
    let status = assembler(Arc::new(HangingTransport), backend)
        .render(br#"{"session_id":"slow","version":"2.0.0"}"#)
        .await;

    assert!(status.lines[0].contains("🌡️ --°"));
    assert!(status.lines[0].contains(PRICE_UNAVAILABLE));
    // Weather and price lost their races; the descriptor supplied the version
    assert_eq!(status.pending_jobs(), 2);

    let started = std::time::Instant::now();
    status.finish_background(Duration::from_secs(1)).await;
    assert!(started.elapsed() < Duration::from_millis(1500));
}

#[tokio::test]
async fn test_late_fetches_populate_cache_for_next_render() {
    let backend = Arc::new(MemoryBackend::new());
    let assembler = assembler(Arc::new(SlowTransport), backend.clone());

    let first = assembler.render(br#"{"version":"2.0.0"}"#).await;
    assert!(first.lines[0].contains("🌡️ --°"));
    assert!(first.lines[0].contains(PRICE_UNAVAILABLE));
    assert_eq!(first.pending_jobs(), 2);

    first.finish_background(Duration::from_secs(1)).await;
    assert!(backend.raw("bitcoin").is_some());
    assert!(backend.raw("weather").is_some());

    let second = assembler.render(br#"{"version":"2.0.0"}"#).await;
    assert!(second.lines[0].contains("☀️ +72°F"));
    assert!(second.lines[0].contains("₿$97k"));
    assert_eq!(second.pending_jobs(), 0);
}

#[tokio::test]
async fn test_null_blocks_in_descriptor_use_defaults() {
    let backend = Arc::new(MemoryBackend::new());
    let status = assembler(Arc::new(OfflineTransport), backend)
        .render(br#"{"model":{"display_name":"Sonnet"},"workspace":null,"session_id":"abc"}"#)
        .await;
    assert_eq!(status.mode, RenderMode::Full);
    assert!(status.lines[0].contains("🤖 Sonnet"));
    assert!(status.lines[0].contains("📁 fallback-dir"));

    let backend = Arc::new(MemoryBackend::new());
    let status = assembler(Arc::new(OfflineTransport), backend)
        .render(br#"{"model":null,"workspace":{"current_dir":"/tmp/proj"}}"#)
        .await;
    assert_eq!(status.mode, RenderMode::Full);
    assert!(status.lines[0].contains("🤖 Opus 4.1"));
    assert!(status.lines[0].contains("📁 proj"));
}

#[tokio::test]
async fn test_cached_values_answer_without_network() {
    let backend = Arc::new(MemoryBackend::new());
    let assembler = assembler(Arc::new(HangingTransport), backend.clone());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
    ));
    let store = CacheStore::new(backend, clock);
    store.write(
        &cache::WEATHER,
        &WeatherReport {
            display: "☀️ +72°F".into(),
            condition: "Sunny".into(),
            location: "New York".into(),
        },
    );
    store.write(&cache::BITCOIN, &"₿$97k".to_string());

    let status = assembler.render(br#"{"version":"2.0.0"}"#).await;
    assert!(status.lines[0].contains("☀️ +72°F"));
    assert!(status.lines[0].contains("₿$97k"));
    assert_eq!(status.pending_jobs(), 0);
}

#[tokio::test]
async fn test_invalid_descriptor_switches_to_fallback_mode() {
    let backend = Arc::new(MemoryBackend::new());
    let status = assembler(Arc::new(OfflineTransport), backend)
        .render(b"{not json at all")
        .await;

    assert_eq!(status.mode, RenderMode::Fallback);
    assert!(status.context.is_none());
    assert!(status.lines[0].contains("🤖 Opus 4.1"));
    assert!(status.lines[0].contains("📁 fallback-dir"));
    assert!(status.lines[0].contains("🔧 ?.?.?"));
    assert_eq!(
        status.lines[1],
        "Context: ~ ██░░░░░░░░░░░░░░░░░░ 10.0% [20K/200K]"
    );
}

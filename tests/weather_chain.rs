use std::sync::{Arc, Mutex};
use std::time::Duration;

use enhanced_statusline::cache::{self, CacheStore, MemoryBackend};
use enhanced_statusline::clock::SystemClock;
use enhanced_statusline::fetch::{FetchError, Fetcher, HttpRequest, HttpTransport, RetryPolicy};
use enhanced_statusline::models::WeatherReport;
use enhanced_statusline::sources::Acquisition;
use enhanced_statusline::sources::weather::{
    WeatherGlyph, WeatherLocation, WeatherSource, UNAVAILABLE_DISPLAY,
};

/// Answers by URL substring; anything unmatched fails with a 404
struct RoutedTransport {
    routes: Vec<(&'static str, Result<&'static str, u16>)>,
    seen: Mutex<Vec<String>>,
}

impl RoutedTransport {
    fn new(routes: Vec<(&'static str, Result<&'static str, u16>)>) -> Self {
        Self {
            routes,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

impl HttpTransport for RoutedTransport {
    fn get(&self, request: &HttpRequest, _timeout: Duration) -> Result<String, FetchError> {
        self.seen.lock().unwrap().push(request.url.clone());
        for (needle, outcome) in &self.routes {
            if request.url.contains(needle) {
                return match outcome {
                    Ok(body) => Ok(body.to_string()),
                    Err(status) => Err(FetchError::Status(*status)),
                };
            }
        }
        Err(FetchError::Status(404))
    }
}

fn location() -> WeatherLocation {
    WeatherLocation {
        zip_code: "02134".into(),
        city_name: "Boston,MA".into(),
        latitude: 42.36,
        longitude: -71.06,
        label: "Boston".into(),
    }
}

fn source(transport: Arc<RoutedTransport>, backend: Arc<MemoryBackend>) -> WeatherSource {
    let store = CacheStore::new(backend, Arc::new(SystemClock));
    WeatherSource::new(location(), Fetcher::new(transport), store)
        .with_policy(RetryPolicy::new(1, Duration::from_millis(200)))
}

#[tokio::test]
async fn test_postal_failure_falls_through_to_city() {
    let transport = Arc::new(RoutedTransport::new(vec![
        ("/02134?", Err(500)),
        ("/Boston,MA?", Ok("+55°F|Partly cloudy|Boston, United States")),
    ]));
    let backend = Arc::new(MemoryBackend::new());
    let weather = source(transport.clone(), backend.clone());

    let report = weather.display_value().await;

    assert_eq!(report.condition, "Partly cloudy");
    assert!(report.display.starts_with(WeatherGlyph::PartlyCloudy.as_str()));
    assert!(report.display.contains("+55°F"));
    assert_eq!(report.location, "Boston, United States");

    let seen = transport.seen();
    assert_eq!(seen.len(), 2, "coordinates tier should not run: {seen:?}");

    // The winning tier populates the cache
    let cached = CacheStore::new(backend, Arc::new(SystemClock)).read::<WeatherReport>(&cache::WEATHER);
    assert_eq!(cached, Some(report));
}

#[tokio::test]
async fn test_invalid_body_counts_as_tier_failure() {
    let transport = Arc::new(RoutedTransport::new(vec![
        ("/02134?", Ok("Unknown location; please try ~42.36,-71.06")),
        ("/Boston,MA?", Ok("<html>busy</html>")),
        ("/42.36,-71.06?", Ok("-2°C|Light snow|")),
    ]));
    let weather = source(transport.clone(), Arc::new(MemoryBackend::new()));

    let report = weather.display_value().await;
    assert_eq!(report.display, format!("{} -2°C", WeatherGlyph::Snow.as_str()));
    assert_eq!(report.location, "Boston");
    assert_eq!(transport.seen().len(), 3);
}

#[tokio::test]
async fn test_all_tiers_failing_yields_unavailable_placeholder() {
    let transport = Arc::new(RoutedTransport::new(vec![]));
    let backend = Arc::new(MemoryBackend::new());
    let weather = source(transport, backend.clone());

    let report = weather.display_value().await;
    assert_eq!(report.display, UNAVAILABLE_DISPLAY);
    assert!(backend.raw("weather").is_none());
}

#[tokio::test]
async fn test_cached_report_skips_network() {
    let transport = Arc::new(RoutedTransport::new(vec![]));
    let backend = Arc::new(MemoryBackend::new());
    let store = CacheStore::new(backend.clone(), Arc::new(SystemClock));
    let report = WeatherReport {
        display: "☀️ +80°F".into(),
        condition: "Sunny".into(),
        location: "Boston".into(),
    };
    store.write(&cache::WEATHER, &report);

    let weather = source(transport.clone(), backend);
    assert_eq!(weather.cached_only(), Some(report.clone()));
    assert_eq!(weather.display_value().await, report);
    assert!(transport.seen().is_empty());
}

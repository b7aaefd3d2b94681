//! Weather via wttr.in with a postal code → city → coordinates fallback chain.

use once_cell::sync::Lazy;
use regex::Regex;

use super::Acquisition;
use crate::cache::{self, CacheStore};
use crate::fetch::{FetchError, Fetcher, HttpRequest, RetryPolicy};
use crate::models::WeatherReport;

const WTTR_BASE: &str = "https://wttr.in";
// format=%t|%C|%l, percent-encoded
const WTTR_FORMAT: &str = "format=%25t%7C%25C%7C%25l&u&q";

/// Shown while a fetch is still in flight
pub const LOADING_DISPLAY: &str = "🌡️ --°";
/// Shown when every tier failed
pub const UNAVAILABLE_DISPLAY: &str = "🌡️ --°F";

static TEMPERATURE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[+-]?\d+°[FC]").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherLocation {
    pub zip_code: String,
    pub city_name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Display name when the service does not report a location
    pub label: String,
}

impl Default for WeatherLocation {
    fn default() -> Self {
        Self {
            zip_code: "10001".to_string(),
            city_name: "New York,NY".to_string(),
            latitude: 40.7128,
            longitude: -74.0060,
            label: "New York".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherGlyph {
    Sunny,
    PartlyCloudy,
    Cloudy,
    Rain,
    Storm,
    Snow,
    Fog,
    Windy,
    Unknown,
}

impl WeatherGlyph {
    pub fn as_str(self) -> &'static str {
        match self {
            WeatherGlyph::Sunny => "☀️",
            WeatherGlyph::PartlyCloudy => "⛅",
            WeatherGlyph::Cloudy => "☁️",
            WeatherGlyph::Rain => "🌧️",
            WeatherGlyph::Storm => "⛈️",
            WeatherGlyph::Snow => "❄️",
            WeatherGlyph::Fog => "🌫️",
            WeatherGlyph::Windy => "💨",
            WeatherGlyph::Unknown => "🌡️",
        }
    }
}

/// Map a free-text condition onto a glyph by case-insensitive keyword; first match wins
pub fn classify_condition(condition: &str) -> WeatherGlyph {
    const TABLE: &[(&[&str], WeatherGlyph)] = &[
        (&["sunny", "clear"], WeatherGlyph::Sunny),
        (&["partly cloudy", "partial"], WeatherGlyph::PartlyCloudy),
        (&["cloudy", "overcast"], WeatherGlyph::Cloudy),
        (&["rain", "drizzle"], WeatherGlyph::Rain),
        (&["storm", "thunder"], WeatherGlyph::Storm),
        (&["snow", "blizzard"], WeatherGlyph::Snow),
        (&["fog", "mist"], WeatherGlyph::Fog),
        (&["wind"], WeatherGlyph::Windy),
    ];
    let lower = condition.to_lowercase();
    TABLE
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, glyph)| *glyph)
        .unwrap_or(WeatherGlyph::Unknown)
}

/// Validate and parse a `temp|condition|location` body.
///
/// Anything that does not carry a well-formed temperature is a failure,
/// never a partial success.
pub fn parse_weather_response(body: &str, default_location: &str) -> Result<WeatherReport, FetchError> {
    let body = body.trim();
    if body.is_empty() || body.contains("Unknown location") || body.contains("not found") {
        return Err(FetchError::InvalidResponse(format!("location not resolved: {body:?}")));
    }

    let mut parts = body.split('|');
    let temp = parts.next().map(str::trim).unwrap_or_default();
    if !TEMPERATURE_RE.is_match(temp) {
        return Err(FetchError::InvalidResponse(format!("bad temperature: {temp:?}")));
    }
    let condition = parts
        .next()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or("Unknown");
    let location = parts
        .next()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or(default_location);

    Ok(WeatherReport {
        display: format!("{} {}", classify_condition(condition).as_str(), temp),
        condition: condition.to_string(),
        location: location.to_string(),
    })
}

/// Percent-encode one path segment; unreserved characters and `,` pass through
fn encode_location(location: &str) -> String {
    let mut out = String::with_capacity(location.len());
    for byte in location.trim().bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b',' => {
                out.push(char::from(byte))
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

pub struct WeatherSource {
    location: WeatherLocation,
    fetcher: Fetcher,
    cache: CacheStore,
    policy: RetryPolicy,
}

impl WeatherSource {
    /// Per-tier budget: 2 attempts of 3s each
    pub const TIER_POLICY: RetryPolicy = RetryPolicy::new(2, std::time::Duration::from_secs(3));

    pub fn new(location: WeatherLocation, fetcher: Fetcher, cache: CacheStore) -> Self {
        Self {
            location,
            fetcher,
            cache,
            policy: Self::TIER_POLICY,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Ordered `(tier, url)` pairs: postal code, city name, coordinates
    pub fn tiers(&self) -> [(&'static str, String); 3] {
        let url = |loc: String| format!("{WTTR_BASE}/{loc}?{WTTR_FORMAT}");
        [
            ("zip", url(encode_location(&self.location.zip_code))),
            ("city", url(encode_location(&self.location.city_name))),
            (
                "coords",
                url(format!("{},{}", self.location.latitude, self.location.longitude)),
            ),
        ]
    }

    /// Walk the tiers; the first valid response is cached and returned
    pub async fn fetch_report(&self) -> Option<WeatherReport> {
        for (tier, url) in self.tiers() {
            let request = HttpRequest::get(url);
            let outcome = match self.fetcher.fetch(&request, self.policy).await {
                Ok(body) => parse_weather_response(&body, &self.location.label),
                Err(err) => Err(err),
            };
            match outcome {
                Ok(report) => {
                    tracing::debug!(tier, display = %report.display, "weather resolved");
                    self.cache.write(&cache::WEATHER, &report);
                    return Some(report);
                }
                Err(err) => tracing::debug!(tier, "weather tier failed: {}", err),
            }
        }
        None
    }

    fn unavailable(&self) -> WeatherReport {
        WeatherReport {
            display: UNAVAILABLE_DISPLAY.to_string(),
            condition: "Unknown".to_string(),
            location: self.location.label.clone(),
        }
    }
}

impl Acquisition for WeatherSource {
    type Value = WeatherReport;

    fn name(&self) -> &'static str {
        "weather"
    }

    fn cached_only(&self) -> Option<WeatherReport> {
        self.cache.read(&cache::WEATHER)
    }

    fn display_value(&self) -> impl Future<Output = WeatherReport> + Send {
        async move {
            if let Some(cached) = self.cached_only() {
                return cached;
            }
            match self.fetch_report().await {
                Some(report) => report,
                None => self.unavailable(),
            }
        }
    }

    fn placeholder(&self) -> WeatherReport {
        WeatherReport {
            display: LOADING_DISPLAY.to_string(),
            condition: "Unknown".to_string(),
            location: self.location.label.clone(),
        }
    }
}

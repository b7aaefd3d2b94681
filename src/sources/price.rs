//! Bitcoin spot price from the Coinbase exchange-rates endpoint.

use serde::Deserialize;

use super::Acquisition;
use crate::cache::{self, CacheStore};
use crate::fetch::{FetchError, Fetcher, HttpRequest, RetryPolicy};

const EXCHANGE_RATES_URL: &str = "https://api.coinbase.com/v2/exchange-rates?currency=BTC";

pub const UNAVAILABLE_DISPLAY: &str = "₿--k";

#[derive(Debug, Deserialize)]
struct RatesResponse {
    data: RatesData,
}

#[derive(Debug, Deserialize)]
struct RatesData {
    rates: Rates,
}

#[derive(Debug, Deserialize)]
struct Rates {
    #[serde(rename = "USD")]
    usd: serde_json::Value,
}

/// Extract the USD rate; Coinbase sends it as a decimal string
pub fn parse_usd_price(body: &str) -> Result<f64, FetchError> {
    let parsed: RatesResponse =
        serde_json::from_str(body).map_err(|e| FetchError::InvalidResponse(e.to_string()))?;
    let price = match &parsed.data.rates.usd {
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        serde_json::Value::Number(n) => n.as_f64(),
        _ => None,
    };
    price
        .filter(|p| p.is_finite() && *p > 0.0)
        .ok_or_else(|| FetchError::InvalidResponse(format!("bad USD rate: {}", parsed.data.rates.usd)))
}

/// `97_432.18` → `₿$97k`
pub fn format_price(price: f64) -> String {
    format!("₿${:.0}k", price / 1000.0)
}

pub struct PriceSource {
    fetcher: Fetcher,
    cache: CacheStore,
    policy: RetryPolicy,
}

impl PriceSource {
    pub fn new(fetcher: Fetcher, cache: CacheStore) -> Self {
        Self {
            fetcher,
            cache,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn fetch_display(&self) -> Result<String, FetchError> {
        let request = HttpRequest::get(EXCHANGE_RATES_URL).header("Accept", "application/json");
        let body = self.fetcher.fetch(&request, self.policy).await?;
        let display = format_price(parse_usd_price(&body)?);
        self.cache.write(&cache::BITCOIN, &display);
        Ok(display)
    }
}

impl Acquisition for PriceSource {
    type Value = String;

    fn name(&self) -> &'static str {
        "price"
    }

    fn cached_only(&self) -> Option<String> {
        self.cache.read(&cache::BITCOIN)
    }

    fn display_value(&self) -> impl Future<Output = String> + Send {
        async move {
            if let Some(cached) = self.cached_only() {
                return cached;
            }
            match self.fetch_display().await {
                Ok(display) => display,
                Err(err) => {
                    tracing::debug!("price unavailable: {}", err);
                    UNAVAILABLE_DISPLAY.to_string()
                }
            }
        }
    }

    fn placeholder(&self) -> String {
        UNAVAILABLE_DISPLAY.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_usd_price() {
        let body = r#"{"data":{"currency":"BTC","rates":{"EUR":"88000.1","USD":"97432.18"}}}"#;
        assert_eq!(parse_usd_price(body).unwrap(), 97432.18);
        assert_eq!(format_price(97432.18), "₿$97k");
        assert_eq!(format_price(64_600.0), "₿$65k");
    }

    #[test]
    fn test_parse_usd_price_failures() {
        assert!(parse_usd_price("").is_err());
        assert!(parse_usd_price(r#"{"data":{"rates":{}}}"#).is_err());
        assert!(parse_usd_price(r#"{"data":{"rates":{"USD":"n/a"}}}"#).is_err());
        assert!(parse_usd_price(r#"{"errors":[{"id":"not_found"}]}"#).is_err());
    }
}

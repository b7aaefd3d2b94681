//! # Sources Module
//!
//! One acquisition strategy per auxiliary data source. Each composes the
//! cache store and the bounded fetcher behind the same contract:
//!
//! - `cached_only`: synchronous, never touches the network
//! - `display_value`: may fetch, never fails outward; degrades to a
//!   placeholder when every tier is exhausted

pub mod price;
pub mod quota;
pub mod weather;

pub use price::PriceSource;
pub use quota::QuotaSource;
pub use weather::WeatherSource;

pub trait Acquisition: Send + Sync + 'static {
    type Value: Send + 'static;

    /// Short name used in diagnostics
    fn name(&self) -> &'static str;

    fn cached_only(&self) -> Option<Self::Value>;

    fn display_value(&self) -> impl Future<Output = Self::Value> + Send;

    /// Neutral value shown while a fetch is still in flight
    fn placeholder(&self) -> Self::Value;

    /// Whether a fetch that missed its deadline is still worth finishing
    /// in the background
    fn refreshes_cache(&self) -> bool {
        true
    }
}

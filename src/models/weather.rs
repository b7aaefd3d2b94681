use serde::{Deserialize, Serialize};

/// Cached weather payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub display: String,
    pub condition: String,
    pub location: String,
}

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Live generation reading for one balancing region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveGenerationSample {
    pub region: String,
    pub region_name: String,
    pub solar_mwh: f64,
    pub wind_mwh: f64,
    pub total_mwh: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub fetched_at: OffsetDateTime,
}

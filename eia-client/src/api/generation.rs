use std::collections::HashMap;

use serde::Deserialize;
use time::OffsetDateTime;

use super::{de, ClientError, DataQuery, EiaClient, MAX_PAGE_SIZE};
use crate::domain::LiveGenerationSample;

pub const FUEL_TYPE_ROUTE: &str = "electricity/rto/fuel-type-data";

/// Balancing authorities reported when no explicit list is configured.
pub const DEFAULT_LIVE_REGIONS: [&str; 6] = ["CISO", "ERCO", "PJM", "MISO", "NYIS", "ISNE"];

const SOLAR_FUEL: &str = "SUN";
const WIND_FUEL: &str = "WND";

// Hourly rows per region and fuel to look back through when picking the latest.
const LOOKBACK_HOURS: usize = 48;

#[derive(Debug, Clone, Deserialize)]
pub struct FuelTypeRow {
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub period: String,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub respondent: String,
    #[serde(default, rename = "respondent-name", deserialize_with = "de::lenient_string")]
    pub respondent_name: String,
    #[serde(default, rename = "fueltype", deserialize_with = "de::lenient_string")]
    pub fuel_type: String,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub value: Option<f64>,
}

pub fn live_query(regions: &[String]) -> DataQuery {
    let length = (regions.len().max(1) * 2 * LOOKBACK_HOURS).min(MAX_PAGE_SIZE);
    DataQuery::new()
        .column("value")
        .facet("fueltype", [SOLAR_FUEL, WIND_FUEL])
        .facet("respondent", regions.iter().cloned())
        .frequency("hourly")
        .sort_desc("period")
        .length(length)
}

/// Build one sample per requested region from rows sorted newest first.
///
/// The first row seen for each (region, fuel) pair wins. Regions with no rows
/// still get a sample with zero readings and their code as display name.
pub fn samples_from_rows(
    rows: &[FuelTypeRow],
    regions: &[String],
    fetched_at: OffsetDateTime,
) -> Vec<LiveGenerationSample> {
    let mut latest: HashMap<(&str, &str), f64> = HashMap::new();
    let mut names: HashMap<&str, &str> = HashMap::new();

    for row in rows {
        latest
            .entry((row.respondent.as_str(), row.fuel_type.as_str()))
            .or_insert(row.value.unwrap_or(0.0));
        if !row.respondent_name.is_empty() {
            names.entry(row.respondent.as_str()).or_insert(row.respondent_name.as_str());
        }
    }

    regions
        .iter()
        .map(|region| {
            let solar = latest.get(&(region.as_str(), SOLAR_FUEL)).copied().unwrap_or(0.0);
            let wind = latest.get(&(region.as_str(), WIND_FUEL)).copied().unwrap_or(0.0);
            LiveGenerationSample {
                region: region.clone(),
                region_name: names.get(region.as_str()).map(|n| n.to_string()).unwrap_or_else(|| region.clone()),
                solar_mwh: solar,
                wind_mwh: wind,
                total_mwh: solar + wind,
                fetched_at,
            }
        })
        .collect()
}

/// Latest solar and wind generation for each region.
pub async fn latest_live_samples(
    client: &EiaClient,
    regions: &[String],
) -> Result<Vec<LiveGenerationSample>, ClientError> {
    let page = client.get_data::<FuelTypeRow>(FUEL_TYPE_ROUTE, &live_query(regions)).await?;
    let fetched_at = OffsetDateTime::now_utc();
    Ok(samples_from_rows(&page.data, regions, fetched_at))
}

use futures::TryStreamExt;
use serde::Deserialize;

use super::{de, ClientError, DataQuery, EiaClient};
use crate::domain::{GeneratorCapacity, SourceCategory};

pub const OPERATING_CAPACITY_ROUTE: &str = "electricity/operating-generator-capacity";

const CAPACITY_COLUMNS: [&str; 4] = [
    "nameplate-capacity-mw",
    "operating-year-month",
    "latitude",
    "longitude",
];

#[derive(Debug, Deserialize)]
struct GeneratorRow {
    #[serde(default, deserialize_with = "de::lenient_string")]
    period: String,
    #[serde(default, rename = "stateid", deserialize_with = "de::lenient_string")]
    state: String,
    #[serde(default, rename = "plantid", deserialize_with = "de::lenient_string")]
    plant_id: String,
    #[serde(default, rename = "plantName", deserialize_with = "de::lenient_string")]
    plant_name: String,
    #[serde(default, rename = "generatorid", deserialize_with = "de::lenient_string")]
    generator_id: String,
    #[serde(default, deserialize_with = "de::lenient_string")]
    technology: String,
    #[serde(default, rename = "energy_source_code", deserialize_with = "de::lenient_string")]
    energy_source: String,
    #[serde(default, deserialize_with = "de::lenient_string")]
    status: String,
    #[serde(default, rename = "nameplate-capacity-mw", deserialize_with = "de::lenient_f64")]
    nameplate_capacity_mw: Option<f64>,
    #[serde(default, rename = "operating-year-month", deserialize_with = "de::lenient_string")]
    operating_year_month: String,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    latitude: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    longitude: Option<f64>,
}

impl From<GeneratorRow> for GeneratorCapacity {
    fn from(r: GeneratorRow) -> Self {
        let operating_year = r.operating_year_month.get(..4).and_then(|y| y.parse().ok());
        GeneratorCapacity {
            period: r.period,
            state: r.state,
            plant_id: r.plant_id,
            plant_name: r.plant_name,
            generator_id: r.generator_id,
            technology: r.technology,
            energy_source: r.energy_source,
            status: r.status,
            nameplate_capacity_mw: r.nameplate_capacity_mw.unwrap_or(0.0),
            operating_year,
            latitude: r.latitude,
            longitude: r.longitude,
        }
    }
}

/// Operating generators for one source category, latest reporting period first.
pub fn capacity_query(source: SourceCategory) -> DataQuery {
    CAPACITY_COLUMNS
        .iter()
        .fold(DataQuery::new(), |q, col| q.column(col))
        .facet("energy_source_code", source.provider_codes().iter().copied())
        .facet("status", ["OP"])
        .frequency("monthly")
        .sort_desc("period")
}

/// Fetch up to `max_records` operating generators of one category.
pub async fn operating_capacity(
    client: &EiaClient,
    source: SourceCategory,
    max_records: usize,
) -> Result<Vec<GeneratorCapacity>, ClientError> {
    let rows: Vec<GeneratorRow> = client
        .paginate(OPERATING_CAPACITY_ROUTE, capacity_query(source), max_records)
        .try_collect()
        .await?;

    tracing::debug!(source = %source, rows = rows.len(), "fetched operating capacity");

    Ok(rows.into_iter().map(GeneratorCapacity::from).collect())
}

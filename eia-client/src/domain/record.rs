use serde::{Deserialize, Serialize};

use super::SourceCategory;

/// One geolocated generation asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub source: SourceCategory,
    pub technology: String,
    pub capacity_mw: f64,
    /// State code as reported by the provider.
    pub region: String,
    pub operating_year: Option<i32>,
}

/// Operating generator capacity row as returned by the provider, before any
/// validation. Coordinates are optional because the provider omits them for
/// some generators.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorCapacity {
    pub period: String,
    pub state: String,
    pub plant_id: String,
    pub plant_name: String,
    pub generator_id: String,
    pub technology: String,
    pub energy_source: String,
    pub status: String,
    pub nameplate_capacity_mw: f64,
    pub operating_year: Option<i32>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl GeneratorCapacity {
    pub fn record_id(&self) -> String {
        format!("{}-{}", self.plant_id, self.generator_id)
    }
}

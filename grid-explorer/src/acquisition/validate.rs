use eia_client::domain::{GeneratorCapacity, Record, SourceCategory};

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    #[error("record has no id")]
    MissingId,
    #[error("record has no coordinates")]
    MissingCoordinates,
    #[error("coordinates out of range")]
    CoordinatesOutOfRange,
    #[error("capacity is negative or not a number")]
    InvalidCapacity,
}

impl RejectReason {
    fn label(self) -> &'static str {
        match self {
            Self::MissingId => "missing_id",
            Self::MissingCoordinates => "missing_coordinates",
            Self::CoordinatesOutOfRange => "coordinates_out_of_range",
            Self::InvalidCapacity => "invalid_capacity",
        }
    }
}

/// Pure validation of a `Record`.
///
/// Rules:
/// - id must be non-empty.
/// - lat in [-90, 90], lon in [-180, 180], both finite.
/// - capacity must be finite and non-negative.
pub fn check(r: &Record) -> Result<(), RejectReason> {
    if r.id.trim().is_empty() {
        return Err(RejectReason::MissingId);
    }
    if !r.lat.is_finite() || !r.lon.is_finite() || r.lat.abs() > 90.0 || r.lon.abs() > 180.0 {
        return Err(RejectReason::CoordinatesOutOfRange);
    }
    if !r.capacity_mw.is_finite() || r.capacity_mw < 0.0 {
        return Err(RejectReason::InvalidCapacity);
    }
    Ok(())
}

/// Convert a provider capacity row into a record. Rows without coordinates
/// cannot be placed on the map and are rejected.
pub fn from_generator(g: GeneratorCapacity) -> Result<Record, RejectReason> {
    let id = g.record_id();
    let (Some(lat), Some(lon)) = (g.latitude, g.longitude) else {
        return Err(RejectReason::MissingCoordinates);
    };

    let record = Record {
        id,
        name: g.plant_name,
        lat,
        lon,
        source: SourceCategory::from_provider_code(&g.energy_source),
        technology: g.technology,
        capacity_mw: g.nameplate_capacity_mw,
        region: g.state,
        operating_year: g.operating_year,
    };
    check(&record)?;
    Ok(record)
}

/// Count a rejected record without failing the batch.
pub fn note_reject(category: SourceCategory, reason: RejectReason) {
    metrics::counter!(
        "records_rejected_total",
        "category" => category.as_str(),
        "reason" => reason.label()
    )
    .increment(1);
}

/// Keep the records of one segment that pass [`check`].
pub fn retain_valid(category: SourceCategory, records: Vec<Record>) -> Vec<Record> {
    let before = records.len();
    let kept: Vec<Record> = records
        .into_iter()
        .filter(|r| match check(r) {
            Ok(()) => true,
            Err(reason) => {
                note_reject(category, reason);
                tracing::debug!(id = %r.id, %category, %reason, "dropping invalid record");
                false
            }
        })
        .collect();

    if kept.len() < before {
        tracing::info!(%category, dropped = before - kept.len(), "invalid records dropped from segment");
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator() -> GeneratorCapacity {
        GeneratorCapacity {
            period: "2024-06".to_string(),
            state: "TX".to_string(),
            plant_id: "56291".to_string(),
            plant_name: "Horse Hollow".to_string(),
            generator_id: "WT1".to_string(),
            technology: "Onshore Wind Turbine".to_string(),
            energy_source: "WND".to_string(),
            status: "OP".to_string(),
            nameplate_capacity_mw: 213.0,
            operating_year: Some(2005),
            latitude: Some(32.2),
            longitude: Some(-100.0),
        }
    }

    #[test]
    fn generator_with_coordinates_becomes_record() {
        let r = from_generator(generator()).unwrap();
        assert_eq!(r.id, "56291-WT1");
        assert_eq!(r.source, SourceCategory::Wind);
        assert_eq!(r.region, "TX");
        assert_eq!(r.capacity_mw, 213.0);
        assert_eq!(r.operating_year, Some(2005));
    }

    #[test]
    fn generator_without_coordinates_is_rejected() {
        let mut g = generator();
        g.longitude = None;
        assert_eq!(from_generator(g), Err(RejectReason::MissingCoordinates));
    }

    #[test]
    fn out_of_range_and_negative_values_are_rejected() {
        let mut g = generator();
        g.latitude = Some(91.0);
        assert_eq!(from_generator(g), Err(RejectReason::CoordinatesOutOfRange));

        let mut g = generator();
        g.nameplate_capacity_mw = -1.0;
        assert_eq!(from_generator(g), Err(RejectReason::InvalidCapacity));
    }

    #[test]
    fn retain_valid_drops_only_bad_records() {
        let good = from_generator(generator()).unwrap();
        let mut bad = good.clone();
        bad.id = "x".to_string();
        bad.lon = f64::NAN;
        let mut nameless = good.clone();
        nameless.id = "  ".to_string();

        let kept = retain_valid(SourceCategory::Wind, vec![good.clone(), bad, nameless]);
        assert_eq!(kept, vec![good]);
    }
}

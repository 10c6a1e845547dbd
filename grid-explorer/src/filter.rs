use std::collections::BTreeSet;

use eia_client::domain::{Record, SourceCategory};
use serde::{Deserialize, Serialize};

/// Source restriction of a [`FilterCriteria`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceSelector {
    #[default]
    Any,
    One(SourceCategory),
}

impl SourceSelector {
    /// Unknown or empty text selects every source.
    pub fn parse(text: &str) -> Self {
        match SourceCategory::parse(text) {
            Some(source) => Self::One(source),
            None => Self::Any,
        }
    }

    pub fn admits(self, source: SourceCategory) -> bool {
        match self {
            Self::Any => true,
            Self::One(wanted) => wanted == source,
        }
    }
}

/// User-controlled predicate over records. Fields combine with AND.
///
/// Rules:
/// - source: `Any` or exact category match.
/// - capacity: `capacity_mw >= min_capacity_mw`.
/// - regions: empty set admits all; otherwise the record's trimmed, upper-cased
///   region must be a member.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub source: SourceSelector,
    pub min_capacity_mw: f64,
    pub regions: BTreeSet<String>,
}

impl FilterCriteria {
    pub fn new(source: SourceSelector, min_capacity_mw: f64, regions: BTreeSet<String>) -> Self {
        Self {
            source,
            min_capacity_mw: sanitize_threshold(min_capacity_mw),
            regions,
        }
    }

    /// Build criteria from untyped form text. Each field that cannot be parsed
    /// falls back to "no restriction" for that field.
    pub fn from_raw(source: Option<&str>, min_capacity: Option<&str>, regions: Option<&str>) -> Self {
        let threshold = min_capacity
            .and_then(|s| s.trim().parse::<f64>().ok())
            .unwrap_or(0.0);
        Self::new(
            source.map(SourceSelector::parse).unwrap_or_default(),
            threshold,
            regions.map(parse_regions).unwrap_or_default(),
        )
    }

    pub fn is_unrestricted(&self) -> bool {
        self.source == SourceSelector::Any && self.min_capacity_mw <= 0.0 && self.regions.is_empty()
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.source.admits(record.source)
            && record.capacity_mw >= self.min_capacity_mw
            && (self.regions.is_empty() || self.regions.contains(&normalize_region(&record.region)))
    }
}

fn sanitize_threshold(v: f64) -> f64 {
    if v.is_finite() && v > 0.0 {
        v
    } else {
        0.0
    }
}

pub fn normalize_region(region: &str) -> String {
    region.trim().to_ascii_uppercase()
}

/// Comma-separated region list: trimmed, upper-cased, empties dropped.
pub fn parse_regions(text: &str) -> BTreeSet<String> {
    text.split(',')
        .map(normalize_region)
        .filter(|r| !r.is_empty())
        .collect()
}

/// Records passing `criteria`, in input order.
pub fn apply(records: &[Record], criteria: &FilterCriteria) -> Vec<Record> {
    if criteria.is_unrestricted() {
        return records.to_vec();
    }
    records.iter().filter(|r| criteria.matches(r)).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, source: SourceCategory, capacity_mw: f64, region: &str) -> Record {
        Record {
            id: id.to_string(),
            name: format!("plant {id}"),
            lat: 35.0,
            lon: -100.0,
            source,
            technology: String::new(),
            capacity_mw,
            region: region.to_string(),
            operating_year: None,
        }
    }

    fn sample() -> Vec<Record> {
        vec![
            record("a", SourceCategory::Wind, 150.0, "ca"),
            record("b", SourceCategory::Wind, 50.0, "CA"),
            record("c", SourceCategory::Solar, 200.0, "TX"),
            record("d", SourceCategory::Hydro, 120.0, " tx "),
            record("e", SourceCategory::Other, 0.0, "NY"),
        ]
    }

    #[test]
    fn wind_over_100_in_ca_or_tx_keeps_only_first_record() {
        let records = vec![
            record("1", SourceCategory::Wind, 150.0, "ca"),
            record("2", SourceCategory::Wind, 50.0, "CA"),
            record("3", SourceCategory::Solar, 200.0, "TX"),
        ];
        let criteria = FilterCriteria::from_raw(Some("WIND"), Some("100"), Some("CA, TX"));

        let out = apply(&records, &criteria);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "1");
    }

    #[test]
    fn region_parsing_normalizes_and_drops_empty_tokens() {
        let set = parse_regions(" ca, tx ,,  ,Ny ");
        let expected: BTreeSet<String> = ["CA", "TX", "NY"].iter().map(|s| s.to_string()).collect();
        assert_eq!(set, expected);
        assert!(parse_regions("  ,, ").is_empty());
    }

    #[test]
    fn malformed_text_degrades_to_no_restriction() {
        let criteria = FilterCriteria::from_raw(Some("plutonium"), Some("lots"), Some(" , "));
        assert!(criteria.is_unrestricted());
        assert_eq!(apply(&sample(), &criteria).len(), 5);

        let negative = FilterCriteria::from_raw(None, Some("-20"), None);
        assert_eq!(negative.min_capacity_mw, 0.0);
        let nan = FilterCriteria::new(SourceSelector::Any, f64::NAN, BTreeSet::new());
        assert_eq!(nan.min_capacity_mw, 0.0);
    }

    #[test]
    fn result_is_an_order_preserving_subset() {
        let records = sample();
        let criteria = FilterCriteria::from_raw(None, Some("100"), None);
        let out = apply(&records, &criteria);

        let ids: Vec<&str> = out.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "d"]);
        assert!(out.iter().all(|r| records.contains(r)));
    }

    #[test]
    fn applying_twice_is_idempotent() {
        let records = sample();
        for criteria in [
            FilterCriteria::default(),
            FilterCriteria::from_raw(Some("wind"), None, None),
            FilterCriteria::from_raw(None, Some("100"), Some("tx")),
            FilterCriteria::from_raw(Some("hydro"), Some("500"), None),
        ] {
            let once = apply(&records, &criteria);
            let twice = apply(&once, &criteria);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn stored_region_is_normalized_before_membership_check() {
        let criteria = FilterCriteria::from_raw(None, None, Some("tx"));
        let out = apply(&sample(), &criteria);
        let ids: Vec<&str> = out.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "d"]);
    }

    #[test]
    fn zero_threshold_admits_zero_capacity_records() {
        let criteria = FilterCriteria::from_raw(Some("other"), Some("0"), None);
        assert_eq!(apply(&sample(), &criteria).len(), 1);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let criteria = FilterCriteria::from_raw(Some("solar"), Some("10"), Some("CA"));
        assert!(apply(&[], &criteria).is_empty());
    }
}

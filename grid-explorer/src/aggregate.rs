use std::collections::{BTreeMap, BTreeSet, HashMap};

use eia_client::domain::{Record, SourceCategory};
use serde::Serialize;

use crate::filter::normalize_region;

/// Number of regions kept in [`AggregateSummary::top_regions`].
pub const TOP_REGIONS: usize = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SourceTotals {
    pub count: usize,
    pub capacity_mw: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionCapacity {
    pub region: String,
    pub solar_mw: f64,
    pub wind_mw: f64,
    pub total_mw: f64,
}

/// Grouped statistics over one record subset. Always rebuilt from scratch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateSummary {
    /// Every category is present, zeroed when absent from the input.
    pub by_source: BTreeMap<SourceCategory, SourceTotals>,
    /// Solar + wind capacity per region, largest first, at most [`TOP_REGIONS`].
    pub top_regions: Vec<RegionCapacity>,
    pub total_count: usize,
    pub total_capacity_mw: f64,
    /// Distinct region codes present, sorted.
    pub regions: Vec<String>,
}

impl AggregateSummary {
    pub fn empty() -> Self {
        Self {
            by_source: SourceCategory::ALL.iter().map(|&s| (s, SourceTotals::default())).collect(),
            top_regions: Vec::new(),
            total_count: 0,
            total_capacity_mw: 0.0,
            regions: Vec::new(),
        }
    }

    pub fn source(&self, source: SourceCategory) -> SourceTotals {
        self.by_source.get(&source).copied().unwrap_or_default()
    }

    pub fn solar_capacity_mw(&self) -> f64 {
        self.source(SourceCategory::Solar).capacity_mw
    }

    pub fn wind_capacity_mw(&self) -> f64 {
        self.source(SourceCategory::Wind).capacity_mw
    }
}

impl Default for AggregateSummary {
    fn default() -> Self {
        Self::empty()
    }
}

/// Summarize `records` in a single pass.
///
/// Region ranking uses a stable sort over first-seen order, so regions with
/// equal totals keep the order in which they first appeared in the input.
pub fn summarize(records: &[Record]) -> AggregateSummary {
    let mut summary = AggregateSummary::empty();
    let mut ranked: Vec<RegionCapacity> = Vec::new();
    let mut slot: HashMap<String, usize> = HashMap::new();
    let mut regions: BTreeSet<String> = BTreeSet::new();

    for r in records {
        let totals = summary.by_source.entry(r.source).or_default();
        totals.count += 1;
        totals.capacity_mw += r.capacity_mw;

        summary.total_count += 1;
        summary.total_capacity_mw += r.capacity_mw;

        let region = normalize_region(&r.region);
        if region.is_empty() {
            continue;
        }

        if matches!(r.source, SourceCategory::Solar | SourceCategory::Wind) {
            let idx = *slot.entry(region.clone()).or_insert_with(|| {
                ranked.push(RegionCapacity {
                    region: region.clone(),
                    solar_mw: 0.0,
                    wind_mw: 0.0,
                    total_mw: 0.0,
                });
                ranked.len() - 1
            });
            let entry = &mut ranked[idx];
            if r.source == SourceCategory::Solar {
                entry.solar_mw += r.capacity_mw;
            } else {
                entry.wind_mw += r.capacity_mw;
            }
            entry.total_mw = entry.solar_mw + entry.wind_mw;
        }

        regions.insert(region);
    }

    ranked.sort_by(|a, b| b.total_mw.total_cmp(&a.total_mw));
    ranked.truncate(TOP_REGIONS);

    summary.top_regions = ranked;
    summary.regions = regions.into_iter().collect();
    summary
}

use std::{collections::HashSet, sync::Arc, time::Instant};

use eia_client::domain::{LiveGenerationSample, Record, SourceCategory};
use serde::Serialize;

use crate::{
    aggregate::{summarize, AggregateSummary},
    filter::{self, FilterCriteria},
    geometry::{BoundingBox, Polygon},
};

/// Observable polygon lifecycle. Drawing happens in the client and is never
/// seen here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolygonPhase {
    NoPolygon,
    Active,
}

/// Progress of the current bulk load.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadProgress {
    pub completed: usize,
    pub of: usize,
    pub failed: Vec<SourceCategory>,
    pub finished: bool,
}

#[derive(Debug, Clone)]
struct ActivePolygon {
    polygon: Polygon,
    bounds: Option<BoundingBox>,
}

impl ActivePolygon {
    fn new(polygon: Polygon) -> Self {
        let bounds = polygon.bounding_box();
        Self { polygon, bounds }
    }

    fn admits(&self, r: &Record) -> bool {
        self.bounds.is_some_and(|b| b.contains(r.lat, r.lon)) && self.polygon.contains(r.lat, r.lon)
    }
}

/// Immutable view handed to readers. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ViewSnapshot {
    pub loaded_count: usize,
    pub filtered: Arc<Vec<Record>>,
    pub polygon_records: Arc<Vec<Record>>,
    pub summary: Arc<AggregateSummary>,
    pub polygon_summary: Option<Arc<AggregateSummary>>,
    pub criteria: FilterCriteria,
    pub polygon: Option<Polygon>,
    pub phase: PolygonPhase,
    pub selected: Option<Record>,
    pub live_samples: Arc<Vec<LiveGenerationSample>>,
    pub loading_status: String,
    pub progress: LoadProgress,
    pub auto_refresh: bool,
}

/// Session state and its derived cells.
///
/// Inputs are the record store, the criteria and the polygon. Every mutating
/// method recomputes the dependent cells before returning, in the order
/// filtered -> summary -> polygon records -> polygon summary, so no reader
/// ever sees a summary older than the inputs it was derived from.
#[derive(Debug)]
pub struct ViewState {
    raw: Vec<Record>,
    ids: HashSet<String>,
    criteria: FilterCriteria,
    polygon: Option<ActivePolygon>,
    selected: Option<String>,
    live_samples: Arc<Vec<LiveGenerationSample>>,
    status: String,
    progress: LoadProgress,
    auto_refresh: bool,

    filtered: Arc<Vec<Record>>,
    summary: Arc<AggregateSummary>,
    polygon_records: Arc<Vec<Record>>,
    polygon_summary: Option<Arc<AggregateSummary>>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(FilterCriteria::default())
    }
}

impl ViewState {
    pub fn new(criteria: FilterCriteria) -> Self {
        Self {
            raw: Vec::new(),
            ids: HashSet::new(),
            criteria,
            polygon: None,
            selected: None,
            live_samples: Arc::new(Vec::new()),
            status: String::new(),
            progress: LoadProgress::default(),
            auto_refresh: false,
            filtered: Arc::new(Vec::new()),
            summary: Arc::new(AggregateSummary::empty()),
            polygon_records: Arc::new(Vec::new()),
            polygon_summary: None,
        }
    }

    /// Append one loaded segment. Records whose id is already present are
    /// dropped. Returns how many records were added.
    pub fn append_segment(&mut self, records: Vec<Record>) -> usize {
        let added = self.insert_unique(records);
        if added > 0 {
            self.recompute_from_filter();
        }
        added
    }

    /// Replace every loaded record of `category` with `records`. Records of
    /// other categories stay, so a category that fails to reload keeps what
    /// it had. Returns how many records were added.
    pub fn replace_category(&mut self, category: SourceCategory, records: Vec<Record>) -> usize {
        let before = self.raw.len();
        self.raw.retain(|r| r.source != category);
        if self.raw.len() != before {
            self.ids = self.raw.iter().map(|r| r.id.clone()).collect();
        }
        let added = self.insert_unique(records);
        self.recompute_from_filter();
        added
    }

    fn insert_unique(&mut self, records: Vec<Record>) -> usize {
        let offered = records.len();
        let before = self.raw.len();
        for r in records {
            if self.ids.insert(r.id.clone()) {
                self.raw.push(r);
            }
        }
        let added = self.raw.len() - before;
        if added < offered {
            metrics::counter!("records_duplicate_dropped_total").increment((offered - added) as u64);
            tracing::warn!(duplicates = offered - added, "dropped records with duplicate ids");
        }
        added
    }

    /// Reset progress ahead of a bulk load of `of` segments. Loaded records
    /// stay until their category is replaced.
    pub fn begin_load(&mut self, of: usize) {
        self.progress = LoadProgress {
            of,
            ..LoadProgress::default()
        };
    }

    pub fn record_segment(&mut self, category: SourceCategory, ok: bool) {
        self.progress.completed += 1;
        if !ok {
            self.progress.failed.push(category);
        }
    }

    pub fn finish_load(&mut self) {
        self.progress.finished = true;
    }

    pub fn set_criteria(&mut self, criteria: FilterCriteria) {
        self.criteria = criteria;
        self.recompute_from_filter();
    }

    /// Replace any active polygon. A polygon with fewer than three vertices
    /// is kept but contains nothing.
    pub fn set_polygon(&mut self, polygon: Polygon) {
        if !polygon.is_valid() {
            tracing::warn!(vertices = polygon.vertices().len(), "polygon has fewer than 3 vertices; it will match nothing");
        }
        self.polygon = Some(ActivePolygon::new(polygon));
        self.recompute_polygon();
    }

    pub fn clear_polygon(&mut self) {
        self.polygon = None;
        self.recompute_polygon();
    }

    /// Select a loaded record. Unknown ids clear the selection.
    pub fn select_record(&mut self, id: &str) -> bool {
        if self.ids.contains(id) {
            self.selected = Some(id.to_string());
            true
        } else {
            self.selected = None;
            false
        }
    }

    pub fn replace_live_samples(&mut self, samples: Vec<LiveGenerationSample>) {
        self.live_samples = Arc::new(samples);
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    pub fn set_auto_refresh(&mut self, enabled: bool) {
        self.auto_refresh = enabled;
    }

    fn recompute_from_filter(&mut self) {
        let started = Instant::now();
        self.filtered = Arc::new(filter::apply(&self.raw, &self.criteria));
        self.summary = Arc::new(summarize(&self.filtered));
        self.recompute_polygon();
        if self.selected.as_ref().is_some_and(|id| !self.ids.contains(id)) {
            self.selected = None;
        }
        metrics::histogram!("view_recompute_seconds", "stage" => "filter")
            .record(started.elapsed().as_secs_f64());
    }

    fn recompute_polygon(&mut self) {
        match &self.polygon {
            Some(active) => {
                let inside: Vec<Record> = self.filtered.iter().filter(|r| active.admits(r)).cloned().collect();
                self.polygon_summary = Some(Arc::new(summarize(&inside)));
                self.polygon_records = Arc::new(inside);
            }
            None => {
                self.polygon_records = Arc::new(Vec::new());
                self.polygon_summary = None;
            }
        }
    }

    pub fn phase(&self) -> PolygonPhase {
        if self.polygon.is_some() {
            PolygonPhase::Active
        } else {
            PolygonPhase::NoPolygon
        }
    }

    pub fn raw_records(&self) -> &[Record] {
        &self.raw
    }

    pub fn filtered(&self) -> &[Record] {
        &self.filtered
    }

    pub fn polygon_records(&self) -> &[Record] {
        &self.polygon_records
    }

    pub fn summary(&self) -> &AggregateSummary {
        &self.summary
    }

    pub fn polygon_summary(&self) -> Option<&AggregateSummary> {
        self.polygon_summary.as_deref()
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn live_samples(&self) -> &[LiveGenerationSample] {
        &self.live_samples
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn progress(&self) -> &LoadProgress {
        &self.progress
    }

    pub fn selected(&self) -> Option<&Record> {
        let id = self.selected.as_deref()?;
        self.raw.iter().find(|r| r.id == id)
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        ViewSnapshot {
            loaded_count: self.raw.len(),
            filtered: self.filtered.clone(),
            polygon_records: self.polygon_records.clone(),
            summary: self.summary.clone(),
            polygon_summary: self.polygon_summary.clone(),
            criteria: self.criteria.clone(),
            polygon: self.polygon.as_ref().map(|p| p.polygon.clone()),
            phase: self.phase(),
            selected: self.selected().cloned(),
            live_samples: self.live_samples.clone(),
            loading_status: self.status.clone(),
            progress: self.progress.clone(),
            auto_refresh: self.auto_refresh,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::SourceSelector;
    use time::macros::datetime;

    fn record(id: &str, source: SourceCategory, capacity_mw: f64, region: &str, lat: f64, lon: f64) -> Record {
        Record {
            id: id.to_string(),
            name: id.to_string(),
            lat,
            lon,
            source,
            technology: String::new(),
            capacity_mw,
            region: region.to_string(),
            operating_year: None,
        }
    }

    fn square() -> Polygon {
        Polygon::new(vec![(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0)])
    }

    fn loaded() -> ViewState {
        let mut state = ViewState::default();
        state.append_segment(vec![
            record("s1", SourceCategory::Solar, 50.0, "CA", 5.0, 5.0),
            record("s2", SourceCategory::Solar, 80.0, "CA", 20.0, 20.0),
            record("w1", SourceCategory::Wind, 150.0, "TX", 2.0, 8.0),
            record("w2", SourceCategory::Wind, 40.0, "TX", -5.0, 3.0),
        ]);
        state
    }

    fn assert_consistent(state: &ViewState) {
        let expected_filtered = filter::apply(state.raw_records(), state.criteria());
        assert_eq!(state.filtered(), expected_filtered.as_slice());
        assert_eq!(state.summary(), &summarize(state.filtered()));
        match state.phase() {
            PolygonPhase::Active => {
                assert!(state.polygon_records().iter().all(|r| state.filtered().contains(r)));
                assert_eq!(state.polygon_summary(), Some(&summarize(state.polygon_records())));
            }
            PolygonPhase::NoPolygon => {
                assert!(state.polygon_records().is_empty());
                assert!(state.polygon_summary().is_none());
            }
        }
    }

    #[test]
    fn square_polygon_scopes_solar_capacity() {
        let mut state = ViewState::default();
        state.append_segment(vec![record("a", SourceCategory::Solar, 50.0, "CA", 5.0, 5.0)]);
        state.set_polygon(Polygon::from_json("[[0,0],[0,10],[10,10],[10,0]]").unwrap());

        assert_eq!(state.phase(), PolygonPhase::Active);
        assert_eq!(state.polygon_records().len(), 1);
        assert_eq!(state.polygon_summary().unwrap().solar_capacity_mw(), 50.0);
        assert_consistent(&state);
    }

    #[test]
    fn criteria_change_recomputes_every_downstream_cell() {
        let mut state = loaded();
        state.set_polygon(square());
        assert_eq!(state.polygon_records().len(), 2);

        state.set_criteria(FilterCriteria::new(
            SourceSelector::One(SourceCategory::Wind),
            100.0,
            Default::default(),
        ));

        let ids: Vec<&str> = state.filtered().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["w1"]);
        assert_eq!(state.summary().total_capacity_mw, 150.0);
        assert_eq!(state.polygon_records().len(), 1);
        assert_eq!(state.polygon_summary().unwrap().wind_capacity_mw(), 150.0);
        assert_eq!(state.polygon_summary().unwrap().solar_capacity_mw(), 0.0);
        assert_consistent(&state);
    }

    #[test]
    fn clearing_polygon_resets_polygon_cells() {
        let mut state = loaded();
        state.set_polygon(square());
        state.clear_polygon();
        assert_eq!(state.phase(), PolygonPhase::NoPolygon);
        assert!(state.polygon_records().is_empty());
        assert!(state.polygon_summary().is_none());
        assert_consistent(&state);
    }

    #[test]
    fn redraw_replaces_polygon_atomically() {
        let mut state = loaded();
        state.set_polygon(square());
        state.set_polygon(Polygon::new(vec![(15.0, 15.0), (15.0, 25.0), (25.0, 25.0), (25.0, 15.0)]));
        let ids: Vec<&str> = state.polygon_records().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["s2"]);
        assert_consistent(&state);
    }

    #[test]
    fn short_polygon_is_active_but_matches_nothing() {
        let mut state = loaded();
        state.set_polygon(Polygon::new(vec![(0.0, 0.0), (10.0, 10.0)]));
        assert_eq!(state.phase(), PolygonPhase::Active);
        assert!(state.polygon_records().is_empty());
        assert_eq!(state.polygon_summary().unwrap().total_count, 0);
    }

    #[test]
    fn appended_segments_flow_through_and_duplicates_are_dropped() {
        let mut state = loaded();
        state.set_polygon(square());
        let added = state.append_segment(vec![
            record("h1", SourceCategory::Hydro, 300.0, "WA", 1.0, 1.0),
            record("s1", SourceCategory::Solar, 999.0, "CA", 5.0, 5.0),
        ]);

        assert_eq!(added, 1);
        assert_eq!(state.raw_records().len(), 5);
        assert_eq!(state.summary().total_count, 5);
        assert_eq!(state.polygon_records().len(), 3);
        assert_consistent(&state);
    }

    #[test]
    fn replacing_a_category_keeps_the_others() {
        let mut state = loaded();
        state.set_polygon(square());
        assert!(state.select_record("s1"));

        state.begin_load(2);
        assert_eq!(state.raw_records().len(), 4);
        assert_eq!(state.progress().of, 2);

        let added = state.replace_category(
            SourceCategory::Solar,
            vec![record("s9", SourceCategory::Solar, 70.0, "NV", 3.0, 3.0)],
        );
        assert_eq!(added, 1);
        let ids: Vec<&str> = state.raw_records().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["w1", "w2", "s9"]);
        assert!(state.selected().is_none());
        assert_eq!(state.summary().solar_capacity_mw(), 70.0);
        assert_eq!(state.polygon_summary().unwrap().solar_capacity_mw(), 70.0);
        assert_consistent(&state);
    }

    #[test]
    fn replaced_category_ids_can_be_loaded_again() {
        let mut state = loaded();
        state.replace_category(
            SourceCategory::Wind,
            vec![record("w1", SourceCategory::Wind, 175.0, "TX", 2.0, 8.0)],
        );
        assert_eq!(state.raw_records().len(), 3);
        assert_eq!(state.summary().wind_capacity_mw(), 175.0);
        assert!(state.select_record("w1"));
        assert!(!state.select_record("w2"));
    }

    #[test]
    fn unknown_selection_clears_previous_one() {
        let mut state = loaded();
        state.select_record("s1");
        assert!(!state.select_record("nope"));
        assert!(state.selected().is_none());
    }

    #[test]
    fn live_samples_are_replaced_not_merged() {
        let mut state = ViewState::default();
        let sample = |region: &str| LiveGenerationSample {
            region: region.to_string(),
            region_name: region.to_string(),
            solar_mwh: 1.0,
            wind_mwh: 2.0,
            total_mwh: 3.0,
            fetched_at: datetime!(2024-06-01 12:00:00 UTC),
        };
        state.replace_live_samples(vec![sample("CISO"), sample("ERCO")]);
        state.replace_live_samples(vec![sample("PJM")]);
        assert_eq!(state.live_samples().len(), 1);
        assert_eq!(state.live_samples()[0].region, "PJM");
    }

    #[test]
    fn snapshot_reflects_current_cells() {
        let mut state = loaded();
        state.set_polygon(square());
        state.set_status("Loaded 4 records");
        let snap = state.snapshot();
        assert_eq!(snap.loaded_count, 4);
        assert_eq!(snap.filtered.len(), 4);
        assert_eq!(snap.polygon_records.len(), 2);
        assert_eq!(snap.phase, PolygonPhase::Active);
        assert_eq!(snap.loading_status, "Loaded 4 records");
        assert!(snap.polygon_summary.is_some());
    }
}

use std::{collections::HashSet, sync::Arc, time::Instant};

use eia_client::domain::{Record, SourceCategory};
use futures::{Stream, StreamExt};

use super::{validate, Provider, TransportError};

/// Upper bound on records requested per category.
pub const MAX_PAGE_LIMIT: usize = 5000;

/// Result of retrieving one category during a bulk load.
#[derive(Debug, Clone)]
pub struct SegmentOutcome {
    pub category: SourceCategory,
    /// 1-based index of this segment within the load.
    pub position: usize,
    pub of: usize,
    pub result: Result<Vec<Record>, TransportError>,
}

impl SegmentOutcome {
    pub fn status_line(&self) -> String {
        match &self.result {
            Ok(records) => format!(
                "Loaded {} {} records ({} of {})",
                records.len(),
                self.category,
                self.position,
                self.of
            ),
            Err(e) => format!(
                "Could not load {} records ({} of {}): {e}",
                self.category, self.position, self.of
            ),
        }
    }
}

/// Retrieve each category in turn, yielding one outcome per category as soon
/// as it completes. A failed category does not stop the remaining ones.
pub fn bulk_load(
    provider: Arc<dyn Provider>,
    categories: Vec<SourceCategory>,
    page_limit: usize,
) -> impl Stream<Item = SegmentOutcome> + Send + 'static {
    let page_limit = page_limit.clamp(1, MAX_PAGE_LIMIT);
    let of = categories.len();

    async_stream::stream! {
        for (i, category) in categories.into_iter().enumerate() {
            let started = Instant::now();
            let result = provider
                .retrieve_records(category, page_limit)
                .await
                .map(|records| validate::retain_valid(category, records));

            metrics::histogram!("bulk_segment_seconds", "category" => category.as_str())
                .record(started.elapsed().as_secs_f64());

            match &result {
                Ok(records) => {
                    metrics::counter!("records_loaded_total", "category" => category.as_str())
                        .increment(records.len() as u64);
                    tracing::info!(%category, records = records.len(), position = i + 1, of, "segment loaded");
                }
                Err(e) => {
                    metrics::counter!("transport_errors_total", "operation" => "records").increment(1);
                    tracing::warn!(%category, error = %e, position = i + 1, of, "segment failed");
                }
            }

            yield SegmentOutcome {
                category,
                position: i + 1,
                of,
                result,
            };
        }
    }
}

/// Everything a finished bulk load produced. Record ids are unique; a repeated
/// id keeps the first record seen.
#[derive(Debug, Default)]
pub struct BulkLoadReport {
    pub records: Vec<Record>,
    pub loaded: Vec<(SourceCategory, usize)>,
    pub failures: Vec<(SourceCategory, TransportError)>,
    pub duplicates: usize,
    ids: HashSet<String>,
}

impl BulkLoadReport {
    pub fn absorb(&mut self, outcome: SegmentOutcome) {
        match outcome.result {
            Ok(records) => {
                let before = self.records.len();
                let offered = records.len();
                for r in records {
                    if self.ids.insert(r.id.clone()) {
                        self.records.push(r);
                    }
                }
                let added = self.records.len() - before;
                if added < offered {
                    let dropped = offered - added;
                    self.duplicates += dropped;
                    metrics::counter!("records_duplicate_dropped_total").increment(dropped as u64);
                    tracing::debug!(category = %outcome.category, dropped, "dropped records with duplicate ids");
                }
                self.loaded.push((outcome.category, added));
            }
            Err(e) => self.failures.push((outcome.category, e)),
        }
    }

    /// Only a load where every category failed counts as a total failure.
    pub fn is_total_failure(&self) -> bool {
        self.loaded.is_empty() && !self.failures.is_empty()
    }
}

/// Drive [`bulk_load`] to completion.
pub async fn load_all(
    provider: Arc<dyn Provider>,
    categories: Vec<SourceCategory>,
    page_limit: usize,
) -> BulkLoadReport {
    let mut report = BulkLoadReport::default();
    let mut segments = Box::pin(bulk_load(provider, categories, page_limit));
    while let Some(outcome) = segments.next().await {
        report.absorb(outcome);
    }
    report
}

use std::{sync::Arc, time::Duration};

use eia_client::domain::SourceCategory;
use futures::StreamExt;
use tokio::{
    sync::{
        mpsc::{self, error::TrySendError},
        watch,
    },
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use super::state::{ViewSnapshot, ViewState};
use crate::{
    acquisition::{bulk_load, fetch_live, spawn_periodic, LiveFetch, Provider, RefreshSequencer, SegmentOutcome},
    filter::FilterCriteria,
    geometry::Polygon,
};

/// Everything that can change a session, from users or from finished I/O.
#[derive(Debug)]
pub enum SessionEvent {
    PolygonDrawn(Polygon),
    PolygonCleared,
    CriteriaChanged(FilterCriteria),
    RecordSelected(String),
    RefreshRequested,
    AutoRefreshToggled(bool),
    ReloadRequested,
    SegmentLoaded { load: u64, outcome: SegmentOutcome },
    BulkLoadFinished { load: u64 },
    LiveSamplesFetched(LiveFetch),
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub categories: Vec<SourceCategory>,
    pub page_limit: usize,
    pub auto_refresh: bool,
    pub refresh_interval: Duration,
    pub channel_capacity: usize,
    pub initial_criteria: FilterCriteria,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            categories: vec![SourceCategory::Solar, SourceCategory::Wind, SourceCategory::Hydro],
            page_limit: crate::acquisition::MAX_PAGE_LIMIT,
            auto_refresh: false,
            refresh_interval: Duration::from_secs(300),
            channel_capacity: 256,
            initial_criteria: FilterCriteria::default(),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("session is no longer running")]
pub struct SessionClosed;

/// Cloneable access to a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    events: mpsc::Sender<SessionEvent>,
    snapshots: watch::Receiver<Arc<ViewSnapshot>>,
}

impl SessionHandle {
    pub async fn send(&self, event: SessionEvent) -> Result<(), SessionClosed> {
        self.events.send(event).await.map_err(|_| SessionClosed)
    }

    /// Latest published view.
    pub fn snapshot(&self) -> Arc<ViewSnapshot> {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<ViewSnapshot>> {
        self.snapshots.clone()
    }
}

/// Start a session task. The initial bulk load begins immediately, and
/// periodic refresh too when enabled in `options`.
///
/// The task ends once every [`SessionHandle`] is dropped and in-flight
/// retrievals have reported back.
pub fn spawn(provider: Arc<dyn Provider>, options: SessionOptions) -> (SessionHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(options.channel_capacity.max(1));
    let state = ViewState::new(options.initial_criteria.clone());
    let (snapshots_tx, snapshots_rx) = watch::channel(Arc::new(state.snapshot()));

    let mut session = Session::new(provider, options, state, tx.downgrade(), snapshots_tx);
    let task = tokio::spawn(async move {
        session.start();
        session.run(rx).await;
    });

    (
        SessionHandle {
            events: tx,
            snapshots: snapshots_rx,
        },
        task,
    )
}

struct Session {
    state: ViewState,
    provider: Arc<dyn Provider>,
    options: SessionOptions,
    events: mpsc::WeakSender<SessionEvent>,
    snapshots: watch::Sender<Arc<ViewSnapshot>>,
    load: u64,
    refresh: RefreshSequencer,
    auto_refresh: Option<CancellationToken>,
}

impl Session {
    fn new(
        provider: Arc<dyn Provider>,
        options: SessionOptions,
        state: ViewState,
        events: mpsc::WeakSender<SessionEvent>,
        snapshots: watch::Sender<Arc<ViewSnapshot>>,
    ) -> Self {
        Self {
            state,
            provider,
            options,
            events,
            snapshots,
            load: 0,
            refresh: RefreshSequencer::default(),
            auto_refresh: None,
        }
    }

    fn start(&mut self) {
        self.start_load();
        if self.options.auto_refresh {
            self.toggle_auto_refresh(true);
        }
        self.publish();
    }

    async fn run(mut self, mut rx: mpsc::Receiver<SessionEvent>) {
        while let Some(event) = rx.recv().await {
            self.handle(event);
            self.publish();
        }
        if let Some(token) = self.auto_refresh.take() {
            token.cancel();
        }
        tracing::info!("session ended");
    }

    fn publish(&self) {
        self.snapshots.send_replace(Arc::new(self.state.snapshot()));
    }

    fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::PolygonDrawn(polygon) => self.state.set_polygon(polygon),
            SessionEvent::PolygonCleared => self.state.clear_polygon(),
            SessionEvent::CriteriaChanged(criteria) => self.state.set_criteria(criteria),
            SessionEvent::RecordSelected(id) => {
                if !self.state.select_record(&id) {
                    tracing::debug!(%id, "selected id is not loaded");
                }
            }
            SessionEvent::RefreshRequested => self.start_refresh(),
            SessionEvent::AutoRefreshToggled(enabled) => self.toggle_auto_refresh(enabled),
            SessionEvent::ReloadRequested => self.start_load(),
            SessionEvent::SegmentLoaded { load, outcome } => self.apply_segment(load, outcome),
            SessionEvent::BulkLoadFinished { load } => self.finish_load(load),
            SessionEvent::LiveSamplesFetched(fetch) => self.apply_live(fetch),
        }
    }

    /// Begin a bulk load. Each successful segment replaces its category's
    /// records; a failed one leaves them in place. Segments still arriving from
    /// an earlier load carry an older tag and are dropped.
    fn start_load(&mut self) {
        let Some(tx) = self.events.upgrade() else {
            return;
        };
        self.load += 1;
        let load = self.load;
        let categories = self.options.categories.clone();
        self.state.begin_load(categories.len());
        self.state.set_status(format!("Loading {} categories...", categories.len()));
        tracing::info!(load, categories = categories.len(), "bulk load started");

        let segments = bulk_load(self.provider.clone(), categories, self.options.page_limit);
        tokio::spawn(async move {
            let mut segments = Box::pin(segments);
            while let Some(outcome) = segments.next().await {
                if tx.send(SessionEvent::SegmentLoaded { load, outcome }).await.is_err() {
                    return;
                }
            }
            let _ = tx.send(SessionEvent::BulkLoadFinished { load }).await;
        });
    }

    fn apply_segment(&mut self, load: u64, outcome: SegmentOutcome) {
        if load != self.load {
            metrics::counter!("stale_responses_discarded_total", "kind" => "segment").increment(1);
            tracing::debug!(load, current = self.load, category = %outcome.category, "discarding segment from superseded load");
            return;
        }
        self.state.set_status(outcome.status_line());
        self.state.record_segment(outcome.category, outcome.result.is_ok());
        if let Ok(records) = outcome.result {
            self.state.replace_category(outcome.category, records);
        }
    }

    fn finish_load(&mut self, load: u64) {
        if load != self.load {
            return;
        }
        self.state.finish_load();
        let progress = self.state.progress();
        let loaded = self.state.raw_records().len();
        let status = if progress.of > 0 && progress.failed.len() == progress.of {
            if loaded == 0 {
                "Could not load any records".to_string()
            } else {
                format!("Could not reload records; keeping {loaded} previously loaded")
            }
        } else if progress.failed.is_empty() {
            format!("Loaded {loaded} records")
        } else {
            let failed: Vec<&str> = progress.failed.iter().map(|c| c.as_str()).collect();
            format!("Loaded {loaded} records; failed: {}", failed.join(", "))
        };
        tracing::info!(load, records = loaded, failed = progress.failed.len(), "bulk load finished");
        self.state.set_status(status);
    }

    fn start_refresh(&mut self) {
        let Some(tx) = self.events.upgrade() else {
            return;
        };
        let generation = self.refresh.issue();
        let provider = self.provider.clone();
        tokio::spawn(async move {
            let fetch = fetch_live(provider, generation).await;
            let _ = tx.send(SessionEvent::LiveSamplesFetched(fetch)).await;
        });
    }

    fn apply_live(&mut self, fetch: LiveFetch) {
        match fetch.result {
            Ok(samples) => {
                if self.refresh.accept(fetch.generation) {
                    self.state.replace_live_samples(samples);
                } else {
                    metrics::counter!("stale_responses_discarded_total", "kind" => "live").increment(1);
                    tracing::debug!(
                        generation = fetch.generation,
                        applied = self.refresh.last_applied(),
                        "discarding stale live samples"
                    );
                }
            }
            Err(e) if self.refresh.is_current(fetch.generation) => {
                self.state.set_status(format!("Live refresh failed: {e}"));
            }
            Err(_) => {}
        }
    }

    fn toggle_auto_refresh(&mut self, enabled: bool) {
        self.state.set_auto_refresh(enabled);
        if !enabled {
            if let Some(token) = self.auto_refresh.take() {
                token.cancel();
                tracing::info!("auto refresh disabled");
            }
            return;
        }
        if self.auto_refresh.is_some() {
            return;
        }

        let token = CancellationToken::new();
        let events = self.events.clone();
        spawn_periodic(self.options.refresh_interval, token.clone(), move || {
            let Some(tx) = events.upgrade() else {
                return false;
            };
            match tx.try_send(SessionEvent::RefreshRequested) {
                Ok(()) | Err(TrySendError::Full(_)) => true,
                Err(TrySendError::Closed(_)) => false,
            }
        });
        self.auto_refresh = Some(token);
        tracing::info!(interval_secs = self.options.refresh_interval.as_secs(), "auto refresh enabled");
        self.start_refresh();
    }
}

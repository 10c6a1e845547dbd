use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use eia_client::domain::LiveGenerationSample;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::IntervalStream;
use tokio_util::sync::CancellationToken;

use super::{Provider, TransportError};

/// Generation tags for live refreshes.
///
/// Every request gets a tag from [`issue`](Self::issue). A completed response is
/// applied only when its tag is newer than the last applied one, so a slow
/// response can never overwrite data from a request issued after it.
#[derive(Debug, Default)]
pub struct RefreshSequencer {
    issued: u64,
    applied: u64,
}

impl RefreshSequencer {
    pub fn issue(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    /// Whether a response tagged `generation` may still be shown.
    pub fn is_current(&self, generation: u64) -> bool {
        generation > self.applied && generation <= self.issued
    }

    /// Mark `generation` applied if it is current. Returns `false` for stale
    /// responses, which the caller must drop.
    pub fn accept(&mut self, generation: u64) -> bool {
        if self.is_current(generation) {
            self.applied = generation;
            true
        } else {
            false
        }
    }

    pub fn last_applied(&self) -> u64 {
        self.applied
    }
}

#[derive(Debug, Clone)]
pub struct LiveFetch {
    pub generation: u64,
    pub result: Result<Vec<LiveGenerationSample>, TransportError>,
}

/// Run one tagged live retrieval.
pub async fn fetch_live(provider: Arc<dyn Provider>, generation: u64) -> LiveFetch {
    let started = Instant::now();
    let result = provider.retrieve_live_samples().await;
    metrics::histogram!("live_refresh_seconds").record(started.elapsed().as_secs_f64());

    match &result {
        Ok(samples) => tracing::debug!(generation, samples = samples.len(), "live samples fetched"),
        Err(e) => {
            metrics::counter!("transport_errors_total", "operation" => "live").increment(1);
            tracing::warn!(generation, error = %e, "live refresh failed");
        }
    }

    LiveFetch { generation, result }
}

/// Call `on_tick` every `period` until `token` is cancelled or `on_tick`
/// returns `false`. The first tick fires one full period after the start.
pub fn spawn_periodic<F>(period: Duration, token: CancellationToken, mut on_tick: F) -> JoinHandle<()>
where
    F: FnMut() -> bool + Send + 'static,
{
    let period = period.max(Duration::from_millis(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut ticks = IntervalStream::new(interval);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                tick = ticks.next() => {
                    if tick.is_none() || !on_tick() {
                        break;
                    }
                }
            }
        }
        tracing::debug!("periodic refresh stopped");
    })
}

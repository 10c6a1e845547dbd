//! Retrieval of records and live samples from an external provider.
//!
//! Failures never escape as panics or aborted sessions: every retrieval
//! resolves to a [`TransportError`] that the view layer turns into a status
//! message while keeping what was already loaded.

use eia_client::domain::{LiveGenerationSample, Record, SourceCategory};

pub mod bulk;
pub mod live;
pub mod validate;

pub use bulk::{bulk_load, load_all, BulkLoadReport, SegmentOutcome, MAX_PAGE_LIMIT};
pub use live::{fetch_live, spawn_periodic, LiveFetch, RefreshSequencer};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("failed to retrieve {category} records: {message}")]
    Records {
        category: SourceCategory,
        message: String,
    },
    #[error("failed to retrieve live samples: {0}")]
    Live(String),
}

/// External data provider.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// Up to `page_limit` records of one category.
    async fn retrieve_records(
        &self,
        category: SourceCategory,
        page_limit: usize,
    ) -> Result<Vec<Record>, TransportError>;

    /// Current live generation, one sample per region.
    async fn retrieve_live_samples(&self) -> Result<Vec<LiveGenerationSample>, TransportError>;
}

use eia_client::{
    api::{capacity, generation},
    domain::{LiveGenerationSample, Record, SourceCategory},
    ClientError, EiaClient,
};

use crate::acquisition::{
    validate::{from_generator, note_reject},
    Provider, TransportError,
};

/// [`Provider`] backed by the EIA open-data API.
#[derive(Debug, Clone)]
pub struct EiaProvider {
    client: EiaClient,
    live_regions: Vec<String>,
}

impl EiaProvider {
    /// An empty `live_regions` list falls back to the default balancing
    /// authorities.
    pub fn new(client: EiaClient, live_regions: Vec<String>) -> Self {
        let live_regions = if live_regions.is_empty() {
            generation::DEFAULT_LIVE_REGIONS.iter().map(|r| r.to_string()).collect()
        } else {
            live_regions
        };
        Self { client, live_regions }
    }

    pub fn live_regions(&self) -> &[String] {
        &self.live_regions
    }
}

fn records_error(category: SourceCategory, e: ClientError) -> TransportError {
    TransportError::Records {
        category,
        message: e.to_string(),
    }
}

#[async_trait::async_trait]
impl Provider for EiaProvider {
    async fn retrieve_records(
        &self,
        category: SourceCategory,
        page_limit: usize,
    ) -> Result<Vec<Record>, TransportError> {
        let rows = capacity::operating_capacity(&self.client, category, page_limit)
            .await
            .map_err(|e| records_error(category, e))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            match from_generator(row) {
                Ok(r) => records.push(r),
                Err(reason) => note_reject(category, reason),
            }
        }
        Ok(records)
    }

    async fn retrieve_live_samples(&self) -> Result<Vec<LiveGenerationSample>, TransportError> {
        generation::latest_live_samples(&self.client, &self.live_regions)
            .await
            .map_err(|e| TransportError::Live(e.to_string()))
    }
}

pub mod eia;
pub mod snapshot;

use std::sync::Arc;

use eia_client::EiaClient;

use crate::{acquisition::Provider, config::AppConfig};

pub use eia::EiaProvider;
pub use snapshot::SnapshotProvider;

/// The configured provider: the CSV snapshot when `acquisition.snapshot_path`
/// is set, the EIA API otherwise.
pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Arc<dyn Provider>> {
    if let Some(path) = &cfg.acquisition.snapshot_path {
        tracing::info!(path = %path.display(), "using offline record snapshot");
        return Ok(Arc::new(SnapshotProvider::open(path)?));
    }
    let client = EiaClient::new(cfg.provider.client_config()?)?;
    Ok(Arc::new(EiaProvider::new(client, cfg.provider.live_regions.clone())))
}

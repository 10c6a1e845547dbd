use serde::Deserialize;
use std::{fs, path::PathBuf, time::Duration};

use eia_client::{api::generation::DEFAULT_LIVE_REGIONS, domain::SourceCategory, ClientConfig};

use crate::{acquisition::MAX_PAGE_LIMIT, view::SessionOptions};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub live_regions: Vec<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.eia.gov/v2".to_string(),
            api_key: None,
            timeout_ms: 30_000,
            max_retries: 3,
            retry_backoff_ms: 1_000,
            live_regions: DEFAULT_LIVE_REGIONS.iter().map(|r| r.to_string()).collect(),
        }
    }
}

impl ProviderConfig {
    pub fn client_config(&self) -> anyhow::Result<ClientConfig> {
        let api_key = self
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("no EIA API key: set provider.api_key or EIA_API_KEY"))?;

        let mut cfg = ClientConfig::new(api_key);
        cfg.base_url = self.base_url.clone();
        cfg.timeout = Duration::from_millis(self.timeout_ms);
        cfg.max_retries = self.max_retries;
        cfg.retry_backoff = Duration::from_millis(self.retry_backoff_ms);
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub categories: Vec<String>,
    pub page_limit: usize,
    pub auto_refresh: bool,
    pub refresh_interval_secs: u64,
    /// CSV snapshot to serve instead of the network provider.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            categories: vec!["SOLAR".to_string(), "WIND".to_string(), "HYDRO".to_string()],
            page_limit: MAX_PAGE_LIMIT,
            auto_refresh: false,
            refresh_interval_secs: 300,
            snapshot_path: None,
        }
    }
}

impl AcquisitionConfig {
    /// Configured categories in order, without duplicates.
    pub fn source_categories(&self) -> anyhow::Result<Vec<SourceCategory>> {
        let mut out = Vec::new();
        for name in &self.categories {
            let category = SourceCategory::parse(name)
                .ok_or_else(|| anyhow::anyhow!("unknown source category in acquisition.categories: {name}"))?;
            if !out.contains(&category) {
                out.push(category);
            }
        }
        if out.is_empty() {
            anyhow::bail!("acquisition.categories must name at least one category");
        }
        Ok(out)
    }

    pub fn session_options(&self, channel_capacity: usize) -> anyhow::Result<SessionOptions> {
        Ok(SessionOptions {
            categories: self.source_categories()?,
            page_limit: self.page_limit,
            auto_refresh: self.auto_refresh,
            refresh_interval: Duration::from_secs(self.refresh_interval_secs.max(1)),
            channel_capacity,
            ..SessionOptions::default()
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind_addr: String,
    pub event_channel_capacity: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            event_channel_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub acquisition: AcquisitionConfig,
    pub http: HttpConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    /// Read the TOML file named by `EXPLORER_CONFIG` (default
    /// `explorer-config.toml`). A missing default file yields defaults; a
    /// missing explicitly named file is an error.
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let explicit = env::var("EXPLORER_CONFIG").ok();
        let path = explicit.clone().unwrap_or_else(|| "explorer-config.toml".to_string());
        let mut cfg = match fs::read_to_string(&path) {
            Ok(contents) => Self::from_toml(&contents)?,
            Err(e) if explicit.is_none() && e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path, "no config file found, using defaults");
                Self::default()
            }
            Err(e) => return Err(anyhow::anyhow!("failed to read config {path}: {e}")),
        };

        if cfg.provider.api_key.is_none() {
            cfg.provider.api_key = env::var("EIA_API_KEY").ok();
        }
        Ok(cfg)
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }
}

use anyhow::Result;
use grid_explorer::{api, config::AppConfig, metrics_server, observability, sources, view};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;

    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let provider = sources::from_config(&cfg)?;
    let options = cfg.acquisition.session_options(cfg.http.event_channel_capacity)?;
    tracing::info!(
        categories = options.categories.len(),
        page_limit = options.page_limit,
        auto_refresh = options.auto_refresh,
        "starting session"
    );
    let (session, _task) = view::spawn(provider, options);

    tokio::select! {
        res = api::serve(session, &cfg.http.bind_addr) => res?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutdown requested"),
    }

    Ok(())
}

use anyhow::{bail, Result};
use grid_explorer::{acquisition::load_all, config::AppConfig, export, observability, sources};
use std::{env, fs::File, io::BufWriter};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("usage: snapshot_records <out.csv>");
    }
    let out_path = &args[1];

    // EXPLORER_CONFIG selects the provider settings, as for the main binary.
    let cfg = AppConfig::load()?;
    let provider = sources::from_config(&cfg)?;
    let categories = cfg.acquisition.source_categories()?;

    let report = load_all(provider, categories, cfg.acquisition.page_limit).await;
    for (category, e) in &report.failures {
        tracing::error!(%category, error = %e, "category could not be loaded");
    }
    if report.is_total_failure() {
        bail!("every category failed; nothing written");
    }

    let file = File::create(out_path)?;
    let rows = export::write_csv(&report.records, BufWriter::new(file))?;
    tracing::info!(
        rows,
        path = %out_path,
        failed = report.failures.len(),
        duplicates = report.duplicates,
        "snapshot written"
    );

    Ok(())
}

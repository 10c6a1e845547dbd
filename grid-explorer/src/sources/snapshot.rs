use std::{fs::File, io::BufReader, path::Path};

use eia_client::domain::{LiveGenerationSample, Record, SourceCategory};

use crate::{
    acquisition::{Provider, TransportError},
    export::{self, ExportError},
};

/// Offline [`Provider`] serving records from a CSV snapshot written by
/// [`export::write_csv`]. Live samples are always empty.
#[derive(Debug, Clone, Default)]
pub struct SnapshotProvider {
    records: Vec<Record>,
}

impl SnapshotProvider {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ExportError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let records = export::read_csv(BufReader::new(file))?;
        tracing::info!(path = %path.display(), records = records.len(), "loaded record snapshot");
        Ok(Self { records })
    }

    pub fn from_records(records: Vec<Record>) -> Self {
        Self { records }
    }
}

#[async_trait::async_trait]
impl Provider for SnapshotProvider {
    async fn retrieve_records(
        &self,
        category: SourceCategory,
        page_limit: usize,
    ) -> Result<Vec<Record>, TransportError> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.source == category)
            .take(page_limit)
            .cloned()
            .collect())
    }

    async fn retrieve_live_samples(&self) -> Result<Vec<LiveGenerationSample>, TransportError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn record(id: &str, source: SourceCategory) -> Record {
        Record {
            id: id.to_string(),
            name: id.to_string(),
            lat: 40.0,
            lon: -90.0,
            source,
            technology: String::new(),
            capacity_mw: 12.5,
            region: "IL".to_string(),
            operating_year: Some(2011),
        }
    }

    #[tokio::test]
    async fn serves_records_by_category_up_to_limit() {
        let provider = SnapshotProvider::from_records(vec![
            record("s1", SourceCategory::Solar),
            record("w1", SourceCategory::Wind),
            record("s2", SourceCategory::Solar),
            record("s3", SourceCategory::Solar),
        ]);

        let solar = provider.retrieve_records(SourceCategory::Solar, 2).await.unwrap();
        let ids: Vec<&str> = solar.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2"]);
        assert!(provider.retrieve_records(SourceCategory::Hydro, 10).await.unwrap().is_empty());
        assert!(provider.retrieve_live_samples().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn opens_exported_csv() {
        let path = std::env::temp_dir().join(format!("grid-explorer-snapshot-{}.csv", std::process::id()));
        {
            let mut file = File::create(&path).unwrap();
            export::write_csv(&[record("w9", SourceCategory::Wind)], &mut file).unwrap();
            file.flush().unwrap();
        }

        let provider = SnapshotProvider::open(&path).unwrap();
        let wind = provider.retrieve_records(SourceCategory::Wind, 10).await.unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(wind, vec![record("w9", SourceCategory::Wind)]);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = SnapshotProvider::open("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, ExportError::Io(_)));
    }
}

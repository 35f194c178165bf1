use crate::config::{IngestConfig, PathsConfig};
use crate::error::{PipelineError, Result};
use crate::ingest::DataSource;
use crate::models::RawTable;
use crate::readers::CsvTableReader;
use crate::utils::constants::EXPECTED_COLUMNS;
use crate::utils::filename::raw_snapshot_path;
use crate::writers::CsvWriter;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub path: PathBuf,
    pub rows: usize,
    pub columns: Vec<String>,
}

/// Copies a source CSV into the raw directory as a dated snapshot
pub struct Ingestor {
    raw_dir: PathBuf,
    timeout: Duration,
}

impl Ingestor {
    pub fn new(raw_dir: impl Into<PathBuf>) -> Self {
        Self {
            raw_dir: raw_dir.into(),
            timeout: Duration::from_secs(crate::utils::constants::DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }

    pub fn from_config(paths: &PathsConfig, ingest: &IngestConfig) -> Self {
        Self::new(&paths.raw_dir).with_timeout(Duration::from_secs(ingest.timeout_secs))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn raw_dir(&self) -> &Path {
        &self.raw_dir
    }

    /// Fetch the source and write `cph_traffic_raw_<YYYYMMDD>.csv` for the
    /// UTC date of `now`; a rerun on the same day replaces the snapshot.
    pub async fn ingest(&self, source: &DataSource, now: DateTime<Utc>) -> Result<IngestOutcome> {
        info!(source = %source, "ingesting");

        let table = match source {
            DataSource::Url(url) => {
                let bytes = self.fetch(url).await?;
                CsvTableReader::new().read_bytes(&bytes)?
            }
            DataSource::File(path) => {
                if !path.exists() {
                    return Err(PipelineError::SourceNotFound(path.display().to_string()));
                }
                let path = path.clone();
                tokio::task::spawn_blocking(move || CsvTableReader::new().read_path(&path))
                    .await??
            }
        };

        log_table(&table);

        let path = raw_snapshot_path(&self.raw_dir, now);
        let out = path.clone();
        let rows = table.len();
        let columns = table.headers().to_vec();
        tokio::task::spawn_blocking(move || CsvWriter::new().write_table(&table, &out)).await??;

        info!(path = %path.display(), rows, "wrote raw snapshot");
        Ok(IngestOutcome {
            path,
            rows,
            columns,
        })
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if url.trim().is_empty() {
            return Err(PipelineError::Config("SOURCE_URL missing".to_string()));
        }

        let client = reqwest::Client::builder().timeout(self.timeout).build()?;
        let response = client.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        debug!(url, bytes = bytes.len(), "downloaded source");
        Ok(bytes.to_vec())
    }
}

/// Expected traffic columns present in the table, matched case-insensitively
pub fn expected_columns_found(table: &RawTable) -> Vec<&'static str> {
    EXPECTED_COLUMNS
        .iter()
        .copied()
        .filter(|c| table.has_column(c))
        .collect()
}

fn log_table(table: &RawTable) {
    info!(rows = table.len(), columns = ?table.headers(), "loaded source table");
    for row in table.head(5) {
        debug!(row = ?row, "preview");
    }
    info!(found = ?expected_columns_found(table), "expected columns present");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    const SOURCE: &str = "timestamp,Count,counter_id,location\n\
                          2024-03-01 07:00:00,5,S1,Jagtvej\n\
                          2024-03-01 08:00:00,7,S1,Jagtvej\n";

    #[tokio::test]
    async fn test_ingest_file_writes_dated_snapshot() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("source.csv");
        std::fs::write(&source, SOURCE).unwrap();

        let ingestor = Ingestor::new(dir.path().join("raw"));
        let now = Utc.with_ymd_and_hms(2025, 9, 3, 4, 10, 0).unwrap();
        let outcome = ingestor
            .ingest(&DataSource::File(source), now)
            .await
            .unwrap();

        assert_eq!(outcome.rows, 2);
        assert_eq!(outcome.columns, vec!["timestamp", "Count", "counter_id", "location"]);
        assert!(outcome.path.ends_with("raw/cph_traffic_raw_20250903.csv"));
        assert_eq!(std::fs::read_to_string(&outcome.path).unwrap(), SOURCE);
    }

    #[tokio::test]
    async fn test_same_day_rerun_overwrites() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("source.csv");
        let ingestor = Ingestor::new(dir.path().join("raw"));
        let now = Utc.with_ymd_and_hms(2025, 9, 3, 4, 10, 0).unwrap();

        std::fs::write(&source, SOURCE).unwrap();
        ingestor.ingest(&DataSource::File(source.clone()), now).await.unwrap();
        std::fs::write(&source, "timestamp,count\n2024-03-02 07:00:00,1\n").unwrap();
        let outcome = ingestor.ingest(&DataSource::File(source), now).await.unwrap();

        assert_eq!(outcome.rows, 1);
        assert_eq!(std::fs::read_dir(dir.path().join("raw")).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_missing_source_file() {
        let dir = TempDir::new().unwrap();
        let ingestor = Ingestor::new(dir.path());
        let result = ingestor
            .ingest(&DataSource::File(dir.path().join("nope.csv")), Utc::now())
            .await;
        assert!(matches!(result, Err(PipelineError::SourceNotFound(_))));
    }

    #[tokio::test]
    async fn test_empty_url_is_config_error() {
        let dir = TempDir::new().unwrap();
        let result = Ingestor::new(dir.path())
            .ingest(&DataSource::Url(String::new()), Utc::now())
            .await;
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_expected_columns_case_insensitive() {
        let table = CsvTableReader::new().read_bytes(SOURCE.as_bytes()).unwrap();
        assert_eq!(
            expected_columns_found(&table),
            vec!["timestamp", "count", "counter_id", "location"]
        );
    }
}

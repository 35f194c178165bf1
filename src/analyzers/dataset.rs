use crate::error::{PipelineError, Result};
use crate::models::EnrichedRecord;
use crate::processors::Enricher;
use crate::readers::{DatasetKind, DatasetReader};
use crate::utils::constants::DATASET_CANDIDATES;
use std::path::{Path, PathBuf};
use tracing::info;

/// The dashboard dataset chosen from the curated directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedDataset {
    pub path: PathBuf,
    pub label: &'static str,
}

#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub path: PathBuf,
    pub label: String,
    pub records: Vec<EnrichedRecord>,
}

pub struct DatasetLocator;

impl DatasetLocator {
    /// First existing candidate, in order of preference
    pub fn locate(curated_dir: &Path) -> Option<LocatedDataset> {
        DATASET_CANDIDATES
            .iter()
            .map(|(file, label)| (curated_dir.join(file), *label))
            .find(|(path, _)| path.is_file())
            .map(|(path, label)| LocatedDataset { path, label })
    }

    pub fn load(curated_dir: &Path) -> Result<LoadedDataset> {
        let located = Self::locate(curated_dir).ok_or_else(|| {
            PipelineError::MissingData(format!(
                "no dataset in {}; run the daily DAG or `prepare` first",
                curated_dir.display()
            ))
        })?;
        let records = load_records(&located.path)?;

        info!(
            path = %located.path.display(),
            label = located.label,
            records = records.len(),
            "loaded dashboard dataset"
        );
        Ok(LoadedDataset {
            path: located.path,
            label: located.label.to_string(),
            records,
        })
    }
}

/// Read an enriched dataset, or daily counts with calendar and synthetic
/// weather fields derived on the fly
pub fn load_records(path: &Path) -> Result<Vec<EnrichedRecord>> {
    let reader = DatasetReader::new();
    match reader.kind(path)? {
        DatasetKind::Enriched => reader.read_enriched(path),
        DatasetKind::DailyCounts => {
            let daily = reader.read_daily_counts(path)?;
            Ok(Enricher::new().enrich(&daily, None))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DailyCount;
    use crate::writers::ParquetWriter;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    #[test]
    fn test_locate_prefers_weather_dataset() {
        let dir = TempDir::new().unwrap();
        assert!(DatasetLocator::locate(dir.path()).is_none());

        std::fs::write(dir.path().join("real_daily_counts.csv"), "day,counter_key,total\n").unwrap();
        let located = DatasetLocator::locate(dir.path()).unwrap();
        assert_eq!(located.label, "Synthetic Data");

        std::fs::write(
            dir.path().join("real_copenhagen_data_with_weather.csv"),
            "day,counter_key,total\n",
        )
        .unwrap();
        let located = DatasetLocator::locate(dir.path()).unwrap();
        assert!(located.path.ends_with("real_copenhagen_data_with_weather.csv"));
        assert_eq!(located.label, "Real Copenhagen Cycling Data + Real Weather");
    }

    #[test]
    fn test_load_daily_counts_parquet() {
        let dir = TempDir::new().unwrap();
        let day = NaiveDate::from_ymd_opt(2025, 9, 2).unwrap();
        ParquetWriter::new()
            .write_daily_counts(
                &[DailyCount::new(day, "S1", 12), DailyCount::new(day, "S2", 4)],
                &dir.path().join("daily_counts.parquet"),
            )
            .unwrap();

        let loaded = DatasetLocator::load(dir.path()).unwrap();
        assert_eq!(loaded.label, "Aggregated Daily Counts");
        assert_eq!(loaded.records.len(), 2);
        assert_eq!(loaded.records[0].month_name, "September");
    }

    #[test]
    fn test_load_without_dataset() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            DatasetLocator::load(dir.path()),
            Err(PipelineError::MissingData(_))
        ));
    }
}

use crate::error::{PipelineError, Result};
use crate::models::{DailyCount, EnrichedRecord, WeatherObservation};
use crate::writers::ParquetWriter;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

const WEATHER_COLUMNS: [&str; 4] = ["temperature", "precipitation", "wind_speed", "weather_condition"];

/// What a curated file holds, judged from its columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    /// day, counter_key, total plus calendar and weather columns
    Enriched,
    /// day, counter_key, total only
    DailyCounts,
}

/// Reads curated CSV and Parquet datasets back into typed records
pub struct DatasetReader;

impl DatasetReader {
    pub fn new() -> Self {
        Self
    }

    pub fn is_parquet(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("parquet"))
    }

    /// Inspect the header (CSV) or schema (Parquet) to classify the file
    pub fn kind(&self, path: &Path) -> Result<DatasetKind> {
        if !path.exists() {
            return Err(PipelineError::SourceNotFound(path.display().to_string()));
        }

        let columns: Vec<String> = if Self::is_parquet(path) {
            ParquetWriter::new().column_names(path)?
        } else {
            let mut reader = csv::Reader::from_path(path)?;
            reader.headers()?.iter().map(|h| h.trim().to_lowercase()).collect()
        };

        for required in ["day", "counter_key", "total"] {
            if !columns.iter().any(|c| c == required) {
                return Err(PipelineError::ColumnDetection {
                    message: format!("required column '{}'", required),
                    columns,
                });
            }
        }

        let has_weather = WEATHER_COLUMNS
            .iter()
            .all(|w| columns.iter().any(|c| c == w));

        Ok(if has_weather {
            DatasetKind::Enriched
        } else {
            DatasetKind::DailyCounts
        })
    }

    pub fn read_enriched(&self, path: &Path) -> Result<Vec<EnrichedRecord>> {
        if Self::is_parquet(path) {
            return ParquetWriter::new().read_enriched(path);
        }
        read_csv_records(path)
    }

    pub fn read_daily_counts(&self, path: &Path) -> Result<Vec<DailyCount>> {
        if Self::is_parquet(path) {
            return ParquetWriter::new().read_daily_counts(path);
        }
        read_csv_records(path)
    }

    pub fn read_weather(&self, path: &Path) -> Result<Vec<WeatherObservation>> {
        let observations: Vec<WeatherObservation> = read_csv_records(path)?;
        for obs in &observations {
            validator::Validate::validate(obs)?;
        }
        Ok(observations)
    }
}

impl Default for DatasetReader {
    fn default() -> Self {
        Self::new()
    }
}

fn read_csv_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Err(PipelineError::SourceNotFound(path.display().to_string()));
    }

    let file = File::open(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file));

    let mut records = Vec::new();
    for result in reader.deserialize() {
        records.push(result?);
    }

    debug!(path = %path.display(), rows = records.len(), "read curated CSV");
    Ok(records)
}

use crate::config::TransformConfig;
use crate::error::{PipelineError, Result};
use crate::models::{DailyCount, EnrichedRecord};
use crate::processors::{DailyAggregator, Enricher, NormalizeReport, Normalizer};
use crate::readers::{CsvTableReader, DatasetReader};
use crate::utils::constants::{DAILY_COUNTS_FILE, PREPARED_DATASET_FILE};
use crate::utils::progress::ProgressReporter;
use crate::utils::stats::saturating_sum;
use crate::writers::{CsvWriter, ParquetWriter};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone)]
pub struct CountsJobSummary {
    pub normalize: NormalizeReport,
    pub daily_rows: usize,
    pub output: PathBuf,
}

#[derive(Debug, Clone)]
pub struct PrepareSummary {
    pub rows: usize,
    pub first_day: Option<NaiveDate>,
    pub last_day: Option<NaiveDate>,
    pub total_rides: i64,
    pub locations: usize,
    pub output: PathBuf,
}

impl PrepareSummary {
    fn from_records(records: &[EnrichedRecord], output: PathBuf) -> Self {
        let locations: HashSet<&str> = records.iter().map(|r| r.counter_key.as_str()).collect();
        Self {
            rows: records.len(),
            first_day: records.iter().map(|r| r.day).min(),
            last_day: records.iter().map(|r| r.day).max(),
            total_rides: saturating_sum(records.iter().map(|r| r.total)),
            locations: locations.len(),
            output,
        }
    }
}

/// Batch transformation: raw export in, curated daily totals out
pub struct CountsJob {
    max_workers: usize,
    batch_size: usize,
    writer: ParquetWriter,
}

impl CountsJob {
    pub fn new(config: &TransformConfig) -> Result<Self> {
        let writer = ParquetWriter::new()
            .with_compression(&config.compression)?
            .with_row_group_size(config.row_group_size);

        Ok(Self {
            max_workers: config.max_workers,
            batch_size: config.batch_size,
            writer,
        })
    }

    /// Read, normalise and aggregate a raw export
    pub fn daily_counts(
        &self,
        input: &Path,
        progress: Option<&ProgressReporter>,
    ) -> Result<(Vec<DailyCount>, NormalizeReport)> {
        if let Some(p) = progress {
            p.set_message(&format!("Reading {}...", input.display()));
        }
        let table = CsvTableReader::new().read_path(input)?;
        info!(path = %input.display(), rows = table.len(), columns = ?table.headers(), "loaded raw export");

        if let Some(p) = progress {
            p.set_message("Normalising observations...");
        }
        let (records, report) = Normalizer::new().normalize(&table)?;
        if records.is_empty() {
            return Err(PipelineError::MissingData(format!(
                "no usable rows in {} ({} rows read)",
                input.display(),
                report.rows_in
            )));
        }

        if let Some(p) = progress {
            p.set_message("Aggregating daily totals...");
        }
        let daily = DailyAggregator::new(self.max_workers)
            .with_chunk_size(self.batch_size.max(1) * 10)
            .aggregate(&records)?;

        Ok((daily, report))
    }

    /// Raw export to `<out_dir>/daily_counts.parquet`, overwriting it
    pub fn run(
        &self,
        input: &Path,
        out_dir: &Path,
        progress: Option<&ProgressReporter>,
    ) -> Result<CountsJobSummary> {
        let (daily, normalize) = self.daily_counts(input, progress)?;

        std::fs::create_dir_all(out_dir)?;
        let output = out_dir.join(DAILY_COUNTS_FILE);

        if let Some(p) = progress {
            p.set_message("Writing Parquet...");
        }
        self.writer
            .write_daily_counts_batched(&daily, &output, self.batch_size)?;

        info!(
            output = %output.display(),
            daily_rows = daily.len(),
            layout = %normalize.layout,
            "wrote daily counts"
        );

        Ok(CountsJobSummary {
            normalize,
            daily_rows: daily.len(),
            output,
        })
    }

    /// Raw export plus optional observed weather to the dashboard dataset
    pub fn prepare(
        &self,
        input: &Path,
        weather: Option<&Path>,
        out_dir: &Path,
        progress: Option<&ProgressReporter>,
    ) -> Result<PrepareSummary> {
        let (daily, _) = self.daily_counts(input, progress)?;

        let observations = match weather {
            Some(path) => Some(DatasetReader::new().read_weather(path)?),
            None => None,
        };

        if let Some(p) = progress {
            p.set_message("Adding calendar and weather context...");
        }
        let enriched = Enricher::new().enrich(&daily, observations.as_deref());

        std::fs::create_dir_all(out_dir)?;
        let output = out_dir.join(PREPARED_DATASET_FILE);
        CsvWriter::new().write_enriched(&enriched, &output)?;

        let summary = PrepareSummary::from_records(&enriched, output);
        info!(
            rows = summary.rows,
            total_rides = summary.total_rides,
            locations = summary.locations,
            output = %summary.output.display(),
            "prepared dashboard dataset"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_raw(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_run_writes_daily_counts() {
        let dir = TempDir::new().unwrap();
        let input = write_raw(
            dir.path(),
            "raw.csv",
            "timestamp,count,counter_id\n\
             2024-03-01 07:00:00,5,S1\n\
             2024-03-01 08:00:00,7,S1\n\
             2024-03-02 07:00:00,2,S1\n\
             bad,1,S1\n",
        );

        let job = CountsJob::new(&TransformConfig::default()).unwrap();
        let summary = job.run(&input, &dir.path().join("curated"), None).unwrap();
        assert_eq!(summary.daily_rows, 2);
        assert_eq!(summary.normalize.rows_dropped(), 1);

        let counts = ParquetWriter::new().read_daily_counts(&summary.output).unwrap();
        assert_eq!(counts[0].total, 12);
        assert_eq!(counts[1].total, 2);
    }

    #[test]
    fn test_run_fails_without_usable_rows() {
        let dir = TempDir::new().unwrap();
        let input = write_raw(dir.path(), "raw.csv", "timestamp,count\nbad,x\n");
        let job = CountsJob::new(&TransformConfig::default()).unwrap();
        assert!(matches!(
            job.run(&input, dir.path(), None),
            Err(PipelineError::MissingData(_))
        ));
    }

    #[test]
    fn test_prepare_from_hourly_export() {
        let dir = TempDir::new().unwrap();
        let input = write_raw(
            dir.path(),
            "bike_traffic.csv",
            "date,time,n,road_name\n\
             2014-06-02,7-8,120,Jagtvej\n\
             2014-06-02,8-9,80,Jagtvej\n\
             2014-06-02,7-8,300,Nørrebrogade\n\
             2014-06-03,7-8,50,Jagtvej\n",
        );

        let job = CountsJob::new(&TransformConfig::default()).unwrap();
        let summary = job.prepare(&input, None, dir.path(), None).unwrap();
        assert_eq!(summary.rows, 3);
        assert_eq!(summary.total_rides, 550);
        assert_eq!(summary.locations, 2);
        assert_eq!(summary.first_day, NaiveDate::from_ymd_opt(2014, 6, 2));
        assert!(summary.output.ends_with("real_copenhagen_data_with_weather_fixed.csv"));

        let records = DatasetReader::new().read_enriched(&summary.output).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].counter_key, "Jagtvej");
        assert_eq!(records[0].total, 200);
    }
}

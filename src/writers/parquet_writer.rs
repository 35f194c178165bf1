use crate::error::{PipelineError, Result};
use crate::models::{DailyCount, EnrichedRecord, Season, WeatherCondition};
use crate::utils::constants::{
    COMPRESSION_GZIP, COMPRESSION_LZ4, COMPRESSION_NONE, COMPRESSION_SNAPPY, COMPRESSION_ZSTD,
    DEFAULT_ROW_GROUP_SIZE,
};
use arrow::array::*;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

const UNIX_EPOCH_DAY: NaiveDate = match NaiveDate::from_ymd_opt(1970, 1, 1) {
    Some(d) => d,
    None => NaiveDate::MIN,
};

fn to_date32(day: NaiveDate) -> i32 {
    (day - UNIX_EPOCH_DAY).num_days() as i32
}

fn from_date32(days: i32) -> Result<NaiveDate> {
    UNIX_EPOCH_DAY
        .checked_add_signed(chrono::Duration::days(days as i64))
        .ok_or_else(|| PipelineError::InvalidFormat(format!("Invalid Date32 value {}", days)))
}

pub struct ParquetWriter {
    compression: Compression,
    row_group_size: usize,
}

impl ParquetWriter {
    pub fn new() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
        }
    }

    pub fn with_compression(mut self, compression: &str) -> Result<Self> {
        self.compression = match compression.to_lowercase().as_str() {
            COMPRESSION_SNAPPY => Compression::SNAPPY,
            COMPRESSION_GZIP => Compression::GZIP(GzipLevel::default()),
            COMPRESSION_LZ4 => Compression::LZ4,
            COMPRESSION_ZSTD => Compression::ZSTD(ZstdLevel::default()),
            COMPRESSION_NONE => Compression::UNCOMPRESSED,
            _ => {
                return Err(PipelineError::Config(format!(
                    "Unsupported compression: {}",
                    compression
                )))
            }
        };
        Ok(self)
    }

    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size.max(1);
        self
    }

    fn properties(&self) -> WriterProperties {
        WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .build()
    }

    /// Write daily totals; an existing file is replaced
    pub fn write_daily_counts(&self, records: &[DailyCount], path: &Path) -> Result<()> {
        self.write_daily_counts_batched(records, path, records.len().max(1))
    }

    /// Write daily totals in batches for memory efficiency
    pub fn write_daily_counts_batched(
        &self,
        records: &[DailyCount],
        path: &Path,
        batch_size: usize,
    ) -> Result<()> {
        let schema = daily_counts_schema();
        let file = File::create(path)?;
        let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(self.properties()))?;

        for chunk in records.chunks(batch_size.max(1)) {
            let batch = daily_counts_to_batch(chunk, schema.clone())?;
            writer.write(&batch)?;
        }

        writer.close()?;
        Ok(())
    }

    /// Write the enriched dashboard dataset; an existing file is replaced
    pub fn write_enriched(&self, records: &[EnrichedRecord], path: &Path) -> Result<()> {
        let schema = enriched_schema();
        let file = File::create(path)?;
        let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(self.properties()))?;

        for chunk in records.chunks(self.row_group_size) {
            let batch = enriched_to_batch(chunk, schema.clone())?;
            writer.write(&batch)?;
        }

        writer.close()?;
        Ok(())
    }

    pub fn read_daily_counts(&self, path: &Path) -> Result<Vec<DailyCount>> {
        let mut records = Vec::new();

        for batch in read_batches(path)? {
            let days = column::<Date32Array>(&batch, "day")?;
            let keys = column::<StringArray>(&batch, "counter_key")?;
            let totals = column::<Int64Array>(&batch, "total")?;

            for i in 0..batch.num_rows() {
                records.push(DailyCount::new(
                    from_date32(days.value(i))?,
                    keys.value(i),
                    totals.value(i),
                ));
            }
        }

        Ok(records)
    }

    pub fn read_enriched(&self, path: &Path) -> Result<Vec<EnrichedRecord>> {
        let mut records = Vec::new();

        for batch in read_batches(path)? {
            let days = column::<Date32Array>(&batch, "day")?;
            let keys = column::<StringArray>(&batch, "counter_key")?;
            let totals = column::<Int64Array>(&batch, "total")?;
            let years = column::<Int32Array>(&batch, "year")?;
            let months = column::<Int32Array>(&batch, "month")?;
            let month_names = column::<StringArray>(&batch, "month_name")?;
            let weekdays = column::<StringArray>(&batch, "weekday")?;
            let seasons = column::<StringArray>(&batch, "season")?;
            let temperatures = column::<Float64Array>(&batch, "temperature")?;
            let conditions = column::<StringArray>(&batch, "weather_condition")?;
            let precipitation = column::<Float64Array>(&batch, "precipitation")?;
            let wind = column::<Float64Array>(&batch, "wind_speed")?;

            for i in 0..batch.num_rows() {
                let season = Season::parse(seasons.value(i)).ok_or_else(|| {
                    PipelineError::InvalidFormat(format!("Invalid season '{}'", seasons.value(i)))
                })?;
                let condition = parse_condition(conditions.value(i))?;

                records.push(EnrichedRecord {
                    day: from_date32(days.value(i))?,
                    counter_key: keys.value(i).to_string(),
                    total: totals.value(i),
                    year: years.value(i),
                    month: months.value(i) as u32,
                    month_name: month_names.value(i).to_string(),
                    weekday: weekdays.value(i).to_string(),
                    season,
                    temperature: temperatures.value(i),
                    weather_condition: condition,
                    precipitation: precipitation.value(i),
                    wind_speed: wind.value(i),
                });
            }
        }

        Ok(records)
    }

    /// Lower-cased column names from the file schema
    pub fn column_names(&self, path: &Path) -> Result<Vec<String>> {
        let file = File::open(path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        Ok(builder
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().to_lowercase())
            .collect())
    }

    /// Get file statistics
    pub fn get_file_info(&self, path: &Path) -> Result<ParquetFileInfo> {
        use parquet::file::reader::{FileReader, SerializedFileReader};

        let file = File::open(path)?;
        let reader = SerializedFileReader::new(file)?;
        let metadata = reader.metadata();

        let row_groups = metadata.num_row_groups();
        let row_group_sizes = (0..row_groups)
            .map(|i| metadata.row_group(i).num_rows())
            .collect();
        let compression = if row_groups > 0 && metadata.row_group(0).num_columns() > 0 {
            metadata.row_group(0).column(0).compression()
        } else {
            self.compression
        };

        Ok(ParquetFileInfo {
            total_rows: metadata.file_metadata().num_rows(),
            row_groups: row_groups as i32,
            row_group_sizes,
            file_size: std::fs::metadata(path)?.len(),
            compression,
            columns: metadata
                .file_metadata()
                .schema_descr()
                .columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
        })
    }
}

impl Default for ParquetWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn daily_counts_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("day", DataType::Date32, false),
        Field::new("counter_key", DataType::Utf8, false),
        Field::new("total", DataType::Int64, false),
    ]))
}

fn enriched_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("day", DataType::Date32, false),
        Field::new("counter_key", DataType::Utf8, false),
        Field::new("total", DataType::Int64, false),
        Field::new("year", DataType::Int32, false),
        Field::new("month", DataType::Int32, false),
        Field::new("month_name", DataType::Utf8, false),
        Field::new("weekday", DataType::Utf8, false),
        Field::new("season", DataType::Utf8, false),
        Field::new("temperature", DataType::Float64, false),
        Field::new("weather_condition", DataType::Utf8, false),
        Field::new("precipitation", DataType::Float64, false),
        Field::new("wind_speed", DataType::Float64, false),
    ]))
}

fn daily_counts_to_batch(records: &[DailyCount], schema: Arc<Schema>) -> Result<RecordBatch> {
    let days: Vec<i32> = records.iter().map(|r| to_date32(r.day)).collect();
    let keys: Vec<&str> = records.iter().map(|r| r.counter_key.as_str()).collect();
    let totals: Vec<i64> = records.iter().map(|r| r.total).collect();

    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Date32Array::from(days)),
            Arc::new(StringArray::from(keys)),
            Arc::new(Int64Array::from(totals)),
        ],
    )?;
    Ok(batch)
}

fn enriched_to_batch(records: &[EnrichedRecord], schema: Arc<Schema>) -> Result<RecordBatch> {
    let strings = |f: fn(&EnrichedRecord) -> &str| -> ArrayRef {
        Arc::new(StringArray::from(records.iter().map(f).collect::<Vec<&str>>()))
    };
    let floats = |f: fn(&EnrichedRecord) -> f64| -> ArrayRef {
        Arc::new(Float64Array::from(records.iter().map(f).collect::<Vec<f64>>()))
    };

    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Date32Array::from(
                records.iter().map(|r| to_date32(r.day)).collect::<Vec<i32>>(),
            )),
            strings(|r| r.counter_key.as_str()),
            Arc::new(Int64Array::from(records.iter().map(|r| r.total).collect::<Vec<i64>>())),
            Arc::new(Int32Array::from(records.iter().map(|r| r.year).collect::<Vec<i32>>())),
            Arc::new(Int32Array::from(
                records.iter().map(|r| r.month as i32).collect::<Vec<i32>>(),
            )),
            strings(|r| r.month_name.as_str()),
            strings(|r| r.weekday.as_str()),
            strings(|r| r.season.as_str()),
            floats(|r| r.temperature),
            strings(|r| r.weather_condition.as_str()),
            floats(|r| r.precipitation),
            floats(|r| r.wind_speed),
        ],
    )?;
    Ok(batch)
}

fn read_batches(path: &Path) -> Result<Vec<RecordBatch>> {
    if !path.exists() {
        return Err(PipelineError::SourceNotFound(path.display().to_string()));
    }

    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?
        .with_batch_size(8192)
        .build()?;

    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }
    Ok(batches)
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| PipelineError::InvalidFormat(format!("Invalid or missing {} column", name)))
}

fn parse_condition(value: &str) -> Result<WeatherCondition> {
    match value {
        "cloudy" => Ok(WeatherCondition::Cloudy),
        "cold" => Ok(WeatherCondition::Cold),
        "rainy" => Ok(WeatherCondition::Rainy),
        "sunny" => Ok(WeatherCondition::Sunny),
        other => Err(PipelineError::InvalidFormat(format!(
            "Invalid weather condition '{}'",
            other
        ))),
    }
}

#[derive(Debug)]
pub struct ParquetFileInfo {
    pub total_rows: i64,
    pub row_groups: i32,
    pub row_group_sizes: Vec<i64>,
    pub file_size: u64,
    pub compression: Compression,
    pub columns: Vec<String>,
}

impl ParquetFileInfo {
    pub fn summary(&self) -> String {
        let avg_group = if self.row_groups > 0 {
            self.total_rows as f64 / self.row_groups as f64
        } else {
            0.0
        };
        format!(
            "Parquet File Info:\n  Total rows: {}\n  Row groups: {}\n  File size: {:.2} MB\n  Compression: {:?}\n  Avg rows per group: {:.0}\n  Columns: {}",
            self.total_rows,
            self.row_groups,
            self.file_size as f64 / 1_048_576.0, // Convert to MB
            self.compression,
            avg_group,
            self.columns.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2013, 4, d).unwrap()
    }

    fn daily() -> Vec<DailyCount> {
        vec![
            DailyCount::new(day(1), "Jagtvej", 4100),
            DailyCount::new(day(1), "Langebro", 2900),
            DailyCount::new(day(2), "Jagtvej", 3800),
        ]
    }

    #[test]
    fn test_write_empty_daily_counts() {
        let writer = ParquetWriter::new();
        let temp_file = NamedTempFile::new().unwrap();
        writer.write_daily_counts(&[], temp_file.path()).unwrap();
        assert_eq!(writer.get_file_info(temp_file.path()).unwrap().total_rows, 0);
    }

    #[test]
    fn test_daily_counts_read_back() -> Result<()> {
        let writer = ParquetWriter::new().with_row_group_size(2);
        let temp_file = NamedTempFile::new().unwrap();

        writer.write_daily_counts_batched(&daily(), temp_file.path(), 2)?;

        assert_eq!(writer.read_daily_counts(temp_file.path())?, daily());
        let info = writer.get_file_info(temp_file.path())?;
        assert_eq!(info.total_rows, 3);
        assert_eq!(info.row_groups, 2);
        assert_eq!(info.columns, vec!["day", "counter_key", "total"]);
        Ok(())
    }

    #[test]
    fn test_enriched_read_back() -> Result<()> {
        let writer = ParquetWriter::new();
        let temp_file = NamedTempFile::new().unwrap();
        let records: Vec<EnrichedRecord> = daily()
            .iter()
            .map(|d| EnrichedRecord::from_daily(d, 9.5, 6.2, 7.0))
            .collect();

        writer.write_enriched(&records, temp_file.path())?;
        let back = writer.read_enriched(temp_file.path())?;
        assert_eq!(back, records);
        assert_eq!(back[0].weather_condition, WeatherCondition::Rainy);
        assert_eq!(writer.column_names(temp_file.path())?.len(), 12);
        Ok(())
    }

    #[test]
    fn test_date32_uses_unix_epoch() {
        assert_eq!(to_date32(NaiveDate::from_ymd_opt(1970, 1, 2).unwrap()), 1);
        assert_eq!(from_date32(0).unwrap(), UNIX_EPOCH_DAY);
    }

    #[test]
    fn test_different_compressions() -> Result<()> {
        for compression in ["snappy", "gzip", "lz4", "zstd", "none"] {
            let writer = ParquetWriter::new().with_compression(compression)?;
            let temp_file = NamedTempFile::new().unwrap();
            let result = writer.write_daily_counts(&daily(), temp_file.path());
            assert!(result.is_ok(), "Failed with compression: {}", compression);
        }

        assert!(ParquetWriter::new().with_compression("brotli-9").is_err());
        Ok(())
    }
}

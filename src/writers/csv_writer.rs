use crate::error::Result;
use crate::models::{EnrichedRecord, RawTable};
use std::path::Path;

/// Writes raw snapshots and curated datasets as comma-separated text
pub struct CsvWriter;

impl CsvWriter {
    pub fn new() -> Self {
        Self
    }

    fn open(&self, path: &Path) -> Result<csv::Writer<std::fs::File>> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Ok(csv::Writer::from_path(path)?)
    }

    /// Write a table verbatim, header first; an existing file is replaced
    pub fn write_table(&self, table: &RawTable, path: &Path) -> Result<()> {
        let mut writer = self.open(path)?;
        writer.write_record(table.headers())?;
        for row in table.rows() {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Write a table with one extra column carrying `value` on every row
    pub fn write_table_with_column(
        &self,
        table: &RawTable,
        name: &str,
        value: &str,
        path: &Path,
    ) -> Result<()> {
        let mut writer = self.open(path)?;
        writer.write_record(table.headers().iter().map(String::as_str).chain([name]))?;
        for row in table.rows() {
            writer.write_record(row.iter().map(String::as_str).chain([value]))?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn write_enriched(&self, records: &[EnrichedRecord], path: &Path) -> Result<()> {
        let mut writer = self.open(path)?;
        if records.is_empty() {
            writer.write_record(ENRICHED_HEADER)?;
        }
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl Default for CsvWriter {
    fn default() -> Self {
        Self::new()
    }
}

const ENRICHED_HEADER: [&str; 12] = [
    "day",
    "counter_key",
    "total",
    "year",
    "month",
    "month_name",
    "weekday",
    "season",
    "temperature",
    "weather_condition",
    "precipitation",
    "wind_speed",
];

use crate::error::{PipelineError, Result};
use crate::models::{CountRecord, RawTable};
use crate::readers::{ColumnDetector, DetectedColumns};
use crate::utils::constants::{AADT_TIMESTAMP, UNKNOWN_COUNTER};
use crate::utils::{parse_date, parse_hour_range_start, parse_timestamp};
use chrono::NaiveDateTime;
use std::fmt;
use tracing::{debug, info};

/// Shape of the raw export, decided from its columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLayout {
    /// One row per counting site with annual average daily traffic
    Aadt,
    /// Public counter export: date, hour range ("7-8"), count `n`, road_name
    HourlyRanges,
    /// One row per observation with a timestamp and a count
    TimeSeries,
}

impl fmt::Display for SourceLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceLayout::Aadt => "AADT",
            SourceLayout::HourlyRanges => "hourly ranges",
            SourceLayout::TimeSeries => "time series",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeReport {
    pub layout: SourceLayout,
    pub rows_in: usize,
    pub rows_kept: usize,
}

impl NormalizeReport {
    pub fn rows_dropped(&self) -> usize {
        self.rows_in - self.rows_kept
    }
}

/// Maps any supported counter export onto `CountRecord`s
pub struct Normalizer {
    aadt_timestamp: NaiveDateTime,
}

impl Normalizer {
    pub fn new() -> Self {
        Self {
            aadt_timestamp: parse_timestamp(AADT_TIMESTAMP).unwrap_or_default(),
        }
    }

    pub fn detect_layout(table: &RawTable, columns: &DetectedColumns) -> SourceLayout {
        if columns.is_aadt() {
            SourceLayout::Aadt
        } else if table.has_column("date") && table.has_column("time") && table.has_column("n") {
            SourceLayout::HourlyRanges
        } else {
            SourceLayout::TimeSeries
        }
    }

    pub fn normalize(&self, table: &RawTable) -> Result<(Vec<CountRecord>, NormalizeReport)> {
        let columns = ColumnDetector::detect(table);
        let layout = Self::detect_layout(table, &columns);

        info!(
            %layout,
            timestamp = ?columns.timestamp.map(|i| &table.headers()[i]),
            count = ?columns.count.map(|i| &table.headers()[i]),
            counter_id = ?columns.counter_id.map(|i| &table.headers()[i]),
            counter_name = ?columns.counter_name.map(|i| &table.headers()[i]),
            "detected columns"
        );

        let records = match layout {
            SourceLayout::Aadt => self.normalize_aadt(table, &columns)?,
            SourceLayout::HourlyRanges => self.normalize_hourly(table)?,
            SourceLayout::TimeSeries => self.normalize_time_series(table, &columns)?,
        };

        let report = NormalizeReport {
            layout,
            rows_in: table.len(),
            rows_kept: records.len(),
        };
        debug!(
            rows_in = report.rows_in,
            rows_kept = report.rows_kept,
            "normalisation finished"
        );

        Ok((records, report))
    }

    fn normalize_aadt(&self, table: &RawTable, columns: &DetectedColumns) -> Result<Vec<CountRecord>> {
        let count_col = columns.aadt_count().ok_or_else(|| PipelineError::ColumnDetection {
            message: "AADT count column".to_string(),
            columns: table.headers().to_vec(),
        })?;

        let street = table.column_index("vejnavn");
        let site_no = table.column_index("t_nr");
        let description = table.column_index("beskrivelse");

        let mut records = Vec::with_capacity(table.len());
        for row in 0..table.len() {
            let Some(count) = table.cell(row, count_col).and_then(cast_count) else {
                continue;
            };

            // Missing identity columns stay null; the aggregator keys them as unknown
            let cell = |col: Option<usize>| col.and_then(|c| table.cell(row, c)).map(str::to_string);
            let counter_id = cell(street).or_else(|| cell(site_no));
            let counter_name = cell(description).or_else(|| cell(street));

            records.push(CountRecord::new(
                counter_id,
                counter_name,
                self.aadt_timestamp,
                count,
            ));
        }

        Ok(records)
    }

    fn normalize_hourly(&self, table: &RawTable) -> Result<Vec<CountRecord>> {
        let missing = |name: &str| PipelineError::ColumnDetection {
            message: format!("'{}' column", name),
            columns: table.headers().to_vec(),
        };
        let date_col = table.column_index("date").ok_or_else(|| missing("date"))?;
        let time_col = table.column_index("time").ok_or_else(|| missing("time"))?;
        let count_col = table.column_index("n").ok_or_else(|| missing("n"))?;
        let road_col = table.column_index("road_name");

        let mut records = Vec::with_capacity(table.len());
        for row in 0..table.len() {
            let timestamp = table
                .cell(row, date_col)
                .and_then(parse_date)
                .zip(table.cell(row, time_col).and_then(parse_hour_range_start))
                .and_then(|(date, hour)| date.and_hms_opt(hour, 0, 0));
            let count = table.cell(row, count_col).and_then(cast_count);

            let (Some(timestamp), Some(count)) = (timestamp, count) else {
                continue;
            };

            let road = road_col
                .and_then(|c| table.cell(row, c))
                .unwrap_or("Unknown")
                .to_string();

            records.push(CountRecord::new(Some(road.clone()), Some(road), timestamp, count));
        }

        Ok(records)
    }

    fn normalize_time_series(
        &self,
        table: &RawTable,
        columns: &DetectedColumns,
    ) -> Result<Vec<CountRecord>> {
        let (Some(ts_col), Some(count_col)) = (columns.timestamp, columns.count) else {
            return Err(PipelineError::ColumnDetection {
                message: "timestamp/count columns".to_string(),
                columns: table.headers().to_vec(),
            });
        };

        let mut records = Vec::with_capacity(table.len());
        for row in 0..table.len() {
            let timestamp = table.cell(row, ts_col).and_then(parse_timestamp);
            let count = table.cell(row, count_col).and_then(cast_count);

            let (Some(timestamp), Some(count)) = (timestamp, count) else {
                continue;
            };

            let counter_id = match columns.counter_id {
                Some(c) => table.cell(row, c).map(str::to_string),
                None => Some(UNKNOWN_COUNTER.to_string()),
            };
            let counter_name = match columns.counter_name {
                Some(c) => table.cell(row, c).map(str::to_string),
                None => Some(UNKNOWN_COUNTER.to_string()),
            };

            records.push(CountRecord::new(counter_id, counter_name, timestamp, count));
        }

        Ok(records)
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Integer cast: whole numbers as-is, decimals truncated toward zero, else null
pub fn cast_count(value: &str) -> Option<i64> {
    let value = value.trim();
    if let Ok(n) = value.parse::<i64>() {
        return Some(n);
    }

    let f = value.parse::<f64>().ok()?;
    if f.is_finite() && f.abs() < i64::MAX as f64 {
        Some(f.trunc() as i64)
    } else {
        None
    }
}

use crate::utils::constants::{PROCESSED_FILE_PREFIX, RAW_FILE_PREFIX};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Raw snapshot path for the given ingestion time: cph_traffic_raw_{YYYYMMDD}.csv
pub fn raw_snapshot_path(raw_dir: &Path, now: DateTime<Utc>) -> PathBuf {
    let filename = format!("{}{}.csv", RAW_FILE_PREFIX, now.format("%Y%m%d"));
    raw_dir.join(filename)
}

/// Processed snapshot path: processed_data_{YYYYMMDD_HHMMSS}.csv
pub fn processed_snapshot_path(curated_dir: &Path, now: DateTime<Utc>) -> PathBuf {
    let filename = format!(
        "{}{}.csv",
        PROCESSED_FILE_PREFIX,
        now.format("%Y%m%d_%H%M%S")
    );
    curated_dir.join(filename)
}

/// True for file names produced by `raw_snapshot_path`
pub fn is_raw_snapshot_name(name: &str) -> bool {
    name.starts_with(RAW_FILE_PREFIX) && name.ends_with(".csv")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_raw_snapshot_path() {
        let now = Utc.with_ymd_and_hms(2025, 9, 3, 4, 10, 0).unwrap();
        let path = raw_snapshot_path(Path::new("data/raw"), now);
        assert_eq!(path, PathBuf::from("data/raw/cph_traffic_raw_20250903.csv"));
    }

    #[test]
    fn test_processed_snapshot_path() {
        let now = Utc.with_ymd_and_hms(2025, 9, 3, 4, 12, 7).unwrap();
        let path = processed_snapshot_path(Path::new("data/curated"), now);
        assert_eq!(
            path,
            PathBuf::from("data/curated/processed_data_20250903_041207.csv")
        );
    }

    #[test]
    fn test_is_raw_snapshot_name() {
        assert!(is_raw_snapshot_name("cph_traffic_raw_20250903.csv"));
        assert!(!is_raw_snapshot_name("cph_traffic_raw_20250903.parquet"));
        assert!(!is_raw_snapshot_name("processed_data_20250903_041207.csv"));
    }
}

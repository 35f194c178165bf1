/// File name prefixes and fixed names in the raw and curated directories
pub const RAW_FILE_PREFIX: &str = "cph_traffic_raw_";
pub const PROCESSED_FILE_PREFIX: &str = "processed_data_";
pub const DAILY_COUNTS_FILE: &str = "daily_counts.parquet";
pub const PREPARED_DATASET_FILE: &str = "real_copenhagen_data_with_weather_fixed.csv";

/// Dashboard datasets, in order of preference
pub const DATASET_CANDIDATES: [(&str, &str); 5] = [
    (
        "real_copenhagen_data_with_weather_fixed.csv",
        "Real Copenhagen Cycling Data + Real Weather",
    ),
    (
        "real_copenhagen_data_with_weather.csv",
        "Real Copenhagen Cycling Data + Real Weather",
    ),
    (
        "clean_real_copenhagen_data.csv",
        "Real Copenhagen Cycling Data",
    ),
    (DAILY_COUNTS_FILE, "Aggregated Daily Counts"),
    ("real_daily_counts.csv", "Synthetic Data"),
];

/// Directory defaults
pub const DEFAULT_RAW_DIR: &str = "data/raw";
pub const DEFAULT_CURATED_DIR: &str = "data/curated";

/// Schedule defaults for the daily DAG
pub const DEFAULT_DAG_ID: &str = "cph_bike_daily";
pub const DEFAULT_DAG_OWNER: &str = "lux";
pub const DEFAULT_CRON: &str = "10 4 * * *";
pub const DEFAULT_RETRIES: u32 = 1;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 300;

/// Port defaults
pub const DASHBOARD_PORT: u16 = 8501;
pub const SCHEDULER_UI_PORT: u16 = 8080;
pub const ENGINE_UI_PORT: u16 = 8081;

/// Ingestion
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;
pub const EXPECTED_COLUMNS: [&str; 7] = [
    "timestamp",
    "count",
    "counter_id",
    "location",
    "bike",
    "car",
    "vehicle",
];

/// Placeholder used when a counter cannot be identified
pub const UNKNOWN_COUNTER: &str = "unknown";

/// Fixed timestamp assigned to AADT rows, which carry no observation time
pub const AADT_TIMESTAMP: &str = "2024-01-01 00:00:00";

/// Seed for reproducible synthetic weather
pub const SYNTHETIC_WEATHER_SEED: u64 = 42;

/// Processing defaults
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_ROW_GROUP_SIZE: usize = 10000;
pub const MMAP_THRESHOLD_BYTES: u64 = 8 * 1024 * 1024;

/// Parquet compression options
pub const COMPRESSION_SNAPPY: &str = "snappy";
pub const COMPRESSION_GZIP: &str = "gzip";
pub const COMPRESSION_LZ4: &str = "lz4";
pub const COMPRESSION_ZSTD: &str = "zstd";
pub const COMPRESSION_NONE: &str = "none";

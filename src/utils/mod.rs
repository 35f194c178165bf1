pub mod constants;
pub mod filename;
pub mod progress;
pub mod stats;
pub mod timestamp;

pub use constants::*;
pub use filename::{is_raw_snapshot_name, processed_snapshot_path, raw_snapshot_path};
pub use progress::ProgressReporter;
pub use timestamp::{parse_date, parse_hour_range_start, parse_timestamp};

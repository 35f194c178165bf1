pub mod column_detector;
pub mod csv_reader;
pub mod dataset_reader;

pub use column_detector::{ColumnDetector, DetectedColumns};
pub use csv_reader::CsvTableReader;
pub use dataset_reader::{DatasetKind, DatasetReader};

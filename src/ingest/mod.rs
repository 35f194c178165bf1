pub mod ingestor;
pub mod raw_store;
pub mod source;

pub use ingestor::{expected_columns_found, IngestOutcome, Ingestor};
pub use raw_store::RawStore;
pub use source::DataSource;

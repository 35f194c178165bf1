pub mod aggregator;
pub mod counts_job;
pub mod enricher;
pub mod generator;
pub mod integrity_checker;
pub mod normalizer;

pub use aggregator::DailyAggregator;
pub use counts_job::{CountsJob, CountsJobSummary, PrepareSummary};
pub use enricher::Enricher;
pub use generator::SyntheticGenerator;
pub use integrity_checker::{IntegrityChecker, IntegrityReport, Violation, ViolationType};
pub use normalizer::{NormalizeReport, Normalizer, SourceLayout};

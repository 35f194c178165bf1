pub mod bike_analyzer;
pub mod cache;
pub mod dataset;

pub use bike_analyzer::{
    BikeAnalyzer, DayTotal, Insights, LocationSeries, LocationStats, LocationTotal, MonthAnalysis,
    MonthEntry, MonthlySummary, Overview, SeasonSummary, ValueBin, WeatherImpact, WeatherSummary,
};
pub use cache::{CacheStats, QueryCache};
pub use dataset::{load_records, DatasetLocator, LoadedDataset, LocatedDataset};

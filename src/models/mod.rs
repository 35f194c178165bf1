pub mod count;
pub mod daily;
pub mod enriched;
pub mod raw_table;
pub mod weather;

pub use count::CountRecord;
pub use daily::DailyCount;
pub use enriched::{EnrichedRecord, Season, WeatherCondition};
pub use raw_table::RawTable;
pub use weather::WeatherObservation;

/// Serde adapter for `day` columns: writes `YYYY-MM-DD`, reads dates or timestamps
pub mod day_format {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(day: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&day.format("%Y-%m-%d").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        crate::utils::parse_date(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid day '{}'", raw)))
    }
}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily total for one counter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
    #[serde(with = "crate::models::day_format")]
    pub day: NaiveDate,
    pub counter_key: String,
    pub total: i64,
}

impl DailyCount {
    pub fn new(day: NaiveDate, counter_key: impl Into<String>, total: i64) -> Self {
        Self {
            day,
            counter_key: counter_key.into(),
            total,
        }
    }
}

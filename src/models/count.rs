use crate::utils::constants::UNKNOWN_COUNTER;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One normalised counter observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountRecord {
    pub counter_id: Option<String>,
    pub counter_name: Option<String>,
    pub timestamp: NaiveDateTime,
    pub count: i64,
}

impl CountRecord {
    pub fn new(
        counter_id: Option<String>,
        counter_name: Option<String>,
        timestamp: NaiveDateTime,
        count: i64,
    ) -> Self {
        Self {
            counter_id,
            counter_name,
            timestamp,
            count,
        }
    }

    pub fn day(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// Grouping key: the id, falling back to the name
    pub fn counter_key(&self) -> &str {
        self.counter_id
            .as_deref()
            .or(self.counter_name.as_deref())
            .unwrap_or(UNKNOWN_COUNTER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 2)
            .unwrap()
            .and_hms_opt(17, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_counter_key_fallbacks() {
        let by_id = CountRecord::new(Some("101".into()), Some("Dronning Louises Bro".into()), ts(), 3);
        assert_eq!(by_id.counter_key(), "101");

        let by_name = CountRecord::new(None, Some("Dronning Louises Bro".into()), ts(), 3);
        assert_eq!(by_name.counter_key(), "Dronning Louises Bro");

        let anonymous = CountRecord::new(None, None, ts(), 3);
        assert_eq!(anonymous.counter_key(), "unknown");
    }

    #[test]
    fn test_day_truncates_time() {
        let record = CountRecord::new(None, None, ts(), 1);
        assert_eq!(record.day(), NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());
    }
}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Observed daily weather for Copenhagen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct WeatherObservation {
    #[serde(with = "crate::models::day_format")]
    pub day: NaiveDate,

    #[validate(range(min = -50.0, max = 50.0))]
    pub temperature: f64,

    #[validate(range(min = 0.0, max = 1000.0))]
    pub precipitation: f64,

    #[validate(range(min = 0.0, max = 100.0))]
    pub wind_speed: f64,
}

impl WeatherObservation {
    pub fn new(day: NaiveDate, temperature: f64, precipitation: f64, wind_speed: f64) -> Self {
        Self {
            day,
            temperature,
            precipitation,
            wind_speed,
        }
    }
}

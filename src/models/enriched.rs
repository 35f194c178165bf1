use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

use crate::error::{PipelineError, Result};
use crate::models::DailyCount;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Autumn,
}

impl Season {
    /// Meteorological season: Mar-May spring, Jun-Aug summer, Sep-Nov autumn
    pub fn from_month(month: u32) -> Self {
        match month {
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            9..=11 => Season::Autumn,
            _ => Season::Winter,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Winter => "winter",
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "winter" => Some(Season::Winter),
            "spring" => Some(Season::Spring),
            "summer" => Some(Season::Summer),
            "autumn" | "fall" => Some(Season::Autumn),
            _ => None,
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherCondition {
    Cloudy,
    Cold,
    Rainy,
    Sunny,
}

impl WeatherCondition {
    /// Rain dominates, then cold, then calm warm days count as sunny
    pub fn classify(temperature: f64, precipitation: f64, wind_speed: f64) -> Self {
        if precipitation > 5.0 {
            WeatherCondition::Rainy
        } else if temperature < 5.0 {
            WeatherCondition::Cold
        } else if temperature > 20.0 && wind_speed < 10.0 {
            WeatherCondition::Sunny
        } else {
            WeatherCondition::Cloudy
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WeatherCondition::Cloudy => "cloudy",
            WeatherCondition::Cold => "cold",
            WeatherCondition::Rainy => "rainy",
            WeatherCondition::Sunny => "sunny",
        }
    }
}

impl fmt::Display for WeatherCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Daily counter total with calendar and weather context, the dashboard's dataset.
/// Field order matches the CSV column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct EnrichedRecord {
    #[serde(with = "crate::models::day_format")]
    pub day: NaiveDate,

    #[validate(length(min = 1))]
    pub counter_key: String,

    #[validate(range(min = 0))]
    pub total: i64,

    pub year: i32,

    #[validate(range(min = 1, max = 12))]
    pub month: u32,

    pub month_name: String,
    pub weekday: String,
    pub season: Season,

    #[validate(range(min = -50.0, max = 50.0))]
    pub temperature: f64,

    pub weather_condition: WeatherCondition,

    #[validate(range(min = 0.0, max = 1000.0))]
    pub precipitation: f64,

    #[validate(range(min = 0.0, max = 100.0))]
    pub wind_speed: f64,
}

impl EnrichedRecord {
    /// Derive the calendar fields from the day and classify the weather
    pub fn from_daily(
        daily: &DailyCount,
        temperature: f64,
        precipitation: f64,
        wind_speed: f64,
    ) -> Self {
        let day = daily.day;
        Self {
            day,
            counter_key: daily.counter_key.clone(),
            total: daily.total,
            year: day.year(),
            month: day.month(),
            month_name: day.format("%B").to_string(),
            weekday: day.format("%A").to_string(),
            season: Season::from_month(day.month()),
            temperature,
            weather_condition: WeatherCondition::classify(temperature, precipitation, wind_speed),
            precipitation,
            wind_speed,
        }
    }

    /// Check the derived fields agree with the day
    pub fn validate_calendar(&self) -> Result<()> {
        if self.year != self.day.year() || self.month != self.day.month() {
            return Err(PipelineError::InvalidFormat(format!(
                "calendar fields {}-{} disagree with day {}",
                self.year, self.month, self.day
            )));
        }
        if self.season != Season::from_month(self.month) {
            return Err(PipelineError::InvalidFormat(format!(
                "season {} does not match month {}",
                self.season, self.month
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn daily() -> DailyCount {
        DailyCount::new(NaiveDate::from_ymd_opt(2014, 7, 12).unwrap(), "Nørrebrogade", 4210)
    }

    #[test]
    fn test_season_boundaries() {
        assert_eq!(Season::from_month(2), Season::Winter);
        assert_eq!(Season::from_month(3), Season::Spring);
        assert_eq!(Season::from_month(8), Season::Summer);
        assert_eq!(Season::from_month(11), Season::Autumn);
        assert_eq!(Season::from_month(12), Season::Winter);
    }

    #[test]
    fn test_weather_classification_order() {
        assert_eq!(WeatherCondition::classify(25.0, 6.0, 2.0), WeatherCondition::Rainy);
        assert_eq!(WeatherCondition::classify(3.0, 1.0, 2.0), WeatherCondition::Cold);
        assert_eq!(WeatherCondition::classify(22.0, 0.0, 4.0), WeatherCondition::Sunny);
        assert_eq!(WeatherCondition::classify(22.0, 0.0, 12.0), WeatherCondition::Cloudy);
        assert_eq!(WeatherCondition::classify(12.0, 0.0, 4.0), WeatherCondition::Cloudy);
    }

    #[test]
    fn test_from_daily_calendar_fields() {
        let record = EnrichedRecord::from_daily(&daily(), 18.5, 0.4, 4.0);
        assert_eq!(record.year, 2014);
        assert_eq!(record.month, 7);
        assert_eq!(record.month_name, "July");
        assert_eq!(record.weekday, "Saturday");
        assert_eq!(record.season, Season::Summer);
        assert_eq!(record.weather_condition, WeatherCondition::Cloudy);
        assert!(record.validate().is_ok());
        assert!(record.validate_calendar().is_ok());
    }

    #[test]
    fn test_out_of_range_weather_fails_validation() {
        let record = EnrichedRecord::from_daily(&daily(), 75.0, 0.0, 4.0);
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_calendar_mismatch_detected() {
        let mut record = EnrichedRecord::from_daily(&daily(), 18.5, 0.4, 4.0);
        record.month = 8;
        assert!(record.validate_calendar().is_err());
    }
}

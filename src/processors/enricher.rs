use crate::models::{DailyCount, EnrichedRecord, WeatherObservation};
use crate::utils::constants::SYNTHETIC_WEATHER_SEED;
use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use tracing::debug;

/// Adds calendar fields, season and weather to daily totals
pub struct Enricher {
    seed: u64,
}

impl Enricher {
    pub fn new() -> Self {
        Self {
            seed: SYNTHETIC_WEATHER_SEED,
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self { seed }
    }

    /// Observed weather is used for days it covers; other days get
    /// synthetic values drawn in record order from a seeded generator.
    pub fn enrich(
        &self,
        daily: &[DailyCount],
        weather: Option<&[WeatherObservation]>,
    ) -> Vec<EnrichedRecord> {
        let observed: HashMap<NaiveDate, &WeatherObservation> = weather
            .unwrap_or_default()
            .iter()
            .map(|w| (w.day, w))
            .collect();

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut synthetic_days = 0usize;

        let records = daily
            .iter()
            .map(|d| {
                let (temperature, precipitation, wind_speed) = match observed.get(&d.day) {
                    Some(w) => (w.temperature, w.precipitation, w.wind_speed),
                    None => {
                        synthetic_days += 1;
                        synthetic_weather(&mut rng, d.day.month())
                    }
                };
                EnrichedRecord::from_daily(d, temperature, precipitation, wind_speed)
            })
            .collect();

        debug!(
            records = daily.len(),
            synthetic = synthetic_days,
            "weather attached to daily totals"
        );
        records
    }
}

impl Default for Enricher {
    fn default() -> Self {
        Self::new()
    }
}

/// Seasonal ranges: warmer Apr-Sep, wetter Sep-Feb, windier Sep-Feb
fn synthetic_weather(rng: &mut StdRng, month: u32) -> (f64, f64, f64) {
    let temperature = if (4..=9).contains(&month) {
        rng.gen_range(5.0..20.0)
    } else {
        rng.gen_range(0.0..10.0)
    };
    // The wet season wraps the year end, so Sep-Feb is a union of two ranges.
    // A single `9..=2` range would be empty and leave every month at 0-2 mm.
    let precipitation = if month >= 9 || month <= 2 {
        rng.gen_range(0.0..5.0)
    } else {
        rng.gen_range(0.0..2.0)
    };
    let wind_speed = if (3..=8).contains(&month) {
        rng.gen_range(3.0..10.0)
    } else {
        rng.gen_range(5.0..15.0)
    };
    (temperature, precipitation, wind_speed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Season, WeatherCondition};

    fn daily(m: u32, d: u32, key: &str, total: i64) -> DailyCount {
        DailyCount::new(NaiveDate::from_ymd_opt(2010, m, d).unwrap(), key, total)
    }

    #[test]
    fn test_synthetic_weather_is_reproducible_and_in_range() {
        let input: Vec<DailyCount> = (1..=12).map(|m| daily(m, 10, "Jagtvej", 1000)).collect();
        let first = Enricher::new().enrich(&input, None);
        let second = Enricher::new().enrich(&input, None);
        assert_eq!(first, second);

        for r in &first {
            if (4..=9).contains(&r.month) {
                assert!((5.0..20.0).contains(&r.temperature));
            } else {
                assert!((0.0..10.0).contains(&r.temperature));
            }
            if r.month >= 9 || r.month <= 2 {
                assert!((0.0..5.0).contains(&r.precipitation));
            } else {
                assert!((0.0..2.0).contains(&r.precipitation));
            }
            assert!(r.wind_speed >= 3.0 && r.wind_speed < 15.0);
            assert_eq!(
                r.weather_condition,
                WeatherCondition::classify(r.temperature, r.precipitation, r.wind_speed)
            );
        }
    }

    #[test]
    fn test_wet_season_spans_year_end() {
        let december: Vec<DailyCount> = (1..=31).map(|d| daily(12, d, "Jagtvej", 1000)).collect();
        let june: Vec<DailyCount> = (1..=30).map(|d| daily(6, d, "Jagtvej", 1000)).collect();

        let wet = Enricher::new().enrich(&december, None);
        let dry = Enricher::new().enrich(&june, None);
        assert!(wet.iter().any(|r| r.precipitation > 2.0));
        assert!(dry.iter().all(|r| r.precipitation < 2.0));
    }

    #[test]
    fn test_different_seed_changes_weather() {
        let input = vec![daily(6, 1, "Jagtvej", 1000)];
        let a = Enricher::with_seed(1).enrich(&input, None);
        let b = Enricher::with_seed(2).enrich(&input, None);
        assert_ne!(a[0].temperature, b[0].temperature);
    }

    #[test]
    fn test_observed_weather_takes_precedence() {
        let input = vec![daily(7, 1, "Jagtvej", 1000), daily(7, 2, "Jagtvej", 900)];
        let weather = vec![WeatherObservation::new(
            NaiveDate::from_ymd_opt(2010, 7, 1).unwrap(),
            24.0,
            0.0,
            3.0,
        )];

        let records = Enricher::new().enrich(&input, Some(&weather));
        assert_eq!(records[0].temperature, 24.0);
        assert_eq!(records[0].weather_condition, WeatherCondition::Sunny);
        assert_eq!(records[0].season, Season::Summer);
        assert_ne!(records[1].temperature, 24.0);
        assert_eq!(records[1].total, 900);
    }
}

use crate::error::{PipelineError, Result};
use crate::models::{DailyCount, EnrichedRecord, Season, WeatherCondition};
use crate::utils::stats::round_to;
use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const SYNTHETIC_LOCATIONS: [&str; 12] = [
    "Nørrebrogade",
    "Amagerbrogade",
    "Englandsvej",
    "Vesterbrogade",
    "Østerbrogade",
    "Frederiksberg Allé",
    "Gammel Kongevej",
    "Blegdamsvej",
    "Roskildevej",
    "Jagtvej",
    "Nørre Farimagsgade",
    "Vester Farimagsgade",
];

const MIN_DAILY_RIDES: i64 = 20;

/// Demonstration dataset shaped like ten years of Copenhagen counter data
pub struct SyntheticGenerator {
    seed: u64,
}

impl SyntheticGenerator {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// One record per location per day, `start..=end`
    pub fn generate(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<EnrichedRecord>> {
        if end < start {
            return Err(PipelineError::InvalidParameter {
                name: "end".to_string(),
                reason: format!("{} is before start {}", end, start),
            });
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let days = (end - start).num_days() as usize + 1;
        let mut records = Vec::with_capacity(days * SYNTHETIC_LOCATIONS.len());

        for day in start.iter_days().take(days) {
            for location in SYNTHETIC_LOCATIONS {
                records.push(self.generate_one(&mut rng, day, location));
            }
        }

        Ok(records)
    }

    fn generate_one(&self, rng: &mut StdRng, day: NaiveDate, location: &str) -> EnrichedRecord {
        let season = Season::from_month(day.month());
        let (lambda, temp_mean, temp_sd) = match season {
            Season::Summer => (450.0, 18.0, 4.0),
            Season::Winter => (180.0, 2.0, 3.0),
            Season::Spring => (320.0, 12.0, 4.0),
            Season::Autumn => (280.0, 8.0, 4.0),
        };

        let mut rides = poisson(rng, lambda) as i64;
        let temperature = normal(rng, temp_mean, temp_sd);

        if day.weekday().number_from_monday() >= 6 {
            rides = (rides as f64 * 0.7) as i64;
        }

        let condition = if temperature < 5.0 {
            rides = (rides as f64 * 0.6) as i64;
            WeatherCondition::Cold
        } else if temperature > 20.0 {
            rides = (rides as f64 * 1.4) as i64;
            WeatherCondition::Sunny
        } else if temperature > 15.0 {
            rides = (rides as f64 * 1.1) as i64;
            WeatherCondition::Cloudy
        } else {
            WeatherCondition::Cloudy
        };

        if location.contains("Nørrebrogade") {
            rides = (rides as f64 * 1.3) as i64;
        } else if location.contains("Amagerbrogade") {
            rides = (rides as f64 * 1.2) as i64;
        }

        let precipitation = rng.gen_range(0.0..8.0);
        let wind_speed = rng.gen_range(2.0..15.0);

        let daily = DailyCount::new(day, location, rides.max(MIN_DAILY_RIDES));
        let mut record =
            EnrichedRecord::from_daily(&daily, round_to(temperature, 1), precipitation, wind_speed);
        // The demo labels weather from temperature alone
        record.weather_condition = condition;
        record
    }
}

impl Default for SyntheticGenerator {
    fn default() -> Self {
        Self::new(crate::utils::constants::SYNTHETIC_WEATHER_SEED)
    }
}

/// Poisson sample as a sum of small-λ Knuth draws; Poisson variables add,
/// and small slices keep exp(-λ) away from underflow.
fn poisson(rng: &mut StdRng, lambda: f64) -> u64 {
    const SLICE: f64 = 30.0;
    let mut remaining = lambda;
    let mut total = 0;

    while remaining > 0.0 {
        let step = remaining.min(SLICE);
        remaining -= step;

        let limit = (-step).exp();
        let mut product: f64 = rng.gen();
        let mut k = 0;
        while product > limit {
            k += 1;
            product *= rng.gen::<f64>();
        }
        total += k;
    }

    total
}

/// Box-Muller normal sample
fn normal(rng: &mut StdRng, mean: f64, sd: f64) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + sd * z
}

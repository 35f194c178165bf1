use crate::error::{PipelineError, Result};
use crate::models::{EnrichedRecord, Season, WeatherCondition};
use crate::utils::stats::{mean, sample_std, saturating_sum};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Overview {
    pub total_records: usize,
    pub unique_locations: usize,
    pub first_day: Option<NaiveDate>,
    pub last_day: Option<NaiveDate>,
    pub total_rides: i64,
    pub years: usize,
    pub seasons: usize,
    pub months: usize,
    /// Mean over days of the all-location daily sum
    pub avg_daily_rides: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct MonthEntry {
    pub year: i32,
    pub month: u32,
    pub month_name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DayTotal {
    pub day: NaiveDate,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LocationTotal {
    pub counter_key: String,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LocationStats {
    pub counter_key: String,
    pub days: usize,
    pub total: i64,
    pub mean: f64,
    pub std: Option<f64>,
    pub min: i64,
    pub max: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WeatherImpact {
    pub condition: WeatherCondition,
    pub mean_total: f64,
    pub total_rides: i64,
    pub days: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MonthAnalysis {
    pub year: i32,
    pub month: u32,
    pub month_name: String,
    pub total_rides: i64,
    pub avg_daily_rides: f64,
    pub days: usize,
    pub top_location: String,
    pub daily_trend: Vec<DayTotal>,
    pub top_locations: Vec<LocationTotal>,
    pub location_stats: Vec<LocationStats>,
    pub weather_impact: Vec<WeatherImpact>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MonthlySummary {
    pub year: i32,
    pub month: u32,
    pub month_name: String,
    pub year_month: String,
    pub total_rides: i64,
    /// Mean of the per-location daily totals
    pub avg_daily: f64,
    pub days: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SeasonSummary {
    pub season: Season,
    pub avg_daily_rides: f64,
    pub total_rides: i64,
    pub days: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WeatherSummary {
    pub condition: WeatherCondition,
    pub avg_daily_rides: f64,
    pub total_rides: i64,
    pub days: usize,
    pub mean_total: f64,
    pub std_total: Option<f64>,
    pub mean_temperature: f64,
    pub mean_precipitation: f64,
}

/// Right-closed interval `(lower, upper]` of an equal-width binning
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ValueBin {
    pub lower: f64,
    pub upper: f64,
    pub label: String,
    pub count: usize,
    pub mean_total: Option<f64>,
    pub by_condition: BTreeMap<WeatherCondition, f64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LocationSeries {
    pub counter_key: String,
    pub points: Vec<DayTotal>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Insights {
    pub busiest_location: String,
    pub busiest_location_rides: i64,
    /// Mean rides per location per day
    pub avg_rides: f64,
    pub most_consistent_location: Option<String>,
    pub total_rides: i64,
}

impl Insights {
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!(
                "Busiest location: {} with {} total rides",
                self.busiest_location, self.busiest_location_rides
            ),
            format!(
                "Average daily rides: {:.0} rides per location per day",
                self.avg_rides
            ),
        ];
        if let Some(location) = &self.most_consistent_location {
            lines.push(format!(
                "Most consistent: {} (lowest variation in daily rides)",
                location
            ));
        }
        lines.push(format!(
            "Total system usage: {} bike rides across all locations",
            self.total_rides
        ));
        lines
    }
}

/// Dashboard figures over an enriched dataset
pub struct BikeAnalyzer {
    records: Vec<EnrichedRecord>,
}

impl BikeAnalyzer {
    pub fn new(records: Vec<EnrichedRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[EnrichedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn overview(&self) -> Overview {
        let records = &self.records;
        let locations: BTreeSet<&str> = records.iter().map(|r| r.counter_key.as_str()).collect();
        let years: BTreeSet<i32> = records.iter().map(|r| r.year).collect();
        let seasons: BTreeSet<Season> = records.iter().map(|r| r.season).collect();
        let months: BTreeSet<u32> = records.iter().map(|r| r.month).collect();

        Overview {
            total_records: records.len(),
            unique_locations: locations.len(),
            first_day: records.iter().map(|r| r.day).min(),
            last_day: records.iter().map(|r| r.day).max(),
            total_rides: total(records.iter()),
            years: years.len(),
            seasons: seasons.len(),
            months: months.len(),
            avg_daily_rides: avg_of_daily_sums(records.iter()),
        }
    }

    pub fn available_months(&self) -> Vec<MonthEntry> {
        let months: BTreeSet<MonthEntry> = self
            .records
            .iter()
            .map(|r| MonthEntry {
                year: r.year,
                month: r.month,
                month_name: r.month_name.clone(),
            })
            .collect();
        months.into_iter().collect()
    }

    pub fn month_analysis(&self, year: i32, month: u32) -> Result<MonthAnalysis> {
        if !(1..=12).contains(&month) {
            return Err(PipelineError::InvalidParameter {
                name: "month".to_string(),
                reason: format!("{} is not between 1 and 12", month),
            });
        }

        let rows: Vec<&EnrichedRecord> = self
            .records
            .iter()
            .filter(|r| r.year == year && r.month == month)
            .collect();
        let Some(first) = rows.first() else {
            return Err(PipelineError::MissingData(format!(
                "no data found for {}-{:02}",
                year, month
            )));
        };

        let daily = daily_sums(rows.iter().copied());
        let stats = location_stats(rows.iter().copied());
        let top_location = stats
            .first()
            .map(|s| s.counter_key.clone())
            .unwrap_or_default();

        let weather_impact = group_by(rows.iter().copied(), |r| r.weather_condition)
            .into_iter()
            .map(|(condition, group)| WeatherImpact {
                condition,
                mean_total: mean_total(&group),
                total_rides: total(group.iter().copied()),
                days: distinct_days(group.iter().copied()),
            })
            .collect();

        Ok(MonthAnalysis {
            year,
            month,
            month_name: first.month_name.clone(),
            total_rides: total(rows.iter().copied()),
            avg_daily_rides: mean(&daily.values().map(|&v| v as f64).collect::<Vec<_>>())
                .unwrap_or(0.0),
            days: daily.len(),
            top_location,
            daily_trend: daily
                .into_iter()
                .map(|(day, total)| DayTotal { day, total })
                .collect(),
            top_locations: stats
                .iter()
                .take(10)
                .map(|s| LocationTotal {
                    counter_key: s.counter_key.clone(),
                    total: s.total,
                })
                .collect(),
            location_stats: stats,
            weather_impact,
        })
    }

    pub fn monthly_summary(&self) -> Vec<MonthlySummary> {
        group_by(self.records.iter(), |r| (r.year, r.month))
            .into_iter()
            .map(|((year, month), group)| MonthlySummary {
                year,
                month,
                month_name: group[0].month_name.clone(),
                year_month: format!("{}-{:02}", year, month),
                total_rides: total(group.iter().copied()),
                avg_daily: mean_total(&group),
                days: distinct_days(group.iter().copied()),
            })
            .collect()
    }

    pub fn seasonal_summary(&self) -> Vec<SeasonSummary> {
        group_by(self.records.iter(), |r| r.season)
            .into_iter()
            .map(|(season, group)| SeasonSummary {
                season,
                avg_daily_rides: avg_of_daily_sums(group.iter().copied()),
                total_rides: total(group.iter().copied()),
                days: distinct_days(group.iter().copied()),
            })
            .collect()
    }

    pub fn weather_summary(&self) -> Vec<WeatherSummary> {
        group_by(self.records.iter(), |r| r.weather_condition)
            .into_iter()
            .map(|(condition, group)| {
                let totals: Vec<f64> = group.iter().map(|r| r.total as f64).collect();
                let temps: Vec<f64> = group.iter().map(|r| r.temperature).collect();
                let precip: Vec<f64> = group.iter().map(|r| r.precipitation).collect();
                WeatherSummary {
                    condition,
                    avg_daily_rides: avg_of_daily_sums(group.iter().copied()),
                    total_rides: total(group.iter().copied()),
                    days: distinct_days(group.iter().copied()),
                    mean_total: mean(&totals).unwrap_or(0.0),
                    std_total: sample_std(&totals),
                    mean_temperature: mean(&temps).unwrap_or(0.0),
                    mean_precipitation: mean(&precip).unwrap_or(0.0),
                }
            })
            .collect()
    }

    pub fn temperature_bins(&self, bins: usize) -> Result<Vec<ValueBin>> {
        self.value_bins(bins, |r| r.temperature)
    }

    pub fn precipitation_bins(&self, bins: usize) -> Result<Vec<ValueBin>> {
        self.value_bins(bins, |r| r.precipitation)
    }

    fn value_bins(&self, bins: usize, value: fn(&EnrichedRecord) -> f64) -> Result<Vec<ValueBin>> {
        if bins == 0 || bins > 100 {
            return Err(PipelineError::InvalidParameter {
                name: "bins".to_string(),
                reason: format!("{} is not between 1 and 100", bins),
            });
        }

        let values: Vec<f64> = self
            .records
            .iter()
            .map(value)
            .filter(|v| v.is_finite())
            .collect();
        let Some(edges) = cut_edges(&values, bins) else {
            return Ok(Vec::new());
        };

        let mut members: Vec<Vec<&EnrichedRecord>> = vec![Vec::new(); bins];
        for record in &self.records {
            if let Some(i) = bin_index(&edges, value(record)) {
                members[i].push(record);
            }
        }

        Ok(members
            .into_iter()
            .enumerate()
            .map(|(i, group)| {
                let by_condition = group_by(group.iter().copied(), |r| r.weather_condition)
                    .into_iter()
                    .map(|(condition, g)| (condition, mean_total(&g)))
                    .collect();
                ValueBin {
                    lower: edges[i],
                    upper: edges[i + 1],
                    label: format!("({:.1}, {:.1}]", edges[i], edges[i + 1]),
                    count: group.len(),
                    mean_total: if group.is_empty() {
                        None
                    } else {
                        Some(mean_total(&group))
                    },
                    by_condition,
                }
            })
            .collect())
    }

    pub fn top_locations(&self, n: usize) -> Vec<LocationTotal> {
        location_stats(self.records.iter())
            .into_iter()
            .take(n)
            .map(|s| LocationTotal {
                counter_key: s.counter_key,
                total: s.total,
            })
            .collect()
    }

    /// Per-location statistics, busiest first
    pub fn location_stats(&self) -> Vec<LocationStats> {
        location_stats(self.records.iter())
    }

    /// Daily series for each named location; the five busiest when `names` is empty
    pub fn location_comparison(&self, names: &[String]) -> Result<Vec<LocationSeries>> {
        let names: Vec<String> = if names.is_empty() {
            self.top_locations(5).into_iter().map(|l| l.counter_key).collect()
        } else {
            names.to_vec()
        };

        let by_location = group_by(self.records.iter(), |r| r.counter_key.as_str());
        names
            .iter()
            .map(|name| {
                let group = by_location.get(name.as_str()).ok_or_else(|| {
                    PipelineError::MissingData(format!("unknown location '{}'", name))
                })?;
                Ok(LocationSeries {
                    counter_key: name.clone(),
                    points: daily_sums(group.iter().copied())
                        .into_iter()
                        .map(|(day, total)| DayTotal { day, total })
                        .collect(),
                })
            })
            .collect()
    }

    pub fn insights(&self) -> Result<Insights> {
        let stats = location_stats(self.records.iter());
        let busiest = stats
            .first()
            .ok_or_else(|| PipelineError::MissingData("dataset is empty".to_string()))?;

        let most_consistent = stats
            .iter()
            .filter_map(|s| s.std.map(|std| (std, s.counter_key.as_str())))
            .min_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1)))
            .map(|(_, key)| key.to_string());

        Ok(Insights {
            busiest_location: busiest.counter_key.clone(),
            busiest_location_rides: busiest.total,
            avg_rides: mean_total(&self.records.iter().collect::<Vec<_>>()),
            most_consistent_location: most_consistent,
            total_rides: total(self.records.iter()),
        })
    }
}

fn total<'a>(records: impl Iterator<Item = &'a EnrichedRecord>) -> i64 {
    saturating_sum(records.map(|r| r.total))
}

fn mean_total(records: &[&EnrichedRecord]) -> f64 {
    let totals: Vec<f64> = records.iter().map(|r| r.total as f64).collect();
    mean(&totals).unwrap_or(0.0)
}

fn distinct_days<'a>(records: impl Iterator<Item = &'a EnrichedRecord>) -> usize {
    records.map(|r| r.day).collect::<BTreeSet<_>>().len()
}

fn daily_sums<'a>(records: impl Iterator<Item = &'a EnrichedRecord>) -> BTreeMap<NaiveDate, i64> {
    let mut sums = BTreeMap::new();
    for record in records {
        let sum = sums.entry(record.day).or_insert(0i64);
        *sum = sum.saturating_add(record.total);
    }
    sums
}

/// Sum per day first, then average over days
fn avg_of_daily_sums<'a>(records: impl Iterator<Item = &'a EnrichedRecord>) -> f64 {
    let sums: Vec<f64> = daily_sums(records).into_values().map(|v| v as f64).collect();
    mean(&sums).unwrap_or(0.0)
}

fn group_by<'a, K: Ord>(
    records: impl Iterator<Item = &'a EnrichedRecord>,
    key: impl Fn(&'a EnrichedRecord) -> K,
) -> BTreeMap<K, Vec<&'a EnrichedRecord>> {
    let mut groups: BTreeMap<K, Vec<&'a EnrichedRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(key(record)).or_default().push(record);
    }
    groups
}

fn location_stats<'a>(records: impl Iterator<Item = &'a EnrichedRecord>) -> Vec<LocationStats> {
    let mut groups: HashMap<&str, Vec<i64>> = HashMap::new();
    for record in records {
        groups
            .entry(record.counter_key.as_str())
            .or_default()
            .push(record.total);
    }

    let mut stats: Vec<LocationStats> = groups
        .into_iter()
        .map(|(key, totals)| {
            let values: Vec<f64> = totals.iter().map(|&v| v as f64).collect();
            LocationStats {
                counter_key: key.to_string(),
                days: totals.len(),
                total: saturating_sum(totals.iter().copied()),
                mean: mean(&values).unwrap_or(0.0),
                std: sample_std(&values),
                min: totals.iter().copied().min().unwrap_or(0),
                max: totals.iter().copied().max().unwrap_or(0),
            }
        })
        .collect();

    stats.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.counter_key.cmp(&b.counter_key)));
    stats
}

/// Equal-width edges over the value range. The lowest edge is pushed down
/// by 0.1% of the range so the minimum falls inside the first bin; a
/// constant series is widened by 0.1% on both sides.
fn cut_edges(values: &[f64], bins: usize) -> Option<Vec<f64>> {
    let min = values.iter().copied().reduce(f64::min)?;
    let max = values.iter().copied().reduce(f64::max)?;

    let (lo, hi) = if min == max {
        let widen = |v: f64| if v == 0.0 { 0.001 } else { 0.001 * v.abs() };
        (min - widen(min), max + widen(max))
    } else {
        (min, max)
    };

    let step = (hi - lo) / bins as f64;
    let mut edges: Vec<f64> = (0..=bins).map(|i| lo + step * i as f64).collect();
    edges[bins] = hi;
    if min != max {
        edges[0] -= (max - min) * 0.001;
    }
    Some(edges)
}

fn bin_index(edges: &[f64], value: f64) -> Option<usize> {
    if !value.is_finite() {
        return None;
    }
    let last = edges.len().checked_sub(1)?;
    if value <= edges[0] || value > edges[last] {
        return None;
    }
    // First upper edge >= value
    let upper = edges[1..].partition_point(|&e| e < value);
    Some(upper.min(last - 1))
}

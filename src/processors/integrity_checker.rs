use crate::models::EnrichedRecord;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap, HashSet};
use validator::Validate;

#[derive(Debug, Clone)]
pub struct IntegrityReport {
    pub total_records: usize,
    pub valid_records: usize,
    pub invalid_records: usize,
    pub duplicate_keys: usize,
    pub negative_totals: usize,
    pub violations: Vec<Violation>,
    pub counter_coverage: BTreeMap<String, CounterCoverage>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Violation {
    pub counter_key: String,
    pub day: NaiveDate,
    pub violation_type: ViolationType,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationType {
    OutOfRange,
    CalendarMismatch,
    DuplicateKey,
}

/// Days observed for one counter within its first..last span
#[derive(Debug, Clone, Default)]
pub struct CounterCoverage {
    pub days: usize,
    pub first_day: Option<NaiveDate>,
    pub last_day: Option<NaiveDate>,
}

impl CounterCoverage {
    /// Share of calendar days in the span that have a record
    pub fn completeness(&self) -> f64 {
        match (self.first_day, self.last_day) {
            (Some(first), Some(last)) => {
                let span = (last - first).num_days() + 1;
                self.days as f64 / span as f64
            }
            _ => 0.0,
        }
    }
}

pub struct IntegrityChecker;

impl IntegrityChecker {
    pub fn new() -> Self {
        Self
    }

    /// Check field ranges, calendar consistency and (day, counter) uniqueness
    pub fn check(&self, records: &[EnrichedRecord]) -> IntegrityReport {
        let mut report = IntegrityReport {
            total_records: records.len(),
            valid_records: 0,
            invalid_records: 0,
            duplicate_keys: 0,
            negative_totals: 0,
            violations: Vec::new(),
            counter_coverage: BTreeMap::new(),
        };

        let mut seen: HashSet<(NaiveDate, &str)> = HashSet::new();
        let mut days_per_counter: HashMap<&str, HashSet<NaiveDate>> = HashMap::new();

        for record in records {
            let mut valid = true;

            if let Err(e) = record.validate() {
                valid = false;
                report.violations.push(Violation {
                    counter_key: record.counter_key.clone(),
                    day: record.day,
                    violation_type: ViolationType::OutOfRange,
                    details: e.to_string().replace('\n', "; "),
                });
            }

            if let Err(e) = record.validate_calendar() {
                valid = false;
                report.violations.push(Violation {
                    counter_key: record.counter_key.clone(),
                    day: record.day,
                    violation_type: ViolationType::CalendarMismatch,
                    details: e.to_string(),
                });
            }

            if record.total < 0 {
                report.negative_totals += 1;
            }

            if !seen.insert((record.day, record.counter_key.as_str())) {
                report.duplicate_keys += 1;
                report.violations.push(Violation {
                    counter_key: record.counter_key.clone(),
                    day: record.day,
                    violation_type: ViolationType::DuplicateKey,
                    details: "more than one row for this counter and day".to_string(),
                });
            }

            if valid {
                report.valid_records += 1;
            } else {
                report.invalid_records += 1;
            }

            days_per_counter
                .entry(record.counter_key.as_str())
                .or_default()
                .insert(record.day);
        }

        for (key, days) in days_per_counter {
            report.counter_coverage.insert(
                key.to_string(),
                CounterCoverage {
                    days: days.len(),
                    first_day: days.iter().min().copied(),
                    last_day: days.iter().max().copied(),
                },
            );
        }

        report
    }

    /// Generate a summary report
    pub fn generate_summary(&self, report: &IntegrityReport) -> String {
        let pct = |n: usize| {
            if report.total_records == 0 {
                0.0
            } else {
                100.0 * n as f64 / report.total_records as f64
            }
        };

        let mut summary = String::new();
        summary.push_str("=== Integrity Check Report ===\n");
        summary.push_str(&format!("Total Records: {}\n", report.total_records));
        summary.push_str(&format!(
            "Valid Records: {} ({:.1}%)\n",
            report.valid_records,
            pct(report.valid_records)
        ));
        summary.push_str(&format!(
            "Invalid Records: {} ({:.1}%)\n",
            report.invalid_records,
            pct(report.invalid_records)
        ));
        summary.push_str(&format!("Duplicate Keys: {}\n", report.duplicate_keys));
        summary.push_str(&format!("Negative Totals: {}\n", report.negative_totals));
        summary.push_str(&format!("Counters: {}\n", report.counter_coverage.len()));

        let gappy: Vec<_> = report
            .counter_coverage
            .iter()
            .filter(|(_, c)| c.completeness() < 1.0)
            .collect();
        if !gappy.is_empty() {
            summary.push_str("\nCounters with missing days:\n");
            for (key, coverage) in gappy.iter().take(10) {
                summary.push_str(&format!(
                    "  {}: {} days, {:.1}% complete\n",
                    key,
                    coverage.days,
                    100.0 * coverage.completeness()
                ));
            }
        }

        summary.push_str(&format!("\nViolations: {}\n", report.violations.len()));
        if !report.violations.is_empty() {
            summary.push_str("\nTop 10 Violations:\n");
            for (i, violation) in report.violations.iter().take(10).enumerate() {
                summary.push_str(&format!(
                    "  {}. {} on {}: {}\n",
                    i + 1,
                    violation.counter_key,
                    violation.day,
                    violation.details
                ));
            }
        }

        summary
    }
}

impl Default for IntegrityChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DailyCount;

    fn record(d: u32, key: &str, temp: f64) -> EnrichedRecord {
        let daily = DailyCount::new(NaiveDate::from_ymd_opt(2012, 5, d).unwrap(), key, 500);
        EnrichedRecord::from_daily(&daily, temp, 0.5, 4.0)
    }

    #[test]
    fn test_clean_dataset() {
        let records = vec![record(1, "A", 12.0), record(2, "A", 13.0), record(1, "B", 12.0)];
        let checker = IntegrityChecker::new();
        let report = checker.check(&records);
        assert!(report.is_clean());
        assert_eq!(report.valid_records, 3);
        assert_eq!(report.counter_coverage["A"].days, 2);
        assert_eq!(report.counter_coverage["A"].completeness(), 1.0);
        assert!(checker.generate_summary(&report).contains("Valid Records: 3 (100.0%)"));
    }

    #[test]
    fn test_violations_detected() {
        let mut wrong_month = record(3, "A", 12.0);
        wrong_month.month = 6;
        let records = vec![
            record(1, "A", 12.0),
            record(1, "A", 12.0),
            record(5, "A", 80.0),
            wrong_month,
        ];

        let report = IntegrityChecker::new().check(&records);
        assert_eq!(report.duplicate_keys, 1);
        assert_eq!(report.invalid_records, 2);
        assert_eq!(report.valid_records, 2);
        let types: Vec<ViolationType> = report.violations.iter().map(|v| v.violation_type).collect();
        assert!(types.contains(&ViolationType::DuplicateKey));
        assert!(types.contains(&ViolationType::OutOfRange));
        assert!(types.contains(&ViolationType::CalendarMismatch));

        assert_eq!(report.negative_totals, 0);

        // days 1, 3, 5 over a five-day span
        assert!((report.counter_coverage["A"].completeness() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_negative_totals_counted() {
        let mut refund = record(2, "B", 12.0);
        refund.total = -40;
        let records = vec![record(1, "A", 12.0), refund];

        let checker = IntegrityChecker::new();
        let report = checker.check(&records);
        assert_eq!(report.negative_totals, 1);
        assert_eq!(report.invalid_records, 1);
        assert!(report
            .violations
            .iter()
            .any(|v| v.counter_key == "B" && v.violation_type == ViolationType::OutOfRange));
        assert!(checker.generate_summary(&report).contains("Negative Totals: 1\n"));
    }
}

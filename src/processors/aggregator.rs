use crate::error::{PipelineError, Result};
use crate::models::{CountRecord, DailyCount};
use chrono::NaiveDate;
use rayon::prelude::*;
use std::collections::HashMap;

type DailyTotals = HashMap<(NaiveDate, String), i64>;

/// Sums observations into one total per counter per day
pub struct DailyAggregator {
    max_workers: usize,
    chunk_size: usize,
}

impl DailyAggregator {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
            chunk_size: 10_000,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Group by (day, counter key) and sum; output sorted by day, then key
    pub fn aggregate(&self, records: &[CountRecord]) -> Result<Vec<DailyCount>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_workers)
            .build()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        let totals: DailyTotals = pool.install(|| {
            records
                .par_chunks(self.chunk_size)
                .map(fold_chunk)
                .reduce(HashMap::new, merge_totals)
        });

        let mut daily: Vec<DailyCount> = totals
            .into_iter()
            .map(|((day, key), total)| DailyCount::new(day, key, total))
            .collect();
        daily.sort_by(|a, b| a.day.cmp(&b.day).then_with(|| a.counter_key.cmp(&b.counter_key)));

        Ok(daily)
    }
}

impl Default for DailyAggregator {
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}

fn fold_chunk(chunk: &[CountRecord]) -> DailyTotals {
    let mut totals = DailyTotals::new();
    for record in chunk {
        let total = totals
            .entry((record.day(), record.counter_key().to_string()))
            .or_insert(0);
        *total = total.saturating_add(record.count);
    }
    totals
}

fn merge_totals(mut left: DailyTotals, right: DailyTotals) -> DailyTotals {
    if left.len() < right.len() {
        return merge_totals(right, left);
    }
    for (key, total) in right {
        let sum = left.entry(key).or_insert(0);
        *sum = sum.saturating_add(total);
    }
    left
}

use crate::error::Result;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Memoised query results keyed by query name and parameters
#[derive(Default)]
pub struct QueryCache {
    entries: RwLock<HashMap<(String, String), Value>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached JSON for `(query, params)`, computing and storing it on a miss.
    /// Errors are returned to the caller and not cached.
    pub fn get_or_compute<T, F>(&self, query: &str, params: &str, compute: F) -> Result<Value>
    where
        T: Serialize,
        F: FnOnce() -> Result<T>,
    {
        let key = (query.to_string(), params.to_string());

        let cached = self
            .entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
            .cloned();
        if let Some(value) = cached {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(value);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(query, params, "query cache miss");
        let value = serde_json::to_value(compute()?)?;
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, value.clone());
        Ok(value)
    }

    pub fn invalidate(&self) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.read().unwrap_or_else(|e| e.into_inner()).len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use std::cell::Cell;

    #[test]
    fn test_memoises_by_query_and_params() {
        let cache = QueryCache::new();
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            Ok(vec![1, 2, 3])
        };

        let first = cache.get_or_compute("top", "limit=3", compute).unwrap();
        let second = cache.get_or_compute("top", "limit=3", compute).unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.get(), 1);

        cache.get_or_compute("top", "limit=5", compute).unwrap();
        assert_eq!(calls.get(), 2);
        assert_eq!(
            cache.stats(),
            CacheStats {
                entries: 2,
                hits: 1,
                misses: 2
            }
        );

        cache.invalidate();
        cache.get_or_compute("top", "limit=3", compute).unwrap();
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_errors_are_not_cached() {
        let cache = QueryCache::new();
        let result: Result<Value> = cache.get_or_compute("month", "2014-13", || {
            Err::<(), _>(PipelineError::MissingData("none".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(cache.stats().entries, 0);
    }
}

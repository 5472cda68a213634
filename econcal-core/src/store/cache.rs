//! Memoized range/filter query results.
//!
//! An entry is served only while no mutation has happened since it was
//! stored, the active timezone is unchanged and its TTL has not elapsed.
//! Mutations, timezone changes and day rollovers drop everything; callers
//! that know which query shapes a change affects can drop by key substring.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::event::Impact;
use crate::normalize::normalize_currency;

/// Source of "now" for TTL checks.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Optional restrictions on a range query. Empty lists mean "no restriction".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFilters {
    #[serde(default)]
    pub impacts: Vec<Impact>,
    #[serde(default)]
    pub currencies: Vec<String>,
}

impl QueryFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn impacts(mut self, impacts: impl IntoIterator<Item = Impact>) -> Self {
        self.impacts.extend(impacts);
        self
    }

    pub fn currencies<S: AsRef<str>>(mut self, currencies: impl IntoIterator<Item = S>) -> Self {
        self.currencies
            .extend(currencies.into_iter().filter_map(|c| normalize_currency(c.as_ref())));
        self
    }

    /// Sorted, deduplicated, uppercase form so equivalent filters share a key.
    pub fn canonical(&self) -> QueryFilters {
        let mut impacts = self.impacts.clone();
        impacts.sort();
        impacts.dedup();

        let mut currencies: Vec<String> = self
            .currencies
            .iter()
            .filter_map(|c| normalize_currency(c))
            .collect();
        currencies.sort();
        currencies.dedup();

        QueryFilters {
            impacts,
            currencies,
        }
    }
}

/// Serialized `(start, end, filters)` key. Filters must already be canonical.
pub fn cache_key(start: NaiveDate, end: NaiveDate, filters: &QueryFilters) -> String {
    let impacts: Vec<&str> = filters.impacts.iter().map(Impact::as_str).collect();
    format!(
        "{start}..{end}|impacts={}|currencies={}",
        impacts.join(","),
        filters.currencies.join(",")
    )
}

#[derive(Debug)]
struct CacheEntry {
    ids: Arc<Vec<String>>,
    cached_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct QueryCache {
    entries: HashMap<String, CacheEntry>,
    ttl: Duration,
    timezone: Option<Tz>,
    clock: Arc<dyn Clock>,
}

impl QueryCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        QueryCache {
            entries: HashMap::new(),
            ttl,
            timezone: None,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn timezone(&self) -> Option<Tz> {
        self.timezone
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fresh entry for `key`, evicting it first if its TTL has elapsed.
    pub fn get(&mut self, key: &str) -> Option<Arc<Vec<String>>> {
        let now = self.clock.now();
        let expired = {
            let entry = self.entries.get(key)?;
            let age = (now - entry.cached_at).to_std().unwrap_or(Duration::ZERO);
            age >= self.ttl
        };

        if expired {
            trace!(key, "query cache entry expired");
            self.entries.remove(key);
            return None;
        }

        self.entries.get(key).map(|entry| Arc::clone(&entry.ids))
    }

    pub fn insert(&mut self, key: String, ids: Vec<String>) -> Arc<Vec<String>> {
        let ids = Arc::new(ids);
        self.entries.insert(
            key,
            CacheEntry {
                ids: Arc::clone(&ids),
                cached_at: self.clock.now(),
            },
        );
        ids
    }

    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            debug!(entries = self.entries.len(), "query cache cleared");
        }
        self.entries.clear();
    }

    /// Drop everything (`None`) or only keys containing `pattern`.
    /// Returns how many entries were removed.
    pub fn invalidate(&mut self, pattern: Option<&str>) -> usize {
        let before = self.entries.len();
        match pattern {
            None => self.entries.clear(),
            Some(pattern) => self.entries.retain(|key, _| !key.contains(pattern)),
        }
        let removed = before - self.entries.len();
        debug!(?pattern, removed, "query cache invalidated");
        removed
    }

    /// Record the active timezone; a change drops the whole cache because
    /// "today" and day boundaries move with it. Returns whether it changed.
    pub fn on_timezone_change(&mut self, timezone: Tz) -> bool {
        if self.timezone == Some(timezone) {
            return false;
        }
        debug!(from = ?self.timezone, to = %timezone, "timezone changed");
        self.timezone = Some(timezone);
        self.clear();
        true
    }

    /// Local midnight has passed; "today"-relative results are stale.
    pub fn on_day_rollover(&mut self) {
        debug!("day rollover");
        self.clear();
    }
}

#[cfg(test)]
pub(crate) mod test_clock {
    use std::sync::Mutex;

    use super::*;

    /// Clock that only moves when told to.
    #[derive(Debug)]
    pub struct ManualClock(Mutex<DateTime<Utc>>);

    impl ManualClock {
        pub fn new(start: DateTime<Utc>) -> Arc<Self> {
            Arc::new(ManualClock(Mutex::new(start)))
        }

        pub fn advance(&self, by: Duration) {
            let mut now = self.0.lock().unwrap();
            *now += chrono::TimeDelta::from_std(by).unwrap();
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_clock::ManualClock;
    use super::*;
    use chrono::TimeZone;

    fn cache() -> (QueryCache, Arc<ManualClock>) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 1, 10, 8, 0, 0).unwrap());
        let cache = QueryCache::new(Duration::from_secs(300), clock.clone());
        (cache, clock)
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let (mut cache, clock) = cache();
        cache.insert("k".to_string(), vec!["a".to_string()]);

        clock.advance(Duration::from_secs(299));
        assert!(cache.get("k").is_some());

        clock.advance(Duration::from_secs(1));
        assert!(cache.get("k").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_by_pattern() {
        let (mut cache, _) = cache();
        cache.insert("2026-01-10..2026-01-10|impacts=|currencies=USD".into(), vec![]);
        cache.insert("2026-01-10..2026-01-10|impacts=|currencies=EUR".into(), vec![]);

        assert_eq!(cache.invalidate(Some("USD")), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.invalidate(None), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_timezone_change_only_clears_on_difference() {
        let (mut cache, _) = cache();
        assert!(cache.on_timezone_change(chrono_tz::Europe::London));
        cache.insert("k".to_string(), vec![]);

        assert!(!cache.on_timezone_change(chrono_tz::Europe::London));
        assert_eq!(cache.len(), 1);

        assert!(cache.on_timezone_change(chrono_tz::America::New_York));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_filters_canonical_form() {
        let filters = QueryFilters::new()
            .impacts([Impact::Low, Impact::High, Impact::Low])
            .currencies(["usd", "eur", "USD"]);
        let canonical = filters.canonical();

        assert_eq!(canonical.impacts, [Impact::High, Impact::Low]);
        assert_eq!(canonical.currencies, ["EUR", "USD"]);
        assert_eq!(
            cache_key(
                NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
                NaiveDate::from_ymd_opt(2026, 1, 11).unwrap(),
                &canonical
            ),
            "2026-01-10..2026-01-11|impacts=High,Low|currencies=EUR,USD"
        );
    }
}

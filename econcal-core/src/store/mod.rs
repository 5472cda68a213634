//! Canonical event store.
//!
//! Holds every known canonical event by id, keeps the date/currency/impact
//! indexes in step with it and serves range queries through the query
//! cache. Every mutation rebuilds the indexes and drops the cache before it
//! returns, so readers never see an index that disagrees with the event map.

mod cache;
mod index;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{debug, info};

use crate::constants::QUERY_CACHE_TTL;
use crate::error::EconCalResult;
use crate::event::{Event, EventPatch, Impact, LiveUpdate};

pub use cache::{Clock, QueryCache, QueryFilters, SystemClock, cache_key};
pub use index::EventIndex;

#[cfg(test)]
pub(crate) use cache::test_clock::ManualClock;

/// How a batch is merged into the store.
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    /// Feed the batch came from; marked on each event's `sources`.
    pub source: Option<String>,
    /// Replace the whole set instead of appending to it.
    pub overwrite: bool,
}

impl AddOptions {
    pub fn from_source(source: &str) -> Self {
        AddOptions {
            source: Some(source.to_string()),
            overwrite: false,
        }
    }
}

/// A batch contribution recorded by [`EventStore::add_events`].
#[derive(Debug, Clone, PartialEq)]
pub struct SourceContribution {
    pub source: String,
    pub events: usize,
    pub at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct EventStore {
    events_by_id: BTreeMap<String, Event>,
    index: EventIndex,
    cache: QueryCache,
    source_log: Vec<SourceContribution>,
    clock: Arc<dyn Clock>,
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EventStore {
    pub fn new() -> Self {
        Self::with_clock(QUERY_CACHE_TTL, Arc::new(SystemClock))
    }

    pub fn with_cache_ttl(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        EventStore {
            events_by_id: BTreeMap::new(),
            index: EventIndex::default(),
            cache: QueryCache::new(ttl, Arc::clone(&clock)),
            source_log: Vec::new(),
            clock,
        }
    }

    /// Start a session from a full snapshot, replacing anything held.
    pub fn init(&mut self, events: Vec<Event>, source: &str) {
        self.add_events(
            events,
            AddOptions {
                source: Some(source.to_string()),
                overwrite: true,
            },
        );
    }

    /// Merge a batch. Appends by default (same id: last write wins) or
    /// replaces the whole set with `overwrite`.
    pub fn add_events(&mut self, events: Vec<Event>, options: AddOptions) {
        let now = self.clock.now();
        let count = events.len();

        if options.overwrite {
            self.events_by_id.clear();
        }

        for mut event in events {
            if let Some(source) = &options.source {
                event.sources.insert(source.clone(), true);
            }
            self.events_by_id.insert(event.id.clone(), event);
        }

        self.events_by_id = std::mem::take(&mut self.events_by_id)
            .into_iter()
            .map(|(id, event)| (id, event.normalized()))
            .collect();

        if let Some(source) = options.source {
            self.source_log.push(SourceContribution {
                source,
                events: count,
                at: now,
            });
        }

        self.rebuild();
        info!(
            added = count,
            total = self.events_by_id.len(),
            overwrite = options.overwrite,
            "events added to store"
        );
    }

    /// Merge `patch` into the event with `id`, or insert it as a new event
    /// when the id is unknown (a live update can beat the initial load).
    pub fn update_event(&mut self, id: &str, patch: EventPatch) -> EconCalResult<()> {
        let stamp = patch.updated_at.unwrap_or_else(|| self.clock.now());

        let event = match self.events_by_id.remove(id) {
            Some(mut existing) => {
                existing.apply_patch(patch);
                existing
            }
            None => {
                debug!(id, "update for unknown event, inserting");
                patch.into_event(id)?
            }
        };

        let mut event = event.normalized();
        event.updated_at = Some(stamp);
        self.events_by_id.insert(id.to_string(), event);

        self.rebuild();
        Ok(())
    }

    /// Apply pushed live updates in arrival order, stopping at the first
    /// one that cannot form a valid event.
    pub fn apply_live_updates(
        &mut self,
        updates: impl IntoIterator<Item = LiveUpdate>,
    ) -> EconCalResult<usize> {
        let mut applied = 0;
        for update in updates {
            self.update_event(&update.id, update.patch)?;
            applied += 1;
        }
        Ok(applied)
    }

    pub fn get_event_by_id(&self, id: &str) -> Option<&Event> {
        self.events_by_id.get(id)
    }

    /// Lookup several ids; unknown ids are skipped.
    pub fn get_events_by_ids<S: AsRef<str>>(&self, ids: &[S]) -> Vec<&Event> {
        ids.iter()
            .filter_map(|id| self.events_by_id.get(id.as_ref()))
            .collect()
    }

    pub fn get_currencies(&self) -> Vec<String> {
        self.index.currencies()
    }

    pub fn get_impacts(&self) -> Vec<Impact> {
        self.index.impacts()
    }

    pub fn source_log(&self) -> &[SourceContribution] {
        &self.source_log
    }

    pub fn index(&self) -> &EventIndex {
        &self.index
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.events_by_id.values()
    }

    pub fn len(&self) -> usize {
        self.events_by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events_by_id.is_empty()
    }

    /// Reset to empty, cache and source log included.
    pub fn clear(&mut self) {
        self.events_by_id.clear();
        self.source_log.clear();
        self.rebuild();
    }

    // QUERIES:

    /// Ids of events dated (UTC) within `[start, end]`, narrowed by the
    /// filters. Ordered by date, then id.
    pub fn query_by_date_range(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
        filters: &QueryFilters,
    ) -> Arc<Vec<String>> {
        let filters = filters.canonical();
        let key = cache_key(start, end, &filters);

        if let Some(hit) = self.cache.get(&key) {
            return hit;
        }

        let mut ids = self.index.ids_in_date_range(start, end);

        if !filters.impacts.is_empty() {
            let allowed = self.index.ids_for_impacts(&filters.impacts);
            ids.retain(|id| allowed.contains(id.as_str()));
        }

        if !filters.currencies.is_empty() {
            let allowed = self.index.ids_for_currencies(&filters.currencies);
            ids.retain(|id| allowed.contains(id.as_str()));
        }

        debug!(%key, results = ids.len(), "range query computed");
        self.cache.insert(key, ids)
    }

    /// Events for the ids of a range query, in the same order.
    pub fn query_events(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
        filters: &QueryFilters,
    ) -> Vec<&Event> {
        let ids = self.query_by_date_range(start, end, filters);
        self.get_events_by_ids(ids.as_slice())
    }

    pub fn on_timezone_change(&mut self, timezone: Tz) -> bool {
        self.cache.on_timezone_change(timezone)
    }

    pub fn on_day_rollover(&mut self) {
        self.cache.on_day_rollover();
    }

    /// Drop all cached queries, or only those whose key contains `pattern`.
    pub fn invalidate_query_cache(&mut self, pattern: Option<&str>) -> usize {
        self.cache.invalidate(pattern)
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    fn rebuild(&mut self) {
        self.index = EventIndex::build(self.events_by_id.values());
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use std::collections::{BTreeSet, HashMap};

    fn jan(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    fn event(id: &str, name: &str, day: u32, currency: &str, impact: Impact) -> Event {
        Event::new(id, name, Utc.with_ymd_and_hms(2026, 1, day, 13, 30, 0).unwrap())
            .with_currency(currency)
            .with_impact(impact)
    }

    fn store() -> (EventStore, Arc<ManualClock>) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 1, 10, 8, 0, 0).unwrap());
        let mut store = EventStore::with_clock(QUERY_CACHE_TTL, clock.clone());
        store.add_events(
            vec![
                event("1", "CPI y/y", 10, "usd", Impact::High),
                event("2", "Retail Sales", 10, "CAD", Impact::Moderate),
                event("3", "ECB Rate", 12, "EUR", Impact::High),
                event("4", "Bank Holiday", 15, "JPY", Impact::NonEconomic),
            ],
            AddOptions::from_source("primary"),
        );
        (store, clock)
    }

    fn assert_buckets(store: &EventStore, name: &str, buckets: Vec<&BTreeSet<String>>) {
        let mut seen = HashMap::new();
        for ids in buckets {
            for id in ids {
                *seen.entry(id.clone()).or_insert(0) += 1;
                assert!(store.get_event_by_id(id).is_some(), "{name}: dangling id {id}");
            }
        }
        for id in store.events_by_id.keys() {
            assert_eq!(seen.get(id), Some(&1), "{name}: id {id} not in exactly one bucket");
        }
    }

    /// Every id in exactly one bucket of each index, and no dangling ids.
    fn assert_index_consistent(store: &EventStore) {
        assert_buckets(store, "date", store.index.date_buckets().map(|(_, ids)| ids).collect());
        assert_buckets(store, "currency", store.index.currency_buckets().map(|(_, ids)| ids).collect());
        assert_buckets(store, "impact", store.index.impact_buckets().map(|(_, ids)| ids).collect());

        for (date, ids) in store.index.date_buckets() {
            for id in ids {
                assert_eq!(store.events_by_id[id].utc_date(), *date);
            }
        }
    }

    #[test]
    fn test_add_events_normalizes_and_indexes() {
        let (store, _) = store();

        assert_eq!(store.len(), 4);
        assert_eq!(store.get_event_by_id("1").unwrap().currency.as_deref(), Some("USD"));
        assert_eq!(store.get_currencies(), ["CAD", "EUR", "JPY", "USD"]);
        assert_eq!(
            store.get_impacts(),
            [Impact::High, Impact::Moderate, Impact::NonEconomic]
        );
        assert_eq!(store.get_event_by_id("2").unwrap().sources.get("primary"), Some(&true));
        assert_eq!(store.source_log().len(), 1);
        assert_index_consistent(&store);
    }

    #[test]
    fn test_add_events_append_vs_overwrite() {
        let (mut store, _) = store();

        store.add_events(
            vec![event("1", "CPI y/y (revised)", 10, "USD", Impact::High)],
            AddOptions::default(),
        );
        assert_eq!(store.len(), 4);
        assert_eq!(store.get_event_by_id("1").unwrap().name, "CPI y/y (revised)");

        store.add_events(
            vec![event("9", "GDP q/q", 11, "GBP", Impact::High)],
            AddOptions {
                source: None,
                overwrite: true,
            },
        );
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_currencies(), ["GBP"]);
        assert_index_consistent(&store);
    }

    #[test]
    fn test_update_event_merges_existing() {
        let (mut store, clock) = store();
        clock.advance(Duration::from_secs(60));

        store
            .update_event(
                "1",
                EventPatch {
                    actual: Some("3.0%".to_string()),
                    impact: Some(Impact::Moderate),
                    ..Default::default()
                },
            )
            .unwrap();

        let event = store.get_event_by_id("1").unwrap();
        assert_eq!(event.name, "CPI y/y");
        assert_eq!(event.actual.as_deref(), Some("3.0%"));
        assert_eq!(event.updated_at, Some(clock.now()));
        assert!(store.index.ids_for_impacts(&[Impact::Moderate]).contains("1"));
        assert_index_consistent(&store);
    }

    #[test]
    fn test_update_event_inserts_unknown_id() {
        let (mut store, _) = store();
        let patch = EventPatch::from(event("ignored", "PMI", 11, "gbp", Impact::Low));

        store.update_event("new-id", patch).unwrap();

        let inserted = store.get_event_by_id("new-id").expect("upserted");
        assert_eq!(inserted.name, "PMI");
        assert_eq!(inserted.currency.as_deref(), Some("GBP"));
        assert_eq!(store.len(), 5);
        assert_index_consistent(&store);
    }

    #[test]
    fn test_update_event_rejects_incomplete_insert() {
        let (mut store, _) = store();
        let patch = EventPatch {
            actual: Some("1".to_string()),
            ..Default::default()
        };

        assert!(store.update_event("ghost", patch).is_err());
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_get_events_by_ids_skips_missing() {
        let (store, _) = store();
        let found = store.get_events_by_ids(&["3", "nope", "1"]);
        let ids: Vec<_> = found.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["3", "1"]);
    }

    #[test]
    fn test_query_filters() {
        let (mut store, _) = store();
        let all = QueryFilters::new();

        assert_eq!(*store.query_by_date_range(jan(10), jan(15), &all), ["1", "2", "3", "4"]);
        assert_eq!(
            *store.query_by_date_range(jan(10), jan(15), &QueryFilters::new().impacts([Impact::High])),
            ["1", "3"]
        );
        assert_eq!(
            *store.query_by_date_range(
                jan(10),
                jan(15),
                &QueryFilters::new().impacts([Impact::High]).currencies(["eur"])
            ),
            ["3"]
        );
        assert!(store.query_by_date_range(jan(16), jan(20), &all).is_empty());
    }

    #[test]
    fn test_query_cached_until_mutation() {
        let (mut store, _) = store();
        let filters = QueryFilters::new();

        let first = store.query_by_date_range(jan(10), jan(12), &filters);
        let second = store.query_by_date_range(jan(10), jan(12), &filters);
        assert!(Arc::ptr_eq(&first, &second));

        store
            .update_event(
                "2",
                EventPatch {
                    datetime_utc: Some(Utc.with_ymd_and_hms(2026, 1, 20, 13, 30, 0).unwrap()),
                    ..Default::default()
                },
            )
            .unwrap();

        let third = store.query_by_date_range(jan(10), jan(12), &filters);
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(*third, ["1", "3"]);
    }

    #[test]
    fn test_add_events_drops_cached_queries() {
        let (mut store, _) = store();
        let filters = QueryFilters::new();

        let first = store.query_by_date_range(jan(10), jan(12), &filters);
        assert_eq!(*first, ["1", "2", "3"]);

        store.add_events(
            vec![event("5", "Trade Balance", 11, "AUD", Impact::Low)],
            AddOptions::default(),
        );
        let appended = store.query_by_date_range(jan(10), jan(12), &filters);
        assert!(!Arc::ptr_eq(&first, &appended));
        assert_eq!(*appended, ["1", "2", "5", "3"]);

        store.add_events(
            vec![event("6", "Unemployment Rate", 12, "GBP", Impact::High)],
            AddOptions {
                overwrite: true,
                ..Default::default()
            },
        );
        let replaced = store.query_by_date_range(jan(10), jan(12), &filters);
        assert!(!Arc::ptr_eq(&appended, &replaced));
        assert_eq!(*replaced, ["6"]);
    }

    #[test]
    fn test_query_cache_invalidation_triggers() {
        let (mut store, clock) = store();
        let filters = QueryFilters::new();

        store.on_timezone_change(chrono_tz::UTC);
        let first = store.query_by_date_range(jan(10), jan(10), &filters);

        store.on_timezone_change(chrono_tz::UTC);
        assert!(Arc::ptr_eq(&first, &store.query_by_date_range(jan(10), jan(10), &filters)));

        store.on_timezone_change(chrono_tz::Asia::Tokyo);
        assert_eq!(store.cache_len(), 0);
        let second = store.query_by_date_range(jan(10), jan(10), &filters);
        assert!(!Arc::ptr_eq(&first, &second));

        store.on_day_rollover();
        assert_eq!(store.cache_len(), 0);

        store.query_by_date_range(jan(10), jan(10), &filters);
        clock.advance(QUERY_CACHE_TTL);
        let third = store.query_by_date_range(jan(10), jan(10), &filters);
        assert_eq!(*third, ["1", "2"]);
    }

    #[test]
    fn test_invalidate_query_cache_pattern() {
        let (mut store, _) = store();
        store.query_by_date_range(jan(10), jan(12), &QueryFilters::new().currencies(["USD"]));
        store.query_by_date_range(jan(10), jan(12), &QueryFilters::new().currencies(["EUR"]));

        assert_eq!(store.invalidate_query_cache(Some("currencies=USD")), 1);
        assert_eq!(store.cache_len(), 1);
        assert_eq!(store.invalidate_query_cache(None), 1);
    }

    #[test]
    fn test_clear_resets_everything() {
        let (mut store, _) = store();
        store.query_by_date_range(jan(10), jan(12), &QueryFilters::new());

        store.clear();

        assert!(store.is_empty());
        assert_eq!(store.cache_len(), 0);
        assert!(store.source_log().is_empty());
        assert!(store.get_currencies().is_empty());
    }

    #[test]
    fn test_apply_live_updates() {
        let (mut store, _) = store();
        let updates = vec![
            LiveUpdate {
                id: "1".to_string(),
                patch: EventPatch {
                    actual: Some("2.7%".to_string()),
                    ..Default::default()
                },
            },
            LiveUpdate {
                id: "5".to_string(),
                patch: EventPatch::from(event("5", "Jobless Claims", 11, "USD", Impact::Low)),
            },
        ];

        assert_eq!(store.apply_live_updates(updates).unwrap(), 2);
        assert_eq!(store.len(), 5);
        assert_index_consistent(&store);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(Vec<(u8, u32, u8, u8)>, bool),
        Update(u8, Option<u32>, Option<u8>, Option<u8>),
    }

    const CURRENCIES: [&str; 4] = ["USD", "eur", "", "JPY"];

    fn op() -> impl Strategy<Value = Op> {
        let row = (0u8..12, 1u32..28, 0u8..4, 0u8..6);
        prop_oneof![
            (prop::collection::vec(row, 0..6), any::<bool>()).prop_map(|(rows, o)| Op::Add(rows, o)),
            (0u8..12, prop::option::of(1u32..28), prop::option::of(0u8..4), prop::option::of(0u8..6))
                .prop_map(|(id, d, c, i)| Op::Update(id, d, c, i)),
        ]
    }

    proptest! {
        #[test]
        fn prop_index_consistent_after_mutations(ops in prop::collection::vec(op(), 1..12)) {
            let mut store = EventStore::new();
            for op in ops {
                match op {
                    Op::Add(rows, overwrite) => {
                        let events = rows
                            .into_iter()
                            .map(|(id, day, c, i)| {
                                event(&id.to_string(), "Release", day, CURRENCIES[c as usize], Impact::ALL[i as usize])
                            })
                            .collect();
                        store.add_events(events, AddOptions { source: None, overwrite });
                    }
                    Op::Update(id, day, c, i) => {
                        let patch = EventPatch {
                            name: Some("Release".to_string()),
                            datetime_utc: day.map(|d| Utc.with_ymd_and_hms(2026, 2, d, 9, 0, 0).unwrap())
                                .or(Some(Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap())),
                            currency: c.map(|c| CURRENCIES[c as usize].to_string()),
                            impact: i.map(|i| Impact::ALL[i as usize]),
                            ..Default::default()
                        };
                        store.update_event(&id.to_string(), patch).unwrap();
                    }
                }
                assert_index_consistent(&store);
            }
        }
    }
}

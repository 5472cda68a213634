//! Secondary indexes over the canonical event map.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::NaiveDate;

use crate::event::{Event, Impact};

/// Bucket key for events that carry no currency.
pub(crate) const NO_CURRENCY: &str = "";

/// Date, currency and impact buckets of event ids.
///
/// Always derived from a full event list; never edited in place.
#[derive(Debug, Default, Clone)]
pub struct EventIndex {
    date_index: BTreeMap<NaiveDate, BTreeSet<String>>,
    currency_index: BTreeMap<String, BTreeSet<String>>,
    impact_index: BTreeMap<Impact, BTreeSet<String>>,
}

impl EventIndex {
    pub fn build<'a>(events: impl IntoIterator<Item = &'a Event>) -> Self {
        let mut index = EventIndex::default();

        for event in events {
            index
                .date_index
                .entry(event.utc_date())
                .or_default()
                .insert(event.id.clone());
            index
                .currency_index
                .entry(event.currency.clone().unwrap_or_else(|| NO_CURRENCY.to_string()))
                .or_default()
                .insert(event.id.clone());
            index
                .impact_index
                .entry(event.impact)
                .or_default()
                .insert(event.id.clone());
        }

        index
    }

    /// Ids whose UTC date lies in `[start, end]`, ordered by date then id.
    pub fn ids_in_date_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<String> {
        if start > end {
            return Vec::new();
        }
        self.date_index
            .range(start..=end)
            .flat_map(|(_, ids)| ids.iter().cloned())
            .collect()
    }

    /// Union of the impact buckets for `impacts`.
    pub fn ids_for_impacts(&self, impacts: &[Impact]) -> HashSet<&str> {
        impacts
            .iter()
            .filter_map(|impact| self.impact_index.get(impact))
            .flat_map(|ids| ids.iter().map(String::as_str))
            .collect()
    }

    /// Union of the currency buckets for `currencies` (already uppercase).
    pub fn ids_for_currencies(&self, currencies: &[String]) -> HashSet<&str> {
        currencies
            .iter()
            .filter_map(|currency| self.currency_index.get(currency))
            .flat_map(|ids| ids.iter().map(String::as_str))
            .collect()
    }

    /// Indexed currency codes, sorted. Events without a currency are not listed.
    pub fn currencies(&self) -> Vec<String> {
        self.currency_index
            .keys()
            .filter(|c| c.as_str() != NO_CURRENCY)
            .cloned()
            .collect()
    }

    /// Indexed impact tiers, in tier order.
    pub fn impacts(&self) -> Vec<Impact> {
        self.impact_index.keys().copied().collect()
    }

    pub fn date_buckets(&self) -> impl Iterator<Item = (&NaiveDate, &BTreeSet<String>)> {
        self.date_index.iter()
    }

    pub fn currency_buckets(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.currency_index.iter()
    }

    pub fn impact_buckets(&self) -> impl Iterator<Item = (&Impact, &BTreeSet<String>)> {
        self.impact_index.iter()
    }
}

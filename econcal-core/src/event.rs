//! Canonical event types.
//!
//! Every feed (primary, generated, admin upload) is converted into these
//! types at the ingestion boundary. The store, matcher and backend protocol
//! work exclusively with them.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EconCalError, EconCalResult};
use crate::normalize::{normalize_currency, normalize_metric};

/// A canonical economic-calendar event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Assigned by the persistence service; never reused.
    pub id: String,
    pub name: String,
    /// Uppercase three-letter code. Required for matching.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    pub datetime_utc: DateTime<Utc>,
    #[serde(default)]
    pub impact: Impact,

    // Display metrics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,

    /// Which feeds have contributed data to this event.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sources: BTreeMap<String, bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Event {
    pub fn new(id: &str, name: &str, datetime_utc: DateTime<Utc>) -> Self {
        Event {
            id: id.to_string(),
            name: name.to_string(),
            currency: None,
            datetime_utc,
            impact: Impact::default(),
            actual: None,
            forecast: None,
            previous: None,
            sources: BTreeMap::new(),
            updated_at: None,
        }
    }

    pub fn with_currency(mut self, currency: &str) -> Self {
        self.currency = Some(currency.to_string());
        self
    }

    pub fn with_impact(mut self, impact: Impact) -> Self {
        self.impact = impact;
        self
    }

    /// UTC calendar date, used as the date-index bucket.
    pub fn utc_date(&self) -> NaiveDate {
        self.datetime_utc.date_naive()
    }

    /// Canonical form: trimmed name, uppercase currency, placeholder metrics cleared.
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.currency = self.currency.as_deref().and_then(normalize_currency);
        self.actual = self.actual.as_deref().and_then(normalize_metric);
        self.forecast = self.forecast.as_deref().and_then(normalize_metric);
        self.previous = self.previous.as_deref().and_then(normalize_metric);
        self
    }

    /// Shallow-merge a patch: every field set on the patch replaces ours.
    pub fn apply_patch(&mut self, patch: EventPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(currency) = patch.currency {
            self.currency = Some(currency);
        }
        if let Some(datetime_utc) = patch.datetime_utc {
            self.datetime_utc = datetime_utc;
        }
        if let Some(impact) = patch.impact {
            self.impact = impact;
        }
        if let Some(actual) = patch.actual {
            self.actual = Some(actual);
        }
        if let Some(forecast) = patch.forecast {
            self.forecast = Some(forecast);
        }
        if let Some(previous) = patch.previous {
            self.previous = Some(previous);
        }
        if let Some(sources) = patch.sources {
            self.sources = sources;
        }
        if let Some(updated_at) = patch.updated_at {
            self.updated_at = Some(updated_at);
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.currency {
            Some(currency) => write!(f, "{} {}", currency, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A validated record from a feed, not yet reconciled with the canonical set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingEvent {
    /// Present only when the feed already knows the canonical id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    pub datetime_utc: DateTime<Utc>,
    #[serde(default)]
    pub impact: Impact,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sources: BTreeMap<String, bool>,
}

impl IncomingEvent {
    pub fn new(name: &str, datetime_utc: DateTime<Utc>) -> Self {
        IncomingEvent {
            id: None,
            name: name.to_string(),
            currency: None,
            datetime_utc,
            impact: Impact::default(),
            actual: None,
            forecast: None,
            previous: None,
            sources: BTreeMap::new(),
        }
    }

    pub fn with_currency(mut self, currency: &str) -> Self {
        self.currency = normalize_currency(currency);
        self
    }
}

impl fmt::Display for IncomingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.currency {
            Some(currency) => write!(f, "{} {}", currency, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A partial event, as delivered by live-update notifications.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datetime_utc: Option<DateTime<Utc>>,
    #[serde(default, alias = "strength", skip_serializing_if = "Option::is_none")]
    pub impact: Option<Impact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<BTreeMap<String, bool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl EventPatch {
    /// Build a full event from a patch for an id the store has never seen.
    pub fn into_event(self, id: &str) -> EconCalResult<Event> {
        let name = self
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| EconCalError::Validation(format!("event '{id}' has no name")))?;
        let datetime_utc = self.datetime_utc.ok_or_else(|| {
            EconCalError::Validation(format!("event '{id}' has no datetimeUtc"))
        })?;

        let mut event = Event::new(id, &name, datetime_utc);
        event.apply_patch(self);
        Ok(event)
    }
}

impl From<Event> for EventPatch {
    fn from(event: Event) -> Self {
        EventPatch {
            name: Some(event.name),
            currency: event.currency,
            datetime_utc: Some(event.datetime_utc),
            impact: Some(event.impact),
            actual: event.actual,
            forecast: event.forecast,
            previous: event.previous,
            sources: Some(event.sources),
            updated_at: event.updated_at,
        }
    }
}

/// A pushed `(id, patch)` pair from the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveUpdate {
    pub id: String,
    pub patch: EventPatch,
}

/// Market-impact tier of a release.
///
/// Ordering follows declaration order, so sorted tiers read from most to
/// least significant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum Impact {
    High,
    Moderate,
    Low,
    #[serde(rename = "Non-Economic")]
    NonEconomic,
    #[serde(rename = "My-Events")]
    MyEvents,
    #[default]
    Unresolved,
}

impl Impact {
    pub const ALL: [Impact; 6] = [
        Impact::High,
        Impact::Moderate,
        Impact::Low,
        Impact::NonEconomic,
        Impact::MyEvents,
        Impact::Unresolved,
    ];

    /// Parse a feed's impact label. Unknown labels are `Unresolved`.
    pub fn parse(label: &str) -> Impact {
        let label = label.trim().to_lowercase().replace(['_', ' '], "-");
        match label.as_str() {
            "high" => Impact::High,
            "moderate" | "medium" => Impact::Moderate,
            "low" => Impact::Low,
            "non-economic" | "noneconomic" | "none" | "holiday" => Impact::NonEconomic,
            "my-events" | "myevents" => Impact::MyEvents,
            _ => Impact::Unresolved,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Impact::High => "High",
            Impact::Moderate => "Moderate",
            Impact::Low => "Low",
            Impact::NonEconomic => "Non-Economic",
            Impact::MyEvents => "My-Events",
            Impact::Unresolved => "Unresolved",
        }
    }
}

impl From<String> for Impact {
    fn from(label: String) -> Self {
        Impact::parse(&label)
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn cpi() -> Event {
        Event::new("evt-1", "CPI y/y", Utc.with_ymd_and_hms(2026, 1, 10, 13, 30, 0).unwrap())
            .with_currency("USD")
    }

    #[test]
    fn test_impact_parse_accepts_feed_aliases() {
        assert_eq!(Impact::parse("HIGH"), Impact::High);
        assert_eq!(Impact::parse("medium"), Impact::Moderate);
        assert_eq!(Impact::parse("Non Economic"), Impact::NonEconomic);
        assert_eq!(Impact::parse("my_events"), Impact::MyEvents);
        assert_eq!(Impact::parse("???"), Impact::Unresolved);
    }

    #[test]
    fn test_impact_serializes_with_display_labels() {
        let json = serde_json::to_string(&Impact::NonEconomic).unwrap();
        assert_eq!(json, "\"Non-Economic\"");

        let back: Impact = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Impact::NonEconomic);
    }

    #[test]
    fn test_normalized_clears_placeholder_metrics() {
        let mut event = cpi();
        event.currency = Some(" usd ".to_string());
        event.actual = Some("-".to_string());
        event.forecast = Some("".to_string());
        event.previous = Some("2.9%".to_string());

        let event = event.normalized();

        assert_eq!(event.currency.as_deref(), Some("USD"));
        assert_eq!(event.actual, None);
        assert_eq!(event.forecast, None);
        assert_eq!(event.previous.as_deref(), Some("2.9%"));
    }

    #[test]
    fn test_apply_patch_only_touches_set_fields() {
        let mut event = cpi();
        event.apply_patch(EventPatch {
            actual: Some("3.1%".to_string()),
            ..Default::default()
        });

        assert_eq!(event.name, "CPI y/y");
        assert_eq!(event.currency.as_deref(), Some("USD"));
        assert_eq!(event.actual.as_deref(), Some("3.1%"));
    }

    #[test]
    fn test_patch_into_event_requires_name_and_time() {
        let patch = EventPatch {
            actual: Some("1".to_string()),
            ..Default::default()
        };
        assert!(patch.into_event("x").is_err());

        let event = EventPatch::from(cpi()).into_event("other").unwrap();
        assert_eq!(event.id, "other");
        assert_eq!(event.name, "CPI y/y");
    }

    #[test]
    fn test_event_json_uses_camel_case() {
        let json = serde_json::to_value(cpi()).unwrap();
        assert_eq!(json["datetimeUtc"], "2026-01-10T13:30:00Z");
        assert_eq!(json["impact"], "Unresolved");
    }
}

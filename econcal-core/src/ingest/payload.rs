//! Feed payload adapter.
//!
//! Feeds send either a bare JSON array of event objects or an object
//! wrapping it as `{"events": [...]}`. Field spellings vary between feeds
//! and over time; they are all resolved here so only [`IncomingEvent`]
//! reaches the matcher.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EconCalError, EconCalResult};
use crate::event::{Impact, IncomingEvent};
use crate::normalize::{normalize_currency, normalize_metric};

/// Naive timestamp layouts accepted (interpreted as UTC).
const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    name: Option<Value>,
    #[serde(default)]
    datetime_utc: Option<Value>,
    // Historical spellings, tried in this order after `datetimeUtc`.
    #[serde(default, rename = "datetime_utc")]
    datetime_utc_snake: Option<Value>,
    #[serde(default)]
    date_time: Option<Value>,
    #[serde(default)]
    date: Option<Value>,
    #[serde(default, rename = "Date")]
    date_capitalized: Option<Value>,
    #[serde(default)]
    currency: Option<Value>,
    #[serde(default)]
    impact: Option<Value>,
    #[serde(default)]
    strength: Option<Value>,
    #[serde(default)]
    actual: Option<Value>,
    #[serde(default)]
    forecast: Option<Value>,
    #[serde(default)]
    previous: Option<Value>,
    /// Provenance flags. Entries that are not booleans are dropped.
    #[serde(default)]
    sources: Option<Value>,
}

impl RawEvent {
    fn datetime(&self) -> Option<String> {
        [
            &self.datetime_utc,
            &self.datetime_utc_snake,
            &self.date_time,
            &self.date,
            &self.date_capitalized,
        ]
        .into_iter()
        .find_map(|value| non_empty_string(value.as_ref()))
    }

    fn impact_label(&self) -> Option<String> {
        non_empty_string(self.impact.as_ref()).or_else(|| non_empty_string(self.strength.as_ref()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPayload {
    Bare(Vec<Value>),
    Wrapped { events: Vec<Value> },
}

/// A record that failed validation. Never fatal to the rest of the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Position in the original payload.
    pub index: usize,
    pub name: Option<String>,
    pub errors: Vec<String>,
}

/// A record that passed validation, with its payload position.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidRecord {
    pub index: usize,
    pub event: IncomingEvent,
}

/// A payload split into valid records and validation issues.
#[derive(Debug, Clone, Default)]
pub struct Payload {
    pub records: Vec<ValidRecord>,
    pub issues: Vec<ValidationIssue>,
}

impl Payload {
    pub fn from_json(json: &str) -> EconCalResult<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| EconCalError::Payload(format!("not valid JSON: {e}")))?;
        Self::from_value(value)
    }

    pub fn from_file(path: &Path) -> EconCalResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_value(value: Value) -> EconCalResult<Self> {
        let records = match serde_json::from_value::<RawPayload>(value) {
            Ok(RawPayload::Bare(records)) | Ok(RawPayload::Wrapped { events: records }) => records,
            Err(_) => {
                return Err(EconCalError::Payload(
                    "expected an array of events or an object with an \"events\" array".into(),
                ));
            }
        };

        let mut payload = Payload::default();
        for (index, record) in records.into_iter().enumerate() {
            match validate_record(record) {
                Ok(event) => payload.records.push(ValidRecord { index, event }),
                Err((name, errors)) => payload.issues.push(ValidationIssue {
                    index,
                    name,
                    errors,
                }),
            }
        }

        Ok(payload)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.issues.is_empty()
    }
}

/// Validate one raw record. On failure returns the record's name (if it
/// had a usable one) and every problem found.
fn validate_record(record: Value) -> Result<IncomingEvent, (Option<String>, Vec<String>)> {
    if !record.is_object() {
        return Err((None, vec!["record is not an object".to_string()]));
    }

    let raw: RawEvent = match serde_json::from_value(record.clone()) {
        Ok(raw) => raw,
        Err(e) => {
            let name = non_empty_string(record.get("name"));
            return Err((name, vec![format!("malformed record: {e}")]));
        }
    };

    let mut errors = Vec::new();

    let name = non_empty_string(raw.name.as_ref());
    if name.is_none() {
        errors.push("name is required".to_string());
    }

    let datetime_utc = match raw.datetime() {
        Some(s) => match parse_instant(&s) {
            Some(dt) => Some(dt),
            None => {
                errors.push(format!("datetimeUtc '{s}' is not an ISO-8601 timestamp"));
                None
            }
        },
        None => {
            errors.push("datetimeUtc is required".to_string());
            None
        }
    };

    let (Some(name), Some(datetime_utc)) = (name.clone(), datetime_utc) else {
        return Err((name, errors));
    };

    let mut event = IncomingEvent::new(&name, datetime_utc);
    event.id = non_empty_string(raw.id.as_ref());
    event.currency = non_empty_string(raw.currency.as_ref()).and_then(|c| normalize_currency(&c));
    event.impact = raw
        .impact_label()
        .map(|label| Impact::parse(&label))
        .unwrap_or_default();
    event.actual = metric(raw.actual.as_ref());
    event.forecast = metric(raw.forecast.as_ref());
    event.previous = metric(raw.previous.as_ref());
    event.sources = source_flags(raw.sources.as_ref());

    Ok(event)
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn source_flags(value: Option<&Value>) -> BTreeMap<String, bool> {
    let Some(Value::Object(map)) = value else {
        return BTreeMap::new();
    };
    map.iter()
        .filter_map(|(source, flag)| flag.as_bool().map(|flag| (source.clone(), flag)))
        .collect()
}

/// Metrics arrive as strings or bare numbers.
fn metric(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => normalize_metric(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

use std::fmt;

use serde::Serialize;

use crate::event::{Event, IncomingEvent};

/// One field compared between an incoming record and its matched canonical event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDifference {
    pub field: &'static str,
    pub incoming_value: Option<String>,
    pub matched_value: Option<String>,
    pub is_different: bool,
}

impl FieldDifference {
    fn new(field: &'static str, incoming: Option<String>, matched: Option<String>) -> Option<Self> {
        if incoming.is_none() && matched.is_none() {
            return None;
        }
        let is_different = incoming != matched;
        Some(FieldDifference {
            field,
            incoming_value: incoming,
            matched_value: matched,
            is_different,
        })
    }
}

impl fmt::Display for FieldDifference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let incoming = self.incoming_value.as_deref().unwrap_or("(none)");
        let matched = self.matched_value.as_deref().unwrap_or("(none)");
        if self.is_different {
            write!(f, "{}: {} → {}", self.field, matched, incoming)
        } else {
            write!(f, "{}: {}", self.field, matched)
        }
    }
}

/// Compare every display field of an incoming record against the canonical
/// event it matched. Fields empty on both sides are left out.
pub fn compare_fields(incoming: &IncomingEvent, matched: &Event) -> Vec<FieldDifference> {
    [
        FieldDifference::new("name", Some(incoming.name.clone()), Some(matched.name.clone())),
        FieldDifference::new("currency", incoming.currency.clone(), matched.currency.clone()),
        FieldDifference::new(
            "datetimeUtc",
            Some(incoming.datetime_utc.to_rfc3339()),
            Some(matched.datetime_utc.to_rfc3339()),
        ),
        FieldDifference::new(
            "impact",
            Some(incoming.impact.to_string()),
            Some(matched.impact.to_string()),
        ),
        FieldDifference::new("actual", incoming.actual.clone(), matched.actual.clone()),
        FieldDifference::new("forecast", incoming.forecast.clone(), matched.forecast.clone()),
        FieldDifference::new("previous", incoming.previous.clone(), matched.previous.clone()),
    ]
    .into_iter()
    .flatten()
    .collect()
}

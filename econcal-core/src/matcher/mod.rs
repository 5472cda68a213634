//! Duplicate detection for incoming feed records.
//!
//! The matcher does not own storage. Candidates come from the persistence
//! service (a currency + time-window lookup); the matcher only decides which
//! of them, if any, describes the same release as the incoming record.

mod field_diff;
mod similarity;

use std::time::Duration;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{MATCH_WINDOW, SIMILARITY_THRESHOLD};
use crate::event::{Event, IncomingEvent};

pub use field_diff::{FieldDifference, compare_fields};
pub use similarity::{jaccard, similarity};

/// Tunables for duplicate detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatcherConfig {
    /// Minimum similarity (inclusive) for a candidate to count as a match.
    pub threshold: f64,
    /// Maximum scheduling distance (inclusive, either direction).
    pub window: Duration,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        MatcherConfig {
            threshold: SIMILARITY_THRESHOLD,
            window: MATCH_WINDOW,
        }
    }
}

/// An existing canonical event proposed as the same release as an incoming record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCandidate {
    pub incoming: IncomingEvent,
    pub matched_event_id: String,
    pub matched_event: Event,
    pub similarity_score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Matcher {
    config: MatcherConfig,
}

impl Matcher {
    pub fn new(config: MatcherConfig) -> Self {
        Matcher { config }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Window as a chrono delta, saturating for absurdly large configs.
    pub fn window_delta(&self) -> TimeDelta {
        TimeDelta::from_std(self.config.window).unwrap_or(TimeDelta::MAX)
    }

    /// Whether `candidate` shares the incoming currency and falls inside the window.
    pub fn is_eligible(&self, incoming: &IncomingEvent, candidate: &Event) -> bool {
        let Some(currency) = incoming.currency.as_deref() else {
            return false;
        };
        if !candidate
            .currency
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case(currency))
        {
            return false;
        }

        let distance = (candidate.datetime_utc - incoming.datetime_utc).abs();
        distance <= self.window_delta()
    }

    /// Pick the best duplicate candidate for `incoming`, if one scores at or
    /// above the threshold.
    ///
    /// Candidates are scored in ascending id order and only a strictly higher
    /// score displaces the current best, so equal scores resolve to the
    /// smallest id regardless of the order the backend returned them in.
    pub fn find_match(
        &self,
        incoming: &IncomingEvent,
        candidates: &[Event],
    ) -> Option<MatchCandidate> {
        let mut eligible: Vec<&Event> = candidates
            .iter()
            .filter(|c| self.is_eligible(incoming, c))
            .collect();
        eligible.sort_by(|a, b| a.id.cmp(&b.id));

        let mut best: Option<(&Event, f64)> = None;
        for candidate in eligible {
            let score = similarity(&incoming.name, &candidate.name);
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((candidate, score));
            }
        }

        let (matched, score) = best?;
        debug!(
            incoming = %incoming,
            candidate = %matched.id,
            score,
            threshold = self.config.threshold,
            "best duplicate candidate"
        );

        if score < self.config.threshold {
            return None;
        }

        Some(MatchCandidate {
            incoming: incoming.clone(),
            matched_event_id: matched.id.clone(),
            matched_event: matched.clone(),
            similarity_score: score,
        })
    }
}

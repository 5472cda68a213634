//! Validate → match → select → submit → report.
//!
//! Candidate lookups and batch submissions are awaited one at a time so
//! progress is deterministic and records in the same run never race each
//! other for the same candidate.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::constants::DEFAULT_MAX_BATCH_SIZE;
use crate::error::{EconCalError, EconCalResult};
use crate::event::IncomingEvent;
use crate::ingest::counts::IngestCounts;
use crate::ingest::payload::{Payload, ValidRecord, ValidationIssue};
use crate::matcher::{MatchCandidate, Matcher};
use crate::persistence::PersistenceService;

/// Outcome of matching one record against the canonical set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Classification {
    /// No duplicate found. `lookup_failed` marks a fail-open decision made
    /// because the candidate lookup errored.
    #[serde(rename_all = "camelCase")]
    New { lookup_failed: bool },
    #[serde(rename_all = "camelCase")]
    Matched {
        matched_event_id: String,
        matched_event_name: String,
        similarity_score: f64,
    },
}

impl Classification {
    pub fn is_new(&self) -> bool {
        matches!(self, Classification::New { .. })
    }
}

impl From<MatchCandidate> for Classification {
    fn from(candidate: MatchCandidate) -> Self {
        Classification::Matched {
            matched_event_id: candidate.matched_event_id,
            matched_event_name: candidate.matched_event.name,
            similarity_score: candidate.similarity_score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedRecord {
    pub index: usize,
    pub event: IncomingEvent,
    pub classification: Classification,
}

/// Which classified records to submit.
#[derive(Debug, Clone, Default)]
pub enum Selection {
    #[default]
    All,
    NewOnly,
    /// Payload indices chosen by the caller.
    Indices(BTreeSet<usize>),
}

impl Selection {
    pub fn apply(&self, classified: &[ClassifiedRecord]) -> Vec<IncomingEvent> {
        classified
            .iter()
            .filter(|record| match self {
                Selection::All => true,
                Selection::NewOnly => record.classification.is_new(),
                Selection::Indices(indices) => indices.contains(&record.index),
            })
            .map(|record| record.event.clone())
            .collect()
    }
}

/// Cooperative stop signal, checked between batches.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitProgress {
    pub batches_completed: usize,
    pub total_batches: usize,
}

impl SubmitProgress {
    /// `(batches_completed / total_batches) * 100`; 100 when there is nothing to send.
    pub fn percent(&self) -> f64 {
        if self.total_batches == 0 {
            return 100.0;
        }
        self.batches_completed as f64 / self.total_batches as f64 * 100.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitReport {
    pub counts: IngestCounts,
    pub batches_completed: usize,
    pub total_batches: usize,
    /// Submission stopped early on request.
    pub cancelled: bool,
}

/// Everything one ingestion run produced.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub issues: Vec<ValidationIssue>,
    pub classified: Vec<ClassifiedRecord>,
    pub submitted: SubmitReport,
}

impl IngestReport {
    pub fn new_count(&self) -> usize {
        self.classified.iter().filter(|r| r.classification.is_new()).count()
    }

    pub fn matched_count(&self) -> usize {
        self.classified.len() - self.new_count()
    }
}

pub struct Ingestor<'a, P: PersistenceService + ?Sized> {
    backend: &'a P,
    matcher: Matcher,
    max_batch_size: usize,
    source: Option<String>,
}

impl<'a, P: PersistenceService + ?Sized> Ingestor<'a, P> {
    pub fn new(backend: &'a P) -> Self {
        Ingestor {
            backend,
            matcher: Matcher::default(),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            source: None,
        }
    }

    pub fn with_matcher(mut self, matcher: Matcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size.max(1);
        self
    }

    /// Mark submitted events as contributed by `source`.
    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// Look up candidates around the record and run the matcher over them.
    /// Records without a currency cannot match and skip the lookup.
    pub async fn find_match(&self, event: &IncomingEvent) -> EconCalResult<Option<MatchCandidate>> {
        let Some(currency) = event.currency.as_deref() else {
            return Ok(None);
        };

        let window = self.matcher.window_delta();
        let from = event.datetime_utc.checked_sub_signed(window).unwrap_or(event.datetime_utc);
        let to = event.datetime_utc.checked_add_signed(window).unwrap_or(event.datetime_utc);

        let candidates = self
            .backend
            .find_candidates(currency, from, to)
            .await
            .map_err(|e| EconCalError::MatchLookup(e.to_string()))?;

        Ok(self.matcher.find_match(event, &candidates))
    }

    /// Classify one record. Lookup failures fail open to `New`.
    pub async fn classify_record(&self, record: &ValidRecord) -> ClassifiedRecord {
        let classification = match self.find_match(&record.event).await {
            Ok(Some(candidate)) => Classification::from(candidate),
            Ok(None) => Classification::New {
                lookup_failed: false,
            },
            Err(e) => {
                warn!(
                    index = record.index,
                    name = %record.event.name,
                    error = %e,
                    "candidate lookup failed, treating record as new"
                );
                Classification::New {
                    lookup_failed: true,
                }
            }
        };

        ClassifiedRecord {
            index: record.index,
            event: record.event.clone(),
            classification,
        }
    }

    /// Classify records in order; `on_progress(done, total)` after each.
    pub async fn classify(
        &self,
        records: &[ValidRecord],
        mut on_progress: impl FnMut(usize, usize),
    ) -> Vec<ClassifiedRecord> {
        let mut classified = Vec::with_capacity(records.len());
        for record in records {
            classified.push(self.classify_record(record).await);
            on_progress(classified.len(), records.len());
        }
        classified
    }

    /// Submit in batches of at most `max_batch_size`, summing the counts.
    ///
    /// A failed batch stops the run; the error carries the counts of the
    /// batches that went through. Cancellation is checked before each batch.
    pub async fn submit(
        &self,
        mut events: Vec<IncomingEvent>,
        cancel: &Cancellation,
        mut on_progress: impl FnMut(SubmitProgress),
    ) -> EconCalResult<SubmitReport> {
        if let Some(source) = &self.source {
            for event in &mut events {
                event.sources.insert(source.clone(), true);
            }
        }

        let total_batches = events.len().div_ceil(self.max_batch_size);
        let mut report = SubmitReport {
            total_batches,
            ..Default::default()
        };

        for (i, batch) in events.chunks(self.max_batch_size).enumerate() {
            if cancel.is_cancelled() {
                info!(
                    batches_completed = report.batches_completed,
                    total_batches, "submission cancelled"
                );
                report.cancelled = true;
                return Ok(report);
            }

            let counts = match self.backend.bulk_ingest(batch).await {
                Ok(counts) => counts,
                Err(e) => {
                    error!(batch = i + 1, total_batches, error = %e, "bulk ingest failed");
                    return Err(EconCalError::Submission {
                        counts: report.counts,
                        batches_completed: report.batches_completed,
                        source: Box::new(e),
                    });
                }
            };

            debug!(batch = i + 1, total_batches, %counts, "batch submitted");
            report.counts += counts;
            report.batches_completed += 1;
            on_progress(SubmitProgress {
                batches_completed: report.batches_completed,
                total_batches,
            });
        }

        info!(counts = %report.counts, total_batches, "submission finished");
        Ok(report)
    }

    /// Full run over an already validated payload.
    pub async fn run(
        &self,
        payload: &Payload,
        selection: &Selection,
        cancel: &Cancellation,
    ) -> EconCalResult<IngestReport> {
        let classified = self.classify(&payload.records, |_, _| {}).await;
        let selected = selection.apply(&classified);
        let submitted = self.submit(selected, cancel, |_| {}).await?;

        Ok(IngestReport {
            issues: payload.issues.clone(),
            classified,
            submitted,
        })
    }
}

//! Contract of the remote persistence service that owns the canonical set.
//!
//! The service makes the final create/merge decision on bulk ingest; this
//! crate only suggests candidates and keeps a local read model.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::EconCalResult;
use crate::event::{Event, IncomingEvent};
use crate::ingest::IngestCounts;

#[async_trait]
pub trait PersistenceService: Send + Sync {
    /// Canonical events in `currency` scheduled within `[from, to]`.
    async fn find_candidates(
        &self,
        currency: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> EconCalResult<Vec<Event>>;

    /// Full canonical record, `sources` included.
    async fn fetch_event(&self, id: &str) -> EconCalResult<Option<Event>>;

    /// Submit one batch (at most the configured batch size).
    async fn bulk_ingest(&self, batch: &[IncomingEvent]) -> EconCalResult<IngestCounts>;

    /// Every canonical event scheduled within `[from, to]`.
    async fn list_events(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> EconCalResult<Vec<Event>>;
}

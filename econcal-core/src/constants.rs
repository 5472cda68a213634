use std::time::Duration;

/// Minimum Jaccard score for an incoming record to be proposed as a duplicate.
pub const SIMILARITY_THRESHOLD: f64 = 0.8;

/// How far apart (either direction) two releases may be scheduled and still match.
pub const MATCH_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Largest number of events sent in one bulk-ingest call.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 200;

/// How long a cached range query stays valid.
pub const QUERY_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// How long an event counts as happening "now" after its release time.
pub const NOW_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Days fetched on either side of today when no range is given.
pub const DEFAULT_RANGE_DAYS: i64 = 7;

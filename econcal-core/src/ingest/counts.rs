//! Outcome counts reported by bulk ingestion.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

/// Per-batch (or summed) result of a bulk-ingest call. The backend decides
/// what counts as created versus merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestCounts {
    #[serde(default)]
    pub created: usize,
    #[serde(default)]
    pub merged: usize,
    #[serde(default)]
    pub skipped: usize,
    #[serde(default)]
    pub errors: usize,
}

impl IngestCounts {
    pub fn total(&self) -> usize {
        self.created + self.merged + self.skipped + self.errors
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl Add for IngestCounts {
    type Output = IngestCounts;

    fn add(self, other: IngestCounts) -> IngestCounts {
        IngestCounts {
            created: self.created + other.created,
            merged: self.merged + other.merged,
            skipped: self.skipped + other.skipped,
            errors: self.errors + other.errors,
        }
    }
}

impl AddAssign for IngestCounts {
    fn add_assign(&mut self, other: IngestCounts) {
        *self = *self + other;
    }
}

impl Sum for IngestCounts {
    fn sum<I: Iterator<Item = IngestCounts>>(iter: I) -> Self {
        iter.fold(IngestCounts::default(), Add::add)
    }
}

impl fmt::Display for IngestCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} merged, {} skipped, {} errors",
            self.created, self.merged, self.skipped, self.errors
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_sum_across_batches() {
        let batches = [
            IngestCounts { created: 2, merged: 1, skipped: 0, errors: 0 },
            IngestCounts { created: 0, merged: 3, skipped: 1, errors: 1 },
        ];
        let total: IngestCounts = batches.into_iter().sum();

        assert_eq!(total, IngestCounts { created: 2, merged: 4, skipped: 1, errors: 1 });
        assert_eq!(total.to_string(), "2 created, 4 merged, 1 skipped, 1 errors");
    }

    #[test]
    fn test_counts_missing_fields_default_to_zero() {
        let counts: IngestCounts = serde_json::from_str(r#"{"created": 1}"#).unwrap();
        assert_eq!(counts.created, 1);
        assert_eq!(counts.total(), 1);
    }
}

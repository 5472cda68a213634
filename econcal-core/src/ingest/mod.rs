//! Feed ingestion: payload adaptation, duplicate classification and batched submission.

mod counts;
mod payload;
mod pipeline;

pub use counts::IngestCounts;
pub use payload::{Payload, ValidRecord, ValidationIssue};
pub use pipeline::{
    Cancellation, Classification, ClassifiedRecord, IngestReport, Ingestor, Selection,
    SubmitProgress, SubmitReport,
};

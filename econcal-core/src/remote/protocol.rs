//! JSON protocol spoken between econcal and backend binaries over
//! stdin/stdout: one request line in, one response document out.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::event::{Event, IncomingEvent};
use crate::ingest::IngestCounts;

pub trait BackendCommand: Serialize {
    type Response: DeserializeOwned;
    fn command() -> Command;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    FindCandidates,
    FetchEvent,
    BulkIngest,
    ListEvents,
}

/// Request sent from econcal to the backend.
#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    pub command: Command,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Response sent from the backend to econcal.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response<T> {
    Success { data: T },
    Error { error: String },
}

/// Canonical events in one currency around a release time.
#[derive(Debug, Serialize, Deserialize)]
pub struct FindCandidates {
    pub currency: String,
    /// RFC 3339
    pub from: String,
    /// RFC 3339
    pub to: String,
}

impl BackendCommand for FindCandidates {
    type Response = Vec<Event>;
    fn command() -> Command {
        Command::FindCandidates
    }
}

/// A single canonical event by id.
#[derive(Debug, Serialize, Deserialize)]
pub struct FetchEvent {
    pub event_id: String,
}

impl BackendCommand for FetchEvent {
    type Response = Option<Event>;
    fn command() -> Command {
        Command::FetchEvent
    }
}

/// One batch of feed records; the backend decides create versus merge.
#[derive(Debug, Serialize, Deserialize)]
pub struct BulkIngest {
    pub events: Vec<IncomingEvent>,
}

impl BackendCommand for BulkIngest {
    type Response = IngestCounts;
    fn command() -> Command {
        Command::BulkIngest
    }
}

/// Every canonical event in a time range.
#[derive(Debug, Serialize, Deserialize)]
pub struct ListEvents {
    pub from: String,
    pub to: String,
}

impl BackendCommand for ListEvents {
    type Response = Vec<Event>;
    fn command() -> Command {
        Command::ListEvents
    }
}

//! Canonical economic-calendar event store.
//!
//! This crate provides:
//! - `Event` and related types for scheduled economic releases
//! - `normalize` and `matcher` for deciding whether an incoming record is a
//!   release we already know about
//! - `store`, an indexed in-memory event set with a range query cache
//! - `ingest`, the validate/match/submit pipeline over a `PersistenceService`
//! - `remote`, the backend subprocess client and its protocol

pub mod config;
pub mod constants;
pub mod date_range;
pub mod error;
pub mod event;
pub mod ingest;
pub mod matcher;
pub mod normalize;
pub mod persistence;
pub mod remote;
pub mod store;
pub mod timing;

pub use event::*;
pub use persistence::PersistenceService;

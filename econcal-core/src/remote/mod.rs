//! Remote persistence over backend subprocesses.

mod backend;
pub mod protocol;

pub use backend::{Backend, DEFAULT_BACKEND_TIMEOUT};

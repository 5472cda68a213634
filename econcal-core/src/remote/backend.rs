//! Backend subprocess client.
//!
//! The canonical set lives behind a backend binary (`econcal-backend-<name>`
//! on `PATH`) that speaks the JSON protocol in [`super::protocol`] over
//! stdin/stdout. Any executable that speaks it can be a backend; it owns
//! its own credentials and transport.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;
use tracing::debug;

use crate::error::{EconCalError, EconCalResult};
use crate::event::{Event, IncomingEvent};
use crate::ingest::IngestCounts;
use crate::persistence::PersistenceService;
use crate::remote::protocol::{
    BackendCommand, BulkIngest, Command, FetchEvent, FindCandidates, ListEvents, Request, Response,
};

pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(10);

const BINARY_PREFIX: &str = "econcal-backend-";

#[derive(Clone, Debug)]
pub struct Backend {
    name: String,
    timeout: Duration,
}

impl Backend {
    pub fn from_name(name: &str) -> Self {
        Backend {
            name: name.to_string(),
            timeout: DEFAULT_BACKEND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn binary_name(&self) -> String {
        format!("{BINARY_PREFIX}{}", self.name)
    }

    fn binary_path(&self) -> EconCalResult<PathBuf> {
        let binary_name = self.binary_name();
        which::which(&binary_name).map_err(|_| EconCalError::BackendNotInstalled(binary_name))
    }

    /// Call a typed backend command and return its typed response.
    pub async fn call<C: BackendCommand>(&self, cmd: C) -> EconCalResult<C::Response> {
        timeout(self.timeout, self.call_raw(C::command(), cmd))
            .await
            .map_err(|_| EconCalError::BackendTimeout(self.timeout.as_secs()))?
    }

    async fn call_raw<P: Serialize, R: DeserializeOwned>(
        &self,
        command: Command,
        params: P,
    ) -> EconCalResult<R> {
        let params =
            serde_json::to_value(params).map_err(|e| EconCalError::Serialization(e.to_string()))?;
        let request = Request { command, params };
        let request_json = serde_json::to_string(&request)
            .map_err(|e| EconCalError::Serialization(e.to_string()))?;

        let binary_path = self.binary_path()?;
        debug!(backend = %self.name, ?command, "calling backend");

        let mut child = TokioCommand::new(&binary_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                EconCalError::Backend(format!("Failed to spawn {}: {}", binary_path.display(), e))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| EconCalError::Backend("Backend stdin unavailable".into()))?;
        stdin
            .write_all(format!("{request_json}\n").as_bytes())
            .await?;
        drop(stdin);

        let output = child.wait_with_output().await?;

        if !output.status.success() {
            return Err(EconCalError::Backend(format!(
                "Backend exited with status: {}",
                output.status.code().unwrap_or(-1)
            )));
        }

        parse_response(&String::from_utf8_lossy(&output.stdout))
    }
}

fn parse_response<R: DeserializeOwned>(raw: &str) -> EconCalResult<R> {
    if raw.trim().is_empty() {
        return Err(EconCalError::Backend("Backend returned no response".into()));
    }

    let response: Response<R> = serde_json::from_str(raw)
        .map_err(|e| EconCalError::Backend(format!("Failed to parse response: {}", e)))?;

    match response {
        Response::Success { data } => Ok(data),
        Response::Error { error } => Err(EconCalError::Backend(error)),
    }
}

#[async_trait]
impl PersistenceService for Backend {
    async fn find_candidates(
        &self,
        currency: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> EconCalResult<Vec<Event>> {
        self.call(FindCandidates {
            currency: currency.to_string(),
            from: from.to_rfc3339(),
            to: to.to_rfc3339(),
        })
        .await
    }

    async fn fetch_event(&self, id: &str) -> EconCalResult<Option<Event>> {
        self.call(FetchEvent {
            event_id: id.to_string(),
        })
        .await
    }

    async fn bulk_ingest(&self, batch: &[IncomingEvent]) -> EconCalResult<IngestCounts> {
        self.call(BulkIngest {
            events: batch.to_vec(),
        })
        .await
    }

    async fn list_events(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> EconCalResult<Vec<Event>> {
        self.call(ListEvents {
            from: from.to_rfc3339(),
            to: to.to_rfc3339(),
        })
        .await
    }
}

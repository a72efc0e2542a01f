// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job-event tail adapter: the only layer that reads the journal.
//!
//! An adapter here does one thing — open a stream and hand back
//! records, one attempt, no retry. Deciding what a record means and
//! re-opening a stream that died are the caller's job.

mod journal;

pub use journal::JournalTailer;

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeTailer;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from opening or reading a job-event stream.
#[derive(Debug, Error)]
pub enum TailError {
    #[error("failed to start journal tail: {0}")]
    SpawnFailed(String),
    #[error("journal tail stream ended unexpectedly")]
    StreamClosed,
    #[error("failed to read from journal tail: {0}")]
    ReadFailed(String),
}

/// One journal record, as a flat key/value map (the shape of `journalctl
/// -o export`). Interpreting which keys matter — `UNIT`, `MESSAGE_ID`,
/// `JOB_RESULT` — belongs to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawJobRecord {
    fields: HashMap<String, String>,
}

impl RawJobRecord {
    pub fn new(fields: HashMap<String, String>) -> Self {
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn unit(&self) -> Option<&str> {
        self.get("UNIT")
    }

    pub fn message(&self) -> Option<&str> {
        self.get("MESSAGE")
    }

    pub fn message_id(&self) -> Option<&str> {
        self.get("MESSAGE_ID")
    }
}

/// A single open tail of the journal. Each call to `next` blocks until
/// the next record is available, the stream ends, or it errors.
#[async_trait]
pub trait RecordStream: Send {
    async fn next(&mut self) -> Result<Option<RawJobRecord>, TailError>;
}

/// The only component that talks to the journal.
#[async_trait]
pub trait JobTailer: Send + Sync + 'static {
    /// Open a single tail of the journal, filtered to `unit_glob`
    /// (e.g. `libvirt-guest@*.service`). `since` reaches back that far
    /// into the past before following, used on reopen to bridge the gap
    /// left by a dead stream; `None` starts from "now".
    async fn open(
        &self,
        unit_glob: &str,
        since: Option<Duration>,
    ) -> Result<Box<dyn RecordStream>, TailError>;
}

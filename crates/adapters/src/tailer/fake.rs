// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake job tailer for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::{JobTailer, RawJobRecord, RecordStream, TailError};

struct FakeState {
    pending: VecDeque<RawJobRecord>,
    opens: u32,
    closed: bool,
    fail_next_open: bool,
    last_since: Option<Duration>,
}

/// In-memory job tailer. Tests push records with [`FakeTailer::push`]
/// and the reconciler's tail loop reads them through the same
/// `open`/`next` path it uses against the real journal, including
/// reopen-after-close behavior exercised via [`FakeTailer::close`].
#[derive(Clone)]
pub struct FakeTailer {
    inner: Arc<Mutex<FakeState>>,
    notify: Arc<Notify>,
}

impl Default for FakeTailer {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeState {
                pending: VecDeque::new(),
                opens: 0,
                closed: false,
                fail_next_open: false,
                last_since: None,
            })),
            notify: Arc::new(Notify::new()),
        }
    }
}

impl FakeTailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, record: RawJobRecord) {
        let mut inner = self.inner.lock();
        inner.pending.push_back(record);
        self.notify.notify_waiters();
    }

    /// Simulate the journal stream dying: the next `next()` call on any
    /// stream opened so far returns `StreamClosed`.
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.notify.notify_waiters();
    }

    /// Make the next `open` call fail, to exercise reopen-with-backoff.
    pub fn fail_next_open(&self) {
        self.inner.lock().fail_next_open = true;
    }

    pub fn open_count(&self) -> u32 {
        self.inner.lock().opens
    }

    /// The `since` argument passed to the most recent `open` call.
    pub fn last_since(&self) -> Option<Duration> {
        self.inner.lock().last_since
    }
}

#[async_trait]
impl JobTailer for FakeTailer {
    async fn open(
        &self,
        _unit_glob: &str,
        since: Option<Duration>,
    ) -> Result<Box<dyn RecordStream>, TailError> {
        let mut inner = self.inner.lock();
        if inner.fail_next_open {
            inner.fail_next_open = false;
            return Err(TailError::SpawnFailed("fake open failure".into()));
        }
        inner.opens += 1;
        inner.closed = false;
        inner.last_since = since;
        drop(inner);
        Ok(Box::new(FakeStream {
            inner: Arc::clone(&self.inner),
            notify: Arc::clone(&self.notify),
        }))
    }
}

struct FakeStream {
    inner: Arc<Mutex<FakeState>>,
    notify: Arc<Notify>,
}

#[async_trait]
impl RecordStream for FakeStream {
    async fn next(&mut self) -> Result<Option<RawJobRecord>, TailError> {
        loop {
            {
                let mut inner = self.inner.lock();
                if let Some(record) = inner.pending.pop_front() {
                    return Ok(Some(record));
                }
                if inner.closed {
                    return Err(TailError::StreamClosed);
                }
            }
            self.notify.notified().await;
        }
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;

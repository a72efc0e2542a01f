// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rate-Limited Action Log: the per-key timestamp structure echo
//! suppression is built on.
//!
//! Detects whether acting now would repeat a recent action for the same
//! key within `threshold`. Both HDM (suppressing JET-sourced actions
//! that would echo one of HDM's own) and the reconciler (suppressing a
//! reboot-triggered restart that the user's own systemd restart already
//! caused) hold one of these, keyed by domain name.

use crate::clock::Clock;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

struct Log {
    timestamps: Vec<Instant>,
}

/// Default consecutive-action suppression window.
pub const DEFAULT_THRESHOLD_SEC: u64 = 3;
/// Default window after which a key's whole log is cleared.
pub const DEFAULT_MAX_LENGTH_SEC: u64 = 60;

pub struct Rlal<C: Clock> {
    clock: C,
    threshold: Duration,
    max_length: Duration,
    logs: Mutex<HashMap<String, Log>>,
}

impl<C: Clock> Rlal<C> {
    pub fn new(clock: C, threshold: Duration, max_length: Duration) -> Self {
        Self {
            clock,
            threshold,
            max_length,
            logs: Mutex::new(HashMap::new()),
        }
    }

    /// Append "now" to `key`, clearing the whole log first if more than
    /// `max_length` elapsed since the last record for this key.
    pub fn record(&self, key: &str) {
        self.record_and_prev(key);
    }

    /// Record, then return true iff the two most recent records for
    /// `key` are separated by no more than `threshold`.
    pub fn violated(&self, key: &str) -> bool {
        let (now, prev) = self.record_and_prev(key);
        match prev {
            Some(prev) => now.saturating_duration_since(prev) <= self.threshold,
            None => false,
        }
    }

    /// Append "now" to `key` (clearing first if stale), returning the
    /// timestamp just recorded and whatever preceded it, both taken
    /// under the same lock acquisition so callers never need to
    /// re-look-up a key they just wrote.
    fn record_and_prev(&self, key: &str) -> (Instant, Option<Instant>) {
        let now = self.clock.now();
        let mut logs = self.logs.lock();
        let log = logs.entry(key.to_string()).or_insert_with(|| Log {
            timestamps: Vec::new(),
        });

        if let Some(&last) = log.timestamps.last() {
            if now.saturating_duration_since(last) > self.max_length {
                log.timestamps.clear();
            }
        }
        let prev = prev_of(&log.timestamps);
        log.timestamps.push(now);
        (now, prev)
    }

    /// Most recent timestamp for `key`, relative to now, or `None` if
    /// `key` has never been recorded.
    pub fn last(&self, key: &str) -> Option<Instant> {
        self.logs.lock().get(key).and_then(|l| l.timestamps.last().copied())
    }

    /// Second-most-recent timestamp for `key`, or `None` if fewer than
    /// two records exist.
    pub fn prev(&self, key: &str) -> Option<Instant> {
        self.logs.lock().get(key).and_then(|l| prev_of(&l.timestamps))
    }
}

fn prev_of(timestamps: &[Instant]) -> Option<Instant> {
    if timestamps.len() < 2 {
        None
    } else {
        Some(timestamps[timestamps.len() - 2])
    }
}

#[cfg(test)]
#[path = "rlal_tests.rs"]
mod tests;

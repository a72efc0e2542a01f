// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `journalctl -f -o export` backed job tailer.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};

use super::{JobTailer, RawJobRecord, RecordStream, TailError};

/// Spawns `journalctl` and parses its `export` output format: each
/// record is a run of `KEY=value` lines terminated by a blank line.
pub struct JournalTailer;

impl JournalTailer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JournalTailer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobTailer for JournalTailer {
    async fn open(
        &self,
        unit_glob: &str,
        since: Option<Duration>,
    ) -> Result<Box<dyn RecordStream>, TailError> {
        let mut command = Command::new("journalctl");
        command
            .arg("-f")
            .arg("-o")
            .arg("export")
            .arg("-u")
            .arg(unit_glob)
            .arg("--no-pager");
        if let Some(since) = since {
            command.arg(format!("--since=-{}s", since.as_secs()));
        }

        let mut child = command
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TailError::SpawnFailed(e.to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TailError::SpawnFailed("journalctl stdout not piped".into()))?;

        Ok(Box::new(JournalStream {
            _child: child,
            lines: BufReader::new(stdout).lines(),
        }))
    }
}

struct JournalStream {
    // Held for its `Drop` impl: dropping kills the process (kill_on_drop).
    _child: Child,
    lines: Lines<BufReader<ChildStdout>>,
}

#[async_trait]
impl RecordStream for JournalStream {
    async fn next(&mut self) -> Result<Option<RawJobRecord>, TailError> {
        let mut fields = HashMap::new();
        loop {
            let line = self
                .lines
                .next_line()
                .await
                .map_err(|e| TailError::ReadFailed(e.to_string()))?;
            match line {
                None => {
                    return if fields.is_empty() {
                        Ok(None)
                    } else {
                        Err(TailError::StreamClosed)
                    }
                }
                Some(line) if line.is_empty() => {
                    if fields.is_empty() {
                        continue;
                    }
                    return Ok(Some(RawJobRecord::new(fields)));
                }
                Some(line) => {
                    if let Some((key, value)) = line.split_once('=') {
                        fields.insert(key.to_string(), value.to_string());
                    }
                }
            }
        }
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job-Event Tailer: observes reliable start/stop/restart completions
//! on template units and forwards the ones that are not echoes of an
//! action the reconciler itself just caused.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use vg_adapters::{JobTailer, RawJobRecord, TailError};
use vg_core::{Clock, DomainName, JobEvent, JobType, Rlal};

/// Default delay before reopening a dead tail, and the `--since` window
/// requested on reopen to bridge the gap.
pub const DEFAULT_RESTART_DELAY_SEC: u64 = 1;

/// The Job-Event Tailer.
pub struct Jet {
    handle: JoinHandle<()>,
}

impl Jet {
    /// Spawn the tail-reading loop. `rlal` is the reconciler-held
    /// JET-side RLAL, shared with the lifecycle/reboot callback
    /// handlers: a record written there by a lifecycle callback makes
    /// the matching job completion look like an echo and get dropped.
    pub fn spawn<T: JobTailer, C: Clock>(
        tailer: Arc<T>,
        prefix: String,
        rlal: Arc<Rlal<C>>,
        restart_delay: Duration,
        events_tx: mpsc::UnboundedSender<JobEvent>,
        shutdown: CancellationToken,
    ) -> Self {
        let handle = tokio::spawn(run(
            tailer,
            prefix,
            rlal,
            restart_delay,
            events_tx,
            shutdown,
        ));
        Self { handle }
    }

    pub fn healthy(&self) -> bool {
        !self.handle.is_finished()
    }
}

async fn run<T: JobTailer, C: Clock>(
    tailer: Arc<T>,
    prefix: String,
    rlal: Arc<Rlal<C>>,
    restart_delay: Duration,
    events_tx: mpsc::UnboundedSender<JobEvent>,
    shutdown: CancellationToken,
) {
    let glob = format!("{prefix}@*.service");
    let mut since: Option<Duration> = None;

    loop {
        if shutdown.is_cancelled() {
            return;
        }

        let mut stream = match tailer.open(&glob, since).await {
            Ok(stream) => stream,
            Err(err) => {
                debug!(error = %err, "job tail failed to open, retrying");
                if sleep_or_shutdown(restart_delay, &shutdown).await {
                    return;
                }
                since = Some(restart_delay);
                continue;
            }
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return,
                next = stream.next() => next,
            };

            match next {
                Ok(Some(record)) => {
                    if let Some(event) = accept(&record, &prefix, &rlal) {
                        if events_tx.send(event).is_err() {
                            return;
                        }
                    }
                }
                Ok(None) | Err(TailError::StreamClosed) => {
                    debug!("job tail stream ended, reopening");
                    break;
                }
                Err(err) => {
                    warn!(error = %err, "job tail read failed, reopening");
                    break;
                }
            }
        }

        if sleep_or_shutdown(restart_delay, &shutdown).await {
            return;
        }
        since = Some(restart_delay);
    }
}

async fn sleep_or_shutdown(delay: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = shutdown.cancelled() => true,
    }
}

/// The acceptance filter: job type recognized, start is queued (no
/// result yet), stop/restart are terminal (`done`), unit matches the
/// template prefix, and the shared RLAL does not flag it as an echo.
fn accept<C: Clock>(
    record: &RawJobRecord,
    prefix: &str,
    rlal: &Rlal<C>,
) -> Option<JobEvent> {
    let unit = record.unit()?;
    let (unit_prefix, instance, suffix) = vg_core::parse_unit_name(unit)?;
    if unit_prefix != prefix || suffix != "service" {
        return None;
    }

    let job_type = JobType::parse(record.get("JOB_TYPE")?)?;
    match job_type {
        JobType::Start => {
            if record.get("JOB_RESULT").is_some() {
                return None;
            }
        }
        JobType::Stop | JobType::Restart => {
            if record.get("JOB_RESULT") != Some("done") {
                return None;
            }
        }
    }

    let domain = DomainName::new(instance);
    if rlal.violated(domain.as_ref()) {
        debug!(%domain, %job_type, "dropping echoed job completion");
        return None;
    }

    Some(JobEvent { domain, job_type })
}

#[cfg(test)]
#[path = "jet_tests.rs"]
mod tests;
